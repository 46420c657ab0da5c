//! Ingestion boundary: the notification-context sample handler.
//!
//! One [`SampleIntake`] exists per device, handed out by
//! [`Device::spawn`](crate::device::Device::spawn). It is the only writer to
//! the staging ring and the only caller of the nibble assembler, which is
//! what lets both stay lock-free. [`submit`](SampleIntake::submit) is the
//! whole ingest path: bounded time, no allocation, no blocking - safe to call
//! from an interrupt-style callback.

use crate::assembler::NibbleAssembler;
use crate::device::Shared;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::warn;

/// The single producer handle feeding a device's staging ring.
///
/// Not cloneable: the notification context is single, and `&mut self` on
/// [`submit`](Self::submit) keeps the assembler state exclusive.
pub struct SampleIntake {
    shared: Arc<Shared>,
    assembler: NibbleAssembler,
}

impl SampleIntake {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self {
            shared,
            assembler: NibbleAssembler::new(),
        }
    }

    /// Deliver one 4-bit sample (masked to its low 4 bits).
    ///
    /// Every second sample completes a byte, which is pushed to the staging
    /// ring. A full ring drops the byte - the producer cannot retry - and the
    /// drop is counted for the status report. The drain worker is scheduled
    /// when the pushed byte is the terminator or when occupancy crosses half
    /// the ring's capacity, bounding both backlog and completion latency.
    pub fn submit(&mut self, sample: u8) {
        let Some(byte) = self.assembler.submit(sample) else {
            return;
        };

        let shared = &self.shared;
        if !shared.ring.try_push(byte) {
            shared.dropped_bytes.fetch_add(1, Ordering::Relaxed);
            warn!("staging ring full; sample byte dropped");
            return;
        }

        if byte == shared.config.terminator || shared.ring.len() > shared.ring.capacity() / 2 {
            shared.drain_wake.notify_one();
        }
    }

    /// Feed a full byte as its two nibbles, high first.
    ///
    /// Convenience for tests and tooling that sit above the 4-bit boundary.
    pub fn submit_byte(&mut self, byte: u8) {
        self.submit(byte >> 4);
        self.submit(byte & 0x0F);
    }
}

impl std::fmt::Debug for SampleIntake {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleIntake")
            .field("pending_nibble", &self.assembler.has_pending())
            .finish()
    }
}
