//! Device state and the session-context API.
//!
//! [`Device::spawn`] wires the whole pipeline together: it builds the shared
//! state, starts the drain worker, and hands back the device handle plus the
//! single [`SampleIntake`](crate::intake::SampleIntake). The device owns no
//! ambient globals - everything lives in one explicitly constructed shared
//! context that persists for the device's active lifetime.
//!
//! Readers enter through [`Device::open`]: admission is checked first and
//! synchronously (over the limit fails immediately with [`Error::Busy`]),
//! then the call blocks until a completed file can be claimed. Admission and
//! file availability are deliberately independent conditions; a caller never
//! sleeps waiting for data while holding no reader slot.

use crate::config::DeviceConfig;
use crate::drain;
use crate::error::{Error, Result};
use crate::intake::SampleIntake;
use crate::queue::CompletedQueue;
use crate::ring::SampleRing;
use crate::session::ReaderSession;
use crate::store::PagePool;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Notify};
use tracing::info;

/// State shared by the three execution contexts.
pub(crate) struct Shared {
    pub(crate) config: DeviceConfig,
    pub(crate) ring: SampleRing,
    pub(crate) pool: PagePool,
    pub(crate) queue: CompletedQueue,
    /// Wakes the drain worker; re-notification while it runs coalesces into
    /// a single pending permit.
    pub(crate) drain_wake: Notify,
    pub(crate) active_readers: AtomicUsize,
    pub(crate) max_readers: AtomicUsize,
    /// Bytes currently held in page stores (appended, not yet destroyed).
    pub(crate) buffered_bytes: AtomicU64,
    /// Bytes lost to a full staging ring.
    pub(crate) dropped_bytes: AtomicU64,
    pub(crate) shutdown: watch::Sender<bool>,
}

/// Handle to a running pipeline device.
///
/// Cheap to clone; all clones refer to the same device. The drain worker
/// keeps running until [`shutdown`](Device::shutdown) is called.
#[derive(Clone)]
pub struct Device {
    shared: Arc<Shared>,
}

impl Device {
    /// Construct the pipeline and spawn its drain worker on the current
    /// tokio runtime.
    ///
    /// Returns the device handle and the sole ingest handle. The intake is
    /// deliberately not cloneable: the notification context is single.
    pub fn spawn(config: DeviceConfig) -> Result<(Self, SampleIntake)> {
        config.validate()?;

        let (shutdown, shutdown_rx) = watch::channel(false);
        let shared = Arc::new(Shared {
            ring: SampleRing::with_capacity(config.ring_capacity),
            pool: PagePool::new(config.page_size, config.max_pages),
            queue: CompletedQueue::new(shutdown_rx),
            drain_wake: Notify::new(),
            active_readers: AtomicUsize::new(0),
            max_readers: AtomicUsize::new(config.max_readers),
            buffered_bytes: AtomicU64::new(0),
            dropped_bytes: AtomicU64::new(0),
            shutdown,
            config,
        });

        tokio::spawn(drain::run(Arc::clone(&shared)));
        info!(
            ring_capacity = shared.config.ring_capacity,
            page_size = shared.config.page_size,
            terminator = shared.config.terminator,
            "pipeline device started"
        );

        let intake = SampleIntake::new(Arc::clone(&shared));
        Ok((Self { shared }, intake))
    }

    /// Open a reader session on the next completed file.
    ///
    /// Fails immediately with [`Error::Busy`] when `active_readers` has
    /// reached the limit; otherwise blocks until a file is available.
    /// Returns [`Error::Interrupted`] if [`shutdown`](Self::shutdown) fires
    /// while waiting (the slot is released before returning). The pipeline
    /// is read-only from the consumer side - there is no write-mode open.
    pub async fn open(&self) -> Result<ReaderSession> {
        let shared = &self.shared;
        shared
            .active_readers
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < shared.max_readers.load(Ordering::Acquire)).then_some(active + 1)
            })
            .map_err(|_| Error::Busy)?;

        match shared.queue.claim_next().await {
            Ok(record) => Ok(ReaderSession::new(Arc::clone(shared), record)),
            Err(err) => {
                shared.active_readers.fetch_sub(1, Ordering::AcqRel);
                Err(err)
            }
        }
    }

    /// Set the maximum number of concurrent reader sessions.
    ///
    /// Rejected when below 1 or below the current active-reader count.
    pub fn set_max_readers(&self, limit: usize) -> Result<()> {
        let active = self.shared.active_readers.load(Ordering::Acquire);
        if limit < 1 || limit < active {
            return Err(Error::InvalidLimit {
                requested: limit,
                active,
            });
        }
        self.shared.max_readers.store(limit, Ordering::Release);
        info!(limit, "max concurrent readers updated");
        Ok(())
    }

    /// Interrupt blocked openers and stop the drain worker.
    ///
    /// Files already completed remain claimable; only empty-queue waits are
    /// interrupted.
    pub fn shutdown(&self) {
        self.shared.shutdown.send_replace(true);
    }

    /// Textual status snapshot of the device.
    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        let shared = &self.shared;
        StatusSnapshot {
            pages_in_use: shared.pool.pages_in_use(),
            buffered_bytes: shared.buffered_bytes.load(Ordering::Relaxed),
            queued_files: shared.queue.len(),
            active_readers: shared.active_readers.load(Ordering::Relaxed),
            max_readers: shared.max_readers.load(Ordering::Relaxed),
            dropped_bytes: shared.dropped_bytes.load(Ordering::Relaxed),
            ring_occupancy: shared.ring.len(),
            ring_capacity: shared.ring.capacity(),
        }
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device").field("status", &self.status()).finish()
    }
}

/// Point-in-time view of device state, for logs and diagnostics.
#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    /// Pages currently linked into records.
    pub pages_in_use: usize,
    /// Bytes held in page stores across all live records.
    pub buffered_bytes: u64,
    /// Completed files awaiting a reader.
    pub queued_files: usize,
    /// Reader sessions currently open.
    pub active_readers: usize,
    /// Concurrent-reader limit.
    pub max_readers: usize,
    /// Bytes lost to staging-ring overflow since start.
    pub dropped_bytes: u64,
    /// Bytes staged in the ring right now.
    pub ring_occupancy: usize,
    /// Fixed ring capacity.
    pub ring_capacity: usize,
}

impl std::fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "pages in use = {}", self.pages_in_use)?;
        writeln!(f, "data size = {}", self.buffered_bytes)?;
        writeln!(f, "files queued = {}", self.queued_files)?;
        writeln!(
            f,
            "readers = {} / {}",
            self.active_readers, self.max_readers
        )?;
        writeln!(f, "bytes dropped = {}", self.dropped_bytes)?;
        write!(
            f,
            "ring occupancy = {} / {}",
            self.ring_occupancy, self.ring_capacity
        )
    }
}
