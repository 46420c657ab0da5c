//! Nibble-to-byte reassembly.
//!
//! The ingestion boundary delivers 4-bit samples one at a time. Two consecutive
//! samples form one byte, high nibble first. The assembler is a tiny state
//! machine owned by the single ingest handle; it runs in the notification
//! context and must complete in bounded time without allocating or locking.

/// Reassembles a stream of 4-bit samples into bytes.
///
/// State is a single pending-nibble flag plus the stored high nibble; both are
/// reset after each completed byte. Not shared between threads - the sole
/// [`SampleIntake`](crate::intake::SampleIntake) owns it and calls
/// [`submit`](Self::submit) through `&mut self`.
#[derive(Debug, Default)]
pub struct NibbleAssembler {
    /// High nibble received on the previous call, if any.
    pending: Option<u8>,
}

impl NibbleAssembler {
    /// Create an assembler with no pending nibble.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one 4-bit sample.
    ///
    /// The first call after a reset stores the sample as the high nibble and
    /// returns `None`. The second call returns the assembled byte
    /// (`high << 4 | low`) and resets. Samples are masked to their low 4 bits.
    pub fn submit(&mut self, sample: u8) -> Option<u8> {
        let nibble = sample & 0x0F;
        match self.pending.take() {
            Some(high) => Some((high << 4) | nibble),
            None => {
                self.pending = Some(nibble);
                None
            }
        }
    }

    /// Whether a high nibble is waiting for its partner.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}
