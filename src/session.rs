//! Reader sessions: the read path over a claimed file.
//!
//! A session owns exactly one completed [`FileRecord`] for its entire
//! lifetime. Reads stream bytes from the record's page store, crossing page
//! boundaries transparently; a short read just means the destination was
//! smaller than what remains. Dropping the session releases the reader's
//! admission slot and destroys the record, returning its pages to the pool.

use crate::device::Shared;
use crate::store::FileRecord;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::error;

/// Exclusive reader of one completed file.
pub struct ReaderSession {
    shared: Arc<Shared>,
    record: FileRecord,
}

impl ReaderSession {
    pub(crate) fn new(shared: Arc<Shared>, record: FileRecord) -> Self {
        Self { shared, record }
    }

    /// Copy the next bytes of the file into `dst`.
    ///
    /// Returns the number of bytes copied: `min(remaining, dst.len())`, or 0
    /// at end of file. Call repeatedly to stream the full content. A claimed
    /// record whose page list is unexpectedly empty is treated as corrupt:
    /// logged and reported as end of file rather than propagated.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        if self.record.data_size() == 0 {
            return 0;
        }
        if self.record.is_corrupt() {
            error!(
                data_size = self.record.data_size(),
                "claimed record has no pages; returning EOF"
            );
            return 0;
        }
        let n = self.record.read_at(self.record.head(), dst);
        self.record.advance_head(n as u64);
        n
    }

    /// Bytes not yet read from this file.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.record.data_size()
    }

    /// Total length of the claimed file in bytes.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.record.tail()
    }

    /// Whether the claimed file is zero-length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.record.tail() == 0
    }
}

impl Drop for ReaderSession {
    fn drop(&mut self) {
        self.shared.active_readers.fetch_sub(1, Ordering::AcqRel);
        self.shared
            .buffered_bytes
            .fetch_sub(self.record.tail(), Ordering::Relaxed);
        // The record itself drops here, recycling its pages.
    }
}

impl std::fmt::Debug for ReaderSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSession")
            .field("len", &self.len())
            .field("remaining", &self.remaining())
            .finish()
    }
}
