//! Completed-file queue: FIFO handoff from the drain worker to readers.
//!
//! The drain worker enqueues finalized records from the deferred-work context;
//! a reader claims the head record from the session context, sleeping until
//! one is available. The link/unlink plus count update is a single critical
//! section under a blocking-capable lock - deliberately a different discipline
//! from the staging ring's lock-free one, because this path may sleep.
//!
//! Wakeups use `tokio::sync::Notify` with the notified-before-recheck pattern,
//! so an enqueue that lands between a claimant's queue check and its await is
//! never lost. A `watch` shutdown flag interrupts blocked claimants with the
//! distinct retryable [`Error::Interrupted`] condition.

use crate::error::Error;
use crate::store::FileRecord;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio::sync::{watch, Notify};
use tracing::debug;

/// FIFO of finished files awaiting a reader.
pub struct CompletedQueue {
    files: Mutex<VecDeque<FileRecord>>,
    available: Notify,
    shutdown: watch::Receiver<bool>,
}

impl CompletedQueue {
    /// Create an empty queue whose blocked claimants are interrupted when
    /// `shutdown` flips to `true`.
    #[must_use]
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            files: Mutex::new(VecDeque::new()),
            available: Notify::new(),
            shutdown,
        }
    }

    /// Number of records currently linked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    /// Whether no completed files are waiting.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.lock().is_empty()
    }

    /// Append a finalized record and wake one waiting claimant, if any.
    pub fn enqueue(&self, record: FileRecord) {
        let queued = {
            let mut files = self.files.lock();
            files.push_back(record);
            files.len()
        };
        debug!(queued, "completed file enqueued");
        self.available.notify_one();
    }

    /// Remove and return the head record, sleeping until one exists.
    ///
    /// Records already queued are handed out even during shutdown; only an
    /// empty-queue wait is interrupted, yielding [`Error::Interrupted`] so the
    /// caller can re-issue the claim.
    pub async fn claim_next(&self) -> Result<FileRecord, Error> {
        let mut shutdown = self.shutdown.clone();
        loop {
            // Register for a wakeup before re-checking, otherwise an enqueue
            // racing this check could be missed.
            let notified = self.available.notified();

            if let Some(record) = self.files.lock().pop_front() {
                return Ok(record);
            }
            if *shutdown.borrow() {
                return Err(Error::Interrupted);
            }

            tokio::select! {
                _ = notified => {}
                _ = shutdown.changed() => {}
            }
        }
    }
}

impl std::fmt::Debug for CompletedQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletedQueue")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::PagePool;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn record_with(pool: &PagePool, content: &[u8]) -> FileRecord {
        let mut rec = FileRecord::new(pool.clone());
        rec.append(content);
        rec
    }

    fn queue() -> (Arc<CompletedQueue>, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (Arc::new(CompletedQueue::new(rx)), tx)
    }

    #[tokio::test]
    async fn claims_follow_enqueue_order() {
        let (q, _tx) = queue();
        let pool = PagePool::new(16, None);
        q.enqueue(record_with(&pool, b"first"));
        q.enqueue(record_with(&pool, b"second"));
        assert_eq!(q.len(), 2);

        let mut buf = [0u8; 16];
        let a = q.claim_next().await.unwrap();
        let n = a.read_at(0, &mut buf);
        assert_eq!(&buf[..n], b"first");

        let b = q.claim_next().await.unwrap();
        let n = b.read_at(0, &mut buf);
        assert_eq!(&buf[..n], b"second");
        assert!(q.is_empty());
    }

    #[tokio::test]
    async fn claim_blocks_until_enqueue_wakes_it() {
        let (q, _tx) = queue();
        let pool = PagePool::new(16, None);

        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.claim_next().await })
        };
        // Give the claimant time to park.
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.enqueue(record_with(&pool, b"late"));

        let rec = timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let mut buf = [0u8; 16];
        let n = rec.read_at(0, &mut buf);
        assert_eq!(&buf[..n], b"late");
    }

    #[tokio::test]
    async fn shutdown_interrupts_a_blocked_claim() {
        let (q, tx) = queue();
        let waiter = {
            let q = Arc::clone(&q);
            tokio::spawn(async move { q.claim_next().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        tx.send(true).unwrap();

        let result = timeout(Duration::from_secs(1), waiter).await.unwrap().unwrap();
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[tokio::test]
    async fn queued_records_survive_shutdown() {
        let (q, tx) = queue();
        let pool = PagePool::new(16, None);
        q.enqueue(record_with(&pool, b"kept"));
        tx.send(true).unwrap();

        // The already-queued record is still claimable.
        assert!(q.claim_next().await.is_ok());
        // Only the empty wait reports the interruption.
        assert!(matches!(q.claim_next().await, Err(Error::Interrupted)));
    }
}
