//! Deferred drain worker.
//!
//! A single tokio task moves bytes from the staging ring into the in-progress
//! record's page store and finalizes records when the terminator appears in
//! the appended data. The task is woken through the device's `Notify`; a
//! wakeup arriving while a pass is running coalesces into one pending permit,
//! so the worker never runs concurrently with itself.
//!
//! The worker never blocks on the reader side, and it never fails upward:
//! page exhaustion trims the current append, logs, and leaves the in-progress
//! record short. Bytes still staged in the ring survive for the next pass.

use crate::device::Shared;
use crate::store::FileRecord;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{debug, warn};

/// Worker loop. Runs until the device's shutdown flag fires.
pub(crate) async fn run(shared: Arc<Shared>) {
    // One ring's worth of scratch, allocated once for the task's lifetime.
    let mut scratch = vec![0u8; shared.ring.capacity()];
    let mut current = FileRecord::new(shared.pool.clone());
    let mut shutdown = shared.shutdown.subscribe();

    loop {
        let wake = shared.drain_wake.notified();
        tokio::select! {
            _ = wake => {}
            _ = shutdown.changed() => break,
        }
        drain_pass(&shared, &mut scratch, &mut current);
    }
    debug!(
        in_progress_bytes = current.tail(),
        "drain worker stopped"
    );
}

/// One pass: empty the ring, splitting appended data on the terminator.
///
/// A single pass may finalize several files when terminators arrive
/// back-to-back; bytes after a terminator land in a freshly created record.
fn drain_pass(shared: &Shared, scratch: &mut [u8], current: &mut FileRecord) {
    let terminator = shared.config.terminator;
    loop {
        let n = shared.ring.pop_up_to(scratch);
        if n == 0 {
            break;
        }
        let mut run = &scratch[..n];
        while let Some(idx) = run.iter().position(|b| *b == terminator) {
            append(shared, current, &run[..idx]);
            finalize(shared, current);
            run = &run[idx + 1..];
        }
        append(shared, current, run);
    }
}

/// Append a run to the in-progress record, accounting for lost bytes.
fn append(shared: &Shared, current: &mut FileRecord, data: &[u8]) {
    if data.is_empty() {
        return;
    }
    let written = current.append(data);
    shared
        .buffered_bytes
        .fetch_add(written as u64, Ordering::Relaxed);
    if written < data.len() {
        // Non-fatal: the record stays short and the rest of this run is lost.
        warn!(
            lost = data.len() - written,
            record_bytes = current.tail(),
            "page pool exhausted during drain; dropping append remainder"
        );
    }
}

/// Move the finished record to the completed queue and start a fresh one.
fn finalize(shared: &Shared, current: &mut FileRecord) {
    let done = std::mem::replace(current, FileRecord::new(shared.pool.clone()));
    debug!(
        bytes = done.tail(),
        pages = done.page_count(),
        "file finalized"
    );
    shared.queue.enqueue(done);
}
