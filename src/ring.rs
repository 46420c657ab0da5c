#![allow(unsafe_code)]
//! Fixed-capacity staging ring buffer for reassembled bytes.
//!
//! Single producer (the notification-context ingest handle), single consumer
//! (the drain worker). Both cursors are monotonically increasing `u64`s; the
//! physical offset is `cursor % capacity` and occupancy is `tail - head`.
//! Pushes never block and never allocate - a full buffer is a hard rejection
//! and the caller accounts the sample as dropped.
//!
//! # Thread Safety
//!
//! - The producer writes data at `tail % capacity` and then publishes with a
//!   Release store of `tail`; the consumer loads `tail` with Acquire before
//!   reading, so published bytes are visible.
//! - The consumer copies from `head % capacity` and advances `head` with a
//!   Release store; the producer loads `head` with Acquire before checking
//!   for space, so it never overwrites unconsumed bytes.
//! - Producer and consumer therefore always touch disjoint regions of the
//!   backing storage. The SPSC contract (one pusher, one popper) is upheld by
//!   construction: only `SampleIntake` pushes and only the drain task pops.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free single-producer single-consumer byte ring.
pub struct SampleRing {
    /// Backing storage, `capacity` bytes. Accessed through raw pointers only.
    buf: UnsafeCell<Box<[u8]>>,
    /// Consumer cursor (monotonic, never wraps).
    head: AtomicU64,
    /// Producer cursor (monotonic, never wraps).
    tail: AtomicU64,
    capacity: u64,
}

// SAFETY: all access to `buf` goes through raw-pointer reads/writes guarded by
// the head/tail Acquire/Release protocol documented above; producer and
// consumer never touch the same byte concurrently.
unsafe impl Send for SampleRing {}
unsafe impl Sync for SampleRing {}

impl SampleRing {
    /// Create a ring with the given fixed capacity in bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be > 0");
        Self {
            buf: UnsafeCell::new(vec![0u8; capacity].into_boxed_slice()),
            head: AtomicU64::new(0),
            tail: AtomicU64::new(0),
            capacity: capacity as u64,
        }
    }

    /// Capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    /// Current occupancy in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.saturating_sub(head) as usize
    }

    /// Whether the ring holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Push one byte. Producer side only.
    ///
    /// Returns `false` without modifying the buffer when the ring is full;
    /// the byte is lost and the caller must account for the drop. Existing
    /// buffered bytes are never disturbed by a rejected push.
    pub fn try_push(&self, byte: u8) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail - head == self.capacity {
            return false;
        }

        let offset = (tail % self.capacity) as usize;
        // SAFETY: offset < capacity, and the slot at `tail % capacity` is not
        // readable by the consumer until the Release store below publishes it.
        unsafe {
            let base = (*self.buf.get()).as_mut_ptr();
            base.add(offset).write(byte);
        }
        self.tail.store(tail + 1, Ordering::Release);
        true
    }

    /// Pop up to `dst.len()` bytes from the head in FIFO order. Consumer side
    /// only.
    ///
    /// Copies across the wrap point when needed and advances the head cursor
    /// by the number of bytes copied. Returns that count (0 when empty).
    pub fn pop_up_to(&self, dst: &mut [u8]) -> usize {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        let available = (tail - head) as usize;
        let n = available.min(dst.len());
        if n == 0 {
            return 0;
        }

        let offset = (head % self.capacity) as usize;
        let first = n.min(self.capacity as usize - offset);
        // SAFETY: the region [head, head + n) was published by the producer's
        // Release store of `tail` (observed via the Acquire load above) and
        // cannot be overwritten until `head` advances. Both copy ranges stay
        // within the `capacity`-byte allocation.
        unsafe {
            let base = (*self.buf.get()).as_ptr();
            std::ptr::copy_nonoverlapping(base.add(offset), dst.as_mut_ptr(), first);
            if first < n {
                std::ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), n - first);
            }
        }
        self.head.store(head + n as u64, Ordering::Release);
        n
    }
}

impl std::fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRing")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_then_pop_preserves_fifo_order() {
        let ring = SampleRing::with_capacity(16);
        for b in b"hello" {
            assert!(ring.try_push(*b));
        }
        let mut out = [0u8; 16];
        let n = ring.pop_up_to(&mut out);
        assert_eq!(&out[..n], b"hello");
        assert!(ring.is_empty());
    }

    #[test]
    fn full_ring_rejects_without_corruption() {
        // Capacity 4: push A,B,C,D, then E must be rejected and the buffered
        // four bytes must drain unchanged.
        let ring = SampleRing::with_capacity(4);
        for b in b"ABCD" {
            assert!(ring.try_push(*b));
        }
        assert!(!ring.try_push(b'E'));
        assert_eq!(ring.len(), 4);

        let mut out = [0u8; 8];
        let n = ring.pop_up_to(&mut out);
        assert_eq!(&out[..n], b"ABCD");
        assert!(ring.is_empty());
    }

    #[test]
    fn wraps_across_the_physical_end() {
        let ring = SampleRing::with_capacity(4);
        let mut out = [0u8; 4];

        // Advance the cursors so the next writes straddle the wrap point.
        for b in b"abc" {
            ring.try_push(*b);
        }
        assert_eq!(ring.pop_up_to(&mut out), 3);

        for b in b"wxyz" {
            assert!(ring.try_push(*b));
        }
        let n = ring.pop_up_to(&mut out);
        assert_eq!(&out[..n], b"wxyz");
    }

    #[test]
    fn pop_respects_destination_size() {
        let ring = SampleRing::with_capacity(8);
        for b in b"abcdef" {
            ring.try_push(*b);
        }
        let mut small = [0u8; 2];
        assert_eq!(ring.pop_up_to(&mut small), 2);
        assert_eq!(&small, b"ab");
        assert_eq!(ring.len(), 4);

        let mut rest = [0u8; 8];
        let n = ring.pop_up_to(&mut rest);
        assert_eq!(&rest[..n], b"cdef");
    }

    #[test]
    fn concurrent_producer_consumer_delivers_everything_in_order() {
        use std::sync::Arc;

        let ring = Arc::new(SampleRing::with_capacity(64));
        let producer = Arc::clone(&ring);
        let total = 10_000u32;

        let writer = std::thread::spawn(move || {
            let mut sent = 0u32;
            while sent < total {
                if producer.try_push((sent % 251) as u8) {
                    sent += 1;
                } else {
                    std::thread::yield_now();
                }
            }
        });

        let mut received = 0u32;
        let mut scratch = [0u8; 64];
        while received < total {
            let n = ring.pop_up_to(&mut scratch);
            for b in &scratch[..n] {
                assert_eq!(*b, (received % 251) as u8);
                received += 1;
            }
            if n == 0 {
                std::thread::yield_now();
            }
        }
        writer.join().expect("producer thread panicked");
    }
}
