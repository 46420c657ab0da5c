//! Page-backed byte storage for in-flight and completed files.
//!
//! Each file accumulates bytes in an ordered list of fixed-size pages that it
//! owns exclusively. Growth is strictly append-only; reads may start at any
//! offset at or below the tail and span page boundaries transparently.
//!
//! Pages come from a [`PagePool`]: a freelist of recycled page allocations
//! with an optional cap on the number of pages outstanding. Records return
//! their pages to the pool when destroyed, so steady-state operation reuses
//! the same allocations instead of hitting the allocator per file.

use crossbeam_queue::SegQueue;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A fixed-size block of raw bytes owned by exactly one record at a time.
type Page = Box<[u8]>;

struct PoolInner {
    /// Recycled pages ready for reuse.
    free: SegQueue<Page>,
    /// Size of every page handed out by this pool.
    page_size: usize,
    /// Pages allocated and not yet recycled (in use by records).
    in_use: AtomicUsize,
    /// Cap on `in_use`; `usize::MAX` when unbounded.
    max_pages: usize,
}

/// Shared allocator of fixed-size pages with freelist recycling.
#[derive(Clone)]
pub struct PagePool {
    inner: Arc<PoolInner>,
}

impl PagePool {
    /// Create a pool handing out pages of `page_size` bytes.
    ///
    /// `max_pages` caps the number of pages in use at once; `None` leaves the
    /// pool bounded only by the allocator.
    ///
    /// # Panics
    ///
    /// Panics if `page_size` is 0.
    #[must_use]
    pub fn new(page_size: usize, max_pages: Option<usize>) -> Self {
        assert!(page_size > 0, "page_size must be > 0");
        Self {
            inner: Arc::new(PoolInner {
                free: SegQueue::new(),
                page_size,
                in_use: AtomicUsize::new(0),
                max_pages: max_pages.unwrap_or(usize::MAX),
            }),
        }
    }

    /// Size in bytes of every page from this pool.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.inner.page_size
    }

    /// Pages currently held by records.
    #[must_use]
    pub fn pages_in_use(&self) -> usize {
        self.inner.in_use.load(Ordering::Relaxed)
    }

    /// Acquire a page, recycling a freed one when available.
    ///
    /// Returns `None` when the pool cap is reached - the resource-exhaustion
    /// path; callers treat this as a short append, not a fatal error.
    fn try_acquire(&self) -> Option<Page> {
        let inner = &self.inner;
        inner
            .in_use
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < inner.max_pages).then_some(n + 1)
            })
            .ok()?;
        Some(match inner.free.pop() {
            Some(page) => page,
            None => vec![0u8; inner.page_size].into_boxed_slice(),
        })
    }

    /// Return a page to the freelist.
    fn recycle(&self, page: Page) {
        self.inner.free.push(page);
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for PagePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagePool")
            .field("page_size", &self.inner.page_size)
            .field("pages_in_use", &self.pages_in_use())
            .finish()
    }
}

/// One logical file: an ordered page list plus head/tail byte offsets.
///
/// `tail` is the next write position and `head` the next unread position,
/// both relative to the record and monotonically increasing. Exactly one
/// record is in progress (owned by the drain worker) at any time; finalized
/// records move through the completed queue to a single reader session, which
/// destroys the record - and recycles its pages - when released.
#[derive(Debug)]
pub struct FileRecord {
    pages: VecDeque<Page>,
    pool: PagePool,
    /// Next unread byte offset; advanced by the read path.
    head: u64,
    /// Next write offset; advanced by appends.
    tail: u64,
}

impl FileRecord {
    /// Create an empty record drawing pages from `pool`.
    #[must_use]
    pub fn new(pool: PagePool) -> Self {
        Self {
            pages: VecDeque::new(),
            pool,
            head: 0,
            tail: 0,
        }
    }

    /// Bytes not yet consumed by the reader (`tail - head`).
    #[must_use]
    pub fn data_size(&self) -> u64 {
        self.tail - self.head
    }

    /// Total bytes ever appended (the next write offset).
    #[must_use]
    pub fn tail(&self) -> u64 {
        self.tail
    }

    /// Next unread offset.
    #[must_use]
    pub fn head(&self) -> u64 {
        self.head
    }

    /// Number of pages currently linked.
    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append bytes at the tail, linking new pages as needed.
    ///
    /// Returns the number of bytes actually appended. A short count means the
    /// page pool was exhausted mid-append; the record keeps the bytes that
    /// made it in and the caller accounts for the rest as lost. Never a hard
    /// error - this path runs in the deferred-work context with no caller to
    /// report to.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let page_size = self.pool.page_size() as u64;
        let mut written = 0usize;

        while written < data.len() {
            let offset_in_page = (self.tail % page_size) as usize;
            // Tail sits at the start of a page we haven't allocated yet.
            if offset_in_page == 0 && self.tail == self.pages.len() as u64 * page_size {
                match self.pool.try_acquire() {
                    Some(page) => self.pages.push_back(page),
                    None => break,
                }
            }
            let page = match self.pages.back_mut() {
                Some(page) => page,
                None => break,
            };
            let room = (page_size as usize - offset_in_page).min(data.len() - written);
            page[offset_in_page..offset_in_page + room]
                .copy_from_slice(&data[written..written + room]);
            written += room;
            self.tail += room as u64;
        }
        written
    }

    /// Copy bytes starting at `offset` into `dst`, spanning pages as needed.
    ///
    /// Copies up to `dst.len()` or end-of-data, whichever is smaller, and
    /// returns the count. Never allocates. Offsets at or past the tail read
    /// as zero bytes.
    pub fn read_at(&self, offset: u64, dst: &mut [u8]) -> usize {
        if offset >= self.tail {
            return 0;
        }
        let page_size = self.pool.page_size() as u64;
        let total = ((self.tail - offset) as usize).min(dst.len());
        let mut copied = 0usize;

        while copied < total {
            let pos = offset + copied as u64;
            let page_no = (pos / page_size) as usize;
            let start = (pos % page_size) as usize;
            let page = match self.pages.get(page_no) {
                Some(page) => page,
                // Linkage shorter than the tail claims; stop at what we have.
                None => break,
            };
            let take = (page_size as usize - start).min(total - copied);
            dst[copied..copied + take].copy_from_slice(&page[start..start + take]);
            copied += take;
        }
        copied
    }

    /// Advance the read head after the read path consumed `n` bytes.
    pub fn advance_head(&mut self, n: u64) {
        self.head = (self.head + n).min(self.tail);
    }

    /// Whether the page list is empty while data is still claimed to exist -
    /// the defensive corrupted-linkage check on the read path.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        self.pages.is_empty() && self.data_size() > 0
    }
}

impl Drop for FileRecord {
    fn drop(&mut self) {
        let pages = self.pages.len();
        while let Some(page) = self.pages.pop_front() {
            self.pool.recycle(page);
        }
        if pages > 0 {
            debug!(pages, bytes = self.tail, "file record destroyed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(page_size: usize) -> PagePool {
        PagePool::new(page_size, None)
    }

    #[test]
    fn append_grows_pages_on_demand() {
        let mut rec = FileRecord::new(pool(4));
        assert_eq!(rec.append(b"abcdefghij"), 10);
        assert_eq!(rec.page_count(), 3);
        assert_eq!(rec.tail(), 10);
        assert_eq!(rec.data_size(), 10);
    }

    #[test]
    fn read_at_spans_page_boundaries() {
        let mut rec = FileRecord::new(pool(4));
        rec.append(b"abcdefghij");

        let mut out = [0u8; 16];
        let n = rec.read_at(0, &mut out);
        assert_eq!(&out[..n], b"abcdefghij");

        // Start mid-page, cross into the next page.
        let n = rec.read_at(2, &mut out[..5]);
        assert_eq!(&out[..n], b"cdefg");

        // Past the tail reads nothing.
        assert_eq!(rec.read_at(10, &mut out), 0);
        assert_eq!(rec.read_at(99, &mut out), 0);
    }

    #[test]
    fn length_not_a_page_multiple_reads_back_exactly() {
        let mut rec = FileRecord::new(pool(4));
        let content = b"0123456"; // 7 bytes, pages of 4
        rec.append(content);

        let mut collected = Vec::new();
        let mut cursor = 0u64;
        let mut buf = [0u8; 3];
        loop {
            let n = rec.read_at(cursor, &mut buf);
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&buf[..n]);
            cursor += n as u64;
        }
        assert_eq!(collected, content);
    }

    #[test]
    fn exhausted_pool_yields_short_append() {
        let capped = PagePool::new(4, Some(2));
        let mut rec = FileRecord::new(capped.clone());
        // 2 pages = 8 bytes of room.
        assert_eq!(rec.append(b"0123456789"), 8);
        assert_eq!(rec.tail(), 8);
        assert_eq!(capped.pages_in_use(), 2);

        // Still short on a retry while the cap holds.
        assert_eq!(rec.append(b"89"), 0);
    }

    #[test]
    fn dropping_a_record_recycles_its_pages() {
        let capped = PagePool::new(4, Some(1));
        let mut rec = FileRecord::new(capped.clone());
        assert_eq!(rec.append(b"abcd"), 4);
        assert_eq!(capped.pages_in_use(), 1);

        drop(rec);
        assert_eq!(capped.pages_in_use(), 0);

        // The freed page is available again.
        let mut next = FileRecord::new(capped.clone());
        assert_eq!(next.append(b"wxyz"), 4);
        let mut out = [0u8; 4];
        next.read_at(0, &mut out);
        assert_eq!(&out, b"wxyz");
    }

    #[test]
    fn advance_head_tracks_consumption() {
        let mut rec = FileRecord::new(pool(4));
        rec.append(b"abcdef");
        rec.advance_head(4);
        assert_eq!(rec.head(), 4);
        assert_eq!(rec.data_size(), 2);
        // Clamped at the tail.
        rec.advance_head(100);
        assert_eq!(rec.head(), 6);
        assert_eq!(rec.data_size(), 0);
    }
}
