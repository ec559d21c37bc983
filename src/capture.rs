//! Append-only capture buffer for boot-time log history.
//!
//! # Architecture
//!
//! ```text
//! dispatch (task or ISR)      CaptureBuffer                drain timers
//! ──────────────────────      ─────────────                ────────────
//!
//! reserve  ──[cs]──▶ [....committed....|in flight|free] ◀── read [sent, W)
//! copy     (no lock)          0        W        reserved  C
//! commit   ──[cs]──▶
//! ```
//!
//! # Rules
//!
//! - The write cursor never wraps: once full, appends are truncated and
//!   then dropped. Capacity is a hard ceiling.
//! - Bytes below the committed cursor `W` are never rewritten, so readers
//!   copy them without holding the critical section.
//! - The critical section only guards cursor integers, never a copy.
//! - `W` only advances when no writer is in flight. A task preempted
//!   mid-copy by an ISR append therefore never exposes a hole.

use core::cell::{Cell, UnsafeCell};
use core::ops::Range;

use critical_section::{CriticalSection, Mutex};

use crate::config::CAPTURE_CAPACITY;

#[derive(Clone, Copy)]
struct Cursor {
    /// End of the last reserved range.
    reserved: usize,
    /// `W`: every byte below this is written and immutable.
    committed: usize,
    /// Reservations not yet committed.
    writers: u32,
    /// Bytes refused because the buffer was full.
    dropped: usize,
}

impl Cursor {
    const EMPTY: Self = Self {
        reserved: 0,
        committed: 0,
        writers: 0,
        dropped: 0,
    };
}

/// Fixed-capacity, append-only byte store.
///
/// # Safety
///
/// This type uses `UnsafeCell` internally but is safe to share because:
/// - Every writer owns a disjoint range handed out under the critical section
/// - Readers only touch `[0, W)`, which no writer can reach again
/// - The critical section orders the copy before the cursor publishing it
pub struct CaptureBuffer<const C: usize = CAPTURE_CAPACITY> {
    bytes: UnsafeCell<[u8; C]>,
    cursor: Mutex<Cell<Cursor>>,
}

// SAFETY: Disjoint writer ranges, readers confined to committed bytes.
unsafe impl<const C: usize> Sync for CaptureBuffer<C> {}
unsafe impl<const C: usize> Send for CaptureBuffer<C> {}

impl<const C: usize> CaptureBuffer<C> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            bytes: UnsafeCell::new([0; C]),
            cursor: Mutex::new(Cell::new(Cursor::EMPTY)),
        }
    }

    /// Append as much of `line` as fits.
    ///
    /// Returns the number of bytes captured: `line.len()`, fewer when the
    /// buffer fills up, 0 once full. Never blocks, never allocates.
    pub fn append(&self, line: &[u8]) -> usize {
        let range = critical_section::with(|cs| self.reserve(cs, line.len()));
        let n = range.len();
        self.fill(range, line);
        critical_section::with(|cs| self.commit(cs));
        n
    }

    /// Committed write cursor `W`.
    #[inline]
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.cursor.borrow(cs).get().committed)
    }

    /// True if nothing was captured yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once no more bytes can be captured.
    #[inline]
    pub fn is_full(&self) -> bool {
        critical_section::with(|cs| self.cursor.borrow(cs).get().reserved) >= C
    }

    /// Buffer capacity `C`.
    #[inline]
    pub const fn capacity(&self) -> usize {
        C
    }

    /// Bytes refused since boot because the buffer was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        critical_section::with(|cs| self.cursor.borrow(cs).get().dropped)
    }

    /// Copy the captured history from offset 0 into `dest`.
    ///
    /// Returns the number of bytes copied, at most `dest.len()`.
    pub fn snapshot(&self, dest: &mut [u8]) -> usize {
        let w = self.len();
        let n = dest.len().min(w);
        dest[..n].copy_from_slice(self.committed(0..n));
        n
    }

    /// Reserve up to `want` bytes at the tail.
    ///
    /// The returned range is empty when the buffer is full. Must be paired
    /// with [`commit`](Self::commit) once filled.
    pub(crate) fn reserve(&self, cs: CriticalSection<'_>, want: usize) -> Range<usize> {
        let cell = self.cursor.borrow(cs);
        let mut cur = cell.get();
        let start = cur.reserved;
        let n = want.min(C - start);
        cur.reserved += n;
        cur.dropped += want - n;
        cur.writers += 1;
        cell.set(cur);
        start..start + n
    }

    /// Copy bytes into a reserved range. Called outside the critical section.
    pub(crate) fn fill(&self, range: Range<usize>, line: &[u8]) {
        let n = range.len();
        if n == 0 {
            return;
        }
        // SAFETY: `range` was handed to this writer alone by `reserve`, lies
        // within `[0, C)` and above `W`, so no reader or writer aliases it.
        unsafe {
            let dst = (self.bytes.get() as *mut u8).add(range.start);
            core::ptr::copy_nonoverlapping(line.as_ptr(), dst, n);
        }
    }

    /// Release a reservation; publishes `W` once no writer is in flight.
    pub(crate) fn commit(&self, cs: CriticalSection<'_>) {
        let cell = self.cursor.borrow(cs);
        let mut cur = cell.get();
        cur.writers -= 1;
        if cur.writers == 0 {
            cur.committed = cur.reserved;
        }
        cell.set(cur);
    }

    /// `W`, read inside an existing critical section.
    #[inline]
    pub(crate) fn committed_in(&self, cs: CriticalSection<'_>) -> usize {
        self.cursor.borrow(cs).get().committed
    }

    /// `W` if no writer is in flight, i.e. `W` equals the reserved tail.
    #[inline]
    pub(crate) fn settled_in(&self, cs: CriticalSection<'_>) -> Option<usize> {
        let cur = self.cursor.borrow(cs).get();
        (cur.writers == 0).then_some(cur.committed)
    }

    /// Borrow committed bytes.
    ///
    /// # Panics
    ///
    /// Panics if the range reaches past `W`.
    pub(crate) fn committed(&self, range: Range<usize>) -> &[u8] {
        assert!(range.start <= range.end && range.end <= self.len());
        // SAFETY: `[0, W)` is immutable once committed.
        unsafe {
            let src = (self.bytes.get() as *const u8).add(range.start);
            core::slice::from_raw_parts(src, range.len())
        }
    }
}

impl<const C: usize> Default for CaptureBuffer<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_snapshot() {
        let buf = CaptureBuffer::<64>::new();
        assert!(buf.is_empty());

        assert_eq!(buf.append(b"boot: "), 6);
        assert_eq!(buf.append(b"ok\n"), 3);
        assert_eq!(buf.len(), 9);

        let mut out = [0u8; 64];
        let n = buf.snapshot(&mut out);
        assert_eq!(&out[..n], b"boot: ok\n");
    }

    #[test]
    fn test_truncation_at_capacity() {
        let buf = CaptureBuffer::<16>::new();

        assert_eq!(buf.append(b"HELLOWORLD"), 10);
        assert_eq!(buf.len(), 10);

        assert_eq!(buf.append(b"ABCDEFGH"), 6);
        assert_eq!(buf.len(), 16);
        assert!(buf.is_full());

        assert_eq!(buf.append(b"X"), 0);
        assert_eq!(buf.len(), 16);
        assert_eq!(buf.dropped(), 3);

        let mut out = [0u8; 16];
        buf.snapshot(&mut out);
        assert_eq!(&out, b"HELLOWORLDABCDEF");
    }

    #[test]
    fn test_snapshot_shorter_dest() {
        let buf = CaptureBuffer::<32>::new();
        buf.append(b"0123456789");

        let mut out = [0u8; 4];
        assert_eq!(buf.snapshot(&mut out), 4);
        assert_eq!(&out, b"0123");
    }

    #[test]
    fn test_in_flight_writer_hides_later_commit() {
        let buf = CaptureBuffer::<32>::new();

        // Task reserves, then an "ISR" appends before the task commits.
        let task = critical_section::with(|cs| buf.reserve(cs, 4));
        assert_eq!(buf.append(b"isr!"), 4);

        // The ISR bytes must not be visible while the task range is a hole.
        assert_eq!(buf.len(), 0);
        critical_section::with(|cs| assert_eq!(buf.settled_in(cs), None));

        buf.fill(task, b"task");
        critical_section::with(|cs| buf.commit(cs));

        assert_eq!(buf.len(), 8);
        assert_eq!(buf.committed(0..8), b"taskisr!");
    }

    #[test]
    fn test_concurrent_appends_keep_lines_intact() {
        use std::sync::Arc;
        use std::thread;

        let buf = Arc::new(CaptureBuffer::<4096>::new());
        let mut handles = vec![];

        for t in 0..4u8 {
            let buf = Arc::clone(&buf);
            handles.push(thread::spawn(move || {
                let line = [b'a' + t; 8];
                for _ in 0..100 {
                    buf.append(&line);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }

        // 4 × 100 × 8 = 3200 bytes, all fit.
        assert_eq!(buf.len(), 3200);
        for chunk in buf.committed(0..3200).chunks(8) {
            assert!(chunk.iter().all(|b| *b == chunk[0]));
        }
    }
}
