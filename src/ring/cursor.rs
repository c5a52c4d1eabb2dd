//! # Ring Buffer Cursor
//!
//! Tracks how many bytes a receiver has appended to a circular buffer since the
//! last poll, given only the receiver's count-down "remaining" register.
//!
//! ## Index Arithmetic
//!
//! ```text
//! current = (N - remaining) mod N
//! new     = (current - last + N) mod N
//! ```
//!
//! The span can never reach `N`: a producer that laps the consumer by a full
//! buffer is indistinguishable from one that wrote nothing.

/// A contiguous (modulo capacity) run of unread bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSpan {
    /// Index of the first unread byte.
    pub start: usize,
    /// Number of unread bytes.
    pub len: usize,
}

impl RingSpan {
    /// Returns true if the span holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterates over the buffer indices covered by this span, wrapping at `capacity`.
    pub fn indices(&self, capacity: usize) -> impl Iterator<Item = usize> {
        let start = self.start;
        (0..self.len).map(move |i| (start + i) % capacity)
    }
}

/// Consumer-side read position over a circular receive buffer.
///
/// # Examples
///
/// ```
/// use robofish::ring::cursor::RingBufferCursor;
///
/// let mut cursor = RingBufferCursor::new(256);
///
/// // Receiver wrote 10 bytes: remaining counted down from 256 to 246
/// let span = cursor.advance(246);
/// assert_eq!(span.start, 0);
/// assert_eq!(span.len, 10);
/// ```
#[derive(Debug, Clone)]
pub struct RingBufferCursor {
    capacity: usize,
    last: usize,
}

impl RingBufferCursor {
    /// Creates a cursor for a buffer of `capacity` bytes, positioned at index 0.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        Self { capacity, last: 0 }
    }

    /// Buffer capacity this cursor was created for.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Last consumed write position.
    #[must_use]
    pub fn position(&self) -> usize {
        self.last
    }

    /// Absolute write position implied by a `remaining` register snapshot.
    #[must_use]
    pub fn write_position(&self, remaining: usize) -> usize {
        (self.capacity - remaining.min(self.capacity)) % self.capacity
    }

    /// Computes the unread span without moving the cursor.
    #[must_use]
    pub fn pending(&self, remaining: usize) -> RingSpan {
        let current = self.write_position(remaining);
        RingSpan {
            start: self.last,
            len: (current + self.capacity - self.last) % self.capacity,
        }
    }

    /// Computes the unread span and moves the cursor past it.
    ///
    /// The caller is expected to consume every byte of the returned span before
    /// the next call.
    pub fn advance(&mut self, remaining: usize) -> RingSpan {
        let span = self.pending(remaining);
        self.last = self.write_position(remaining);
        span
    }
}
