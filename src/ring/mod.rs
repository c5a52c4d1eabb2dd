//! # Receive Ring Module
//!
//! Circular receive buffers shared between a byte producer (serial reader or
//! simulator) and a polling decoder task.
//!
//! This module handles:
//! - A lock-free single-producer/single-consumer byte ring ([`RxRing`]) that
//!   exposes a count-down "remaining" register like a circular DMA channel
//! - Span computation with wrap-around ([`cursor::RingBufferCursor`])
//! - Draining newly written bytes in arrival order ([`RingReader`])

pub mod cursor;

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use cursor::{RingBufferCursor, RingSpan};

/// Circular receive buffer with a count-down write register.
///
/// `remaining` starts at the capacity, is decremented for every byte written,
/// and wraps from 1 back to the capacity. Old bytes are overwritten without
/// regard for the reader, exactly like a circular DMA receive channel.
///
/// Exactly one producer may call [`RxRing::push`]; any number of readers may
/// snapshot the register.
#[derive(Debug)]
pub struct RxRing {
    cells: Box<[AtomicU8]>,
    remaining: AtomicUsize,
}

impl RxRing {
    /// Creates an empty ring of `capacity` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "ring capacity must be non-zero");
        let cells = (0..capacity).map(|_| AtomicU8::new(0)).collect();
        Self {
            cells,
            remaining: AtomicUsize::new(capacity),
        }
    }

    /// Creates a shared ring ready to be handed to a producer and a consumer.
    #[must_use]
    pub fn shared(capacity: usize) -> Arc<Self> {
        Arc::new(Self::new(capacity))
    }

    /// Ring capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cells.len()
    }

    /// Snapshot of the count-down register.
    ///
    /// This is the only synchronised read on the consumer side: every byte
    /// covered by the snapshot is visible once it returns.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining.load(Ordering::Acquire)
    }

    /// Appends bytes at the current write position (producer side).
    pub fn push(&self, data: &[u8]) {
        let capacity = self.capacity();
        for &byte in data {
            let remaining = self.remaining.load(Ordering::Relaxed);
            let position = capacity - remaining;
            self.cells[position].store(byte, Ordering::Relaxed);

            let next = if remaining <= 1 { capacity } else { remaining - 1 };
            self.remaining.store(next, Ordering::Release);
        }
    }

    /// Reads the byte stored at `index` (modulo capacity).
    #[must_use]
    pub fn byte_at(&self, index: usize) -> u8 {
        self.cells[index % self.capacity()].load(Ordering::Relaxed)
    }
}

/// Consumer half: a ring plus the cursor tracking what has been read.
#[derive(Debug)]
pub struct RingReader {
    ring: Arc<RxRing>,
    cursor: RingBufferCursor,
}

impl RingReader {
    /// Creates a reader positioned at the start of `ring`.
    #[must_use]
    pub fn new(ring: Arc<RxRing>) -> Self {
        let cursor = RingBufferCursor::new(ring.capacity());
        Self { ring, cursor }
    }

    /// Returns the span written since the last drain and advances past it.
    pub fn poll_span(&mut self) -> RingSpan {
        let remaining = self.ring.remaining();
        self.cursor.advance(remaining)
    }

    /// Appends every byte written since the last drain to `out`, oldest first.
    ///
    /// Returns the number of bytes appended.
    pub fn drain_into(&mut self, out: &mut Vec<u8>) -> usize {
        let span = self.poll_span();
        out.extend(span.indices(self.ring.capacity()).map(|i| self.ring.byte_at(i)));
        span.len
    }
}
