//! Typed double-buffered event queues.
//!
//! Events sent this frame become readable next frame: `update` clears the
//! read buffer and swaps it with the write buffer, so readers always see
//! a stable snapshot and writers never disturb it.

/// Double-buffered publish/read mailbox for one event type.
pub struct EventQueue<T> {
    current: Vec<T>,
    previous: Vec<T>,
}

impl<T> EventQueue<T> {
    pub fn new() -> Self {
        Self {
            current: Vec::new(),
            previous: Vec::new(),
        }
    }

    /// Create with specific capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            current: Vec::with_capacity(capacity),
            previous: Vec::with_capacity(capacity),
        }
    }

    /// Publish an event into the write buffer.
    pub fn send(&mut self, event: T) {
        self.current.push(event);
    }

    /// Flip the buffers: last frame's events are discarded, this frame's
    /// become readable. Insertion order is preserved across the swap.
    pub fn update(&mut self) {
        self.previous.clear();
        std::mem::swap(&mut self.current, &mut self.previous);
    }

    /// Events published before the last `update`.
    pub fn read(&self) -> &[T] {
        &self.previous
    }

    /// Writer-side view: events published since the last `update`.
    pub fn peek(&self) -> &[T] {
        &self.current
    }

    /// Copy readable events into a caller-owned vector.
    pub fn collect_into(&self, out: &mut Vec<T>)
    where
        T: Clone,
    {
        out.extend_from_slice(&self.previous);
    }

    /// Move the readable events out, leaving a fresh buffer behind.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.previous)
    }

    /// Number of readable events.
    pub fn count(&self) -> usize {
        self.previous.len()
    }

    /// Number of events written since the last `update`.
    pub fn pending_count(&self) -> usize {
        self.current.len()
    }

    /// Discard both buffers.
    pub fn clear(&mut self) {
        self.current.clear();
        self.previous.clear();
    }
}

impl<T> Default for EventQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
