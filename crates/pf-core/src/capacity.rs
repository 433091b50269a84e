//! Grow-only reusable buffer.
//!
//! Batch buffers are sized to the high-water mark of the candidate count and
//! reused across batches, so steady-state operation never reallocates.
//! [`release`](CapacityBuffer::release) is the explicit free.

use std::ops::{Deref, DerefMut};

#[derive(Debug)]
pub struct CapacityBuffer<T> {
    items: Vec<T>,
}

impl<T: Default> CapacityBuffer<T> {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Ensure at least `len` usable slots.  Returns `true` if storage grew.
    ///
    /// Never shrinks; existing slots keep their contents.
    pub fn grow_to(&mut self, len: usize) -> bool {
        if len <= self.items.len() {
            return false;
        }
        self.items.resize_with(len, T::default);
        true
    }

    /// Usable slot count (the high-water mark since the last release).
    pub fn capacity(&self) -> usize {
        self.items.len()
    }

    /// Free all storage.
    pub fn release(&mut self) {
        self.items = Vec::new();
    }
}

impl<T: Default> Default for CapacityBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Deref for CapacityBuffer<T> {
    type Target = [T];
    fn deref(&self) -> &[T] {
        &self.items
    }
}

impl<T> DerefMut for CapacityBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}
