//! Dense per-agent storage keyed by [`AgentId`].
//!
//! Agent IDs are small, dense, non-negative integers handed out by the host,
//! so a flat `Vec` indexed by ID beats a hash map.  Storage grows on first
//! reference to an ID and default-constructs every intermediate entry.

use crate::AgentId;

#[derive(Debug)]
pub struct IdMap<T> {
    entries: Vec<T>,
}

impl<T: Default> IdMap<T> {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { entries: Vec::with_capacity(capacity) }
    }

    /// Number of allocated slots (highest referenced ID + 1).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: AgentId) -> Option<&T> {
        self.entries.get(id.index())
    }

    pub fn get_mut(&mut self, id: AgentId) -> Option<&mut T> {
        self.entries.get_mut(id.index())
    }

    /// Entry for `id`, growing storage (with defaults) if `id` is new.
    pub fn get_or_insert_default(&mut self, id: AgentId) -> &mut T {
        debug_assert!(id.is_valid(), "IdMap keyed with AgentId::INVALID");
        self.grow_to(id.index() + 1);
        &mut self.entries[id.index()]
    }

    /// Store `value` under `id` and return the entry it displaced (if the slot
    /// had been allocated).  Dropping the returned value is the teardown hook.
    pub fn replace(&mut self, id: AgentId, value: T) -> Option<T> {
        if id.index() < self.entries.len() {
            Some(std::mem::replace(&mut self.entries[id.index()], value))
        } else {
            *self.get_or_insert_default(id) = value;
            None
        }
    }

    /// Reset `id` to a fresh default, returning the old entry.
    pub fn reset(&mut self, id: AgentId) -> Option<T> {
        if id.index() < self.entries.len() {
            Some(std::mem::take(&mut self.entries[id.index()]))
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &T)> + '_ {
        self.entries.iter().enumerate().map(|(i, e)| (AgentId(i as u32), e))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AgentId, &mut T)> + '_ {
        self.entries.iter_mut().enumerate().map(|(i, e)| (AgentId(i as u32), e))
    }

    fn grow_to(&mut self, len: usize) {
        if len > self.entries.len() {
            // Existing entries are moved, never re-created.
            self.entries.resize_with(len, T::default);
        }
    }
}

impl<T: Default> Default for IdMap<T> {
    fn default() -> Self {
        Self::new()
    }
}
