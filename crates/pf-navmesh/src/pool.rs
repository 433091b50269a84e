//! Reusable query handles.
//!
//! A query handle owns all the scratch memory one search needs.  Allocating
//! one per path would dominate short queries, so handles live in a shared free
//! list: a worker takes one for a run of slots and the guard puts it back on
//! drop.  A handle is never held by two running slots at once.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::PathQuery;

pub struct QueryPool<Q> {
    free:      Mutex<Vec<Q>>,
    max_nodes: usize,
    created:   AtomicUsize,
}

impl<Q: PathQuery> QueryPool<Q> {
    /// Empty pool whose handles search at most `max_nodes` polygons.
    /// `capacity_hint` pre-sizes the free list, not the handles.
    pub fn new(max_nodes: usize, capacity_hint: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(capacity_hint)),
            max_nodes,
            created: AtomicUsize::new(0),
        }
    }

    /// Borrow a handle, creating one if the free list is empty.
    pub fn take(&self) -> PooledQuery<'_, Q> {
        let reused = self.free.lock().pop();
        let query = reused.unwrap_or_else(|| {
            self.created.fetch_add(1, Ordering::Relaxed);
            Q::with_max_nodes(self.max_nodes)
        });
        PooledQuery { pool: self, query: Some(query) }
    }

    /// Handles currently idle in the free list.
    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }

    /// Handles created over the pool's lifetime.
    pub fn created(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    pub fn max_nodes(&self) -> usize {
        self.max_nodes
    }
}

/// A handle on loan from a [`QueryPool`].
pub struct PooledQuery<'a, Q: PathQuery> {
    pool:  &'a QueryPool<Q>,
    query: Option<Q>,
}

impl<Q: PathQuery> Deref for PooledQuery<'_, Q> {
    type Target = Q;
    fn deref(&self) -> &Q {
        // Only `drop` empties the option.
        match &self.query {
            Some(q) => q,
            None => unreachable!("pooled query used after return"),
        }
    }
}

impl<Q: PathQuery> DerefMut for PooledQuery<'_, Q> {
    fn deref_mut(&mut self) -> &mut Q {
        match &mut self.query {
            Some(q) => q,
            None => unreachable!("pooled query used after return"),
        }
    }
}

impl<Q: PathQuery> Drop for PooledQuery<'_, Q> {
    fn drop(&mut self) {
        if let Some(q) = self.query.take() {
            self.pool.free.lock().push(q);
        }
    }
}
