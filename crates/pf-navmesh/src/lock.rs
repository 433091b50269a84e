//! Navmesh concurrency guard.
//!
//! Path workers read the mesh concurrently; the main thread occasionally
//! takes it exclusively to rebuild a region.  The guard wraps a task-fair
//! `parking_lot::RwLock`: once a writer is queued, new readers block, so a
//! steady stream of readers cannot starve a rebuild.
//!
//! Long corridor searches call [`NavMeshReadGuard::yield_to_writers`] between
//! iteration slices.  That is a fair release and immediate reacquire, which
//! costs nothing when no writer waits and otherwise lets the writer in before
//! the reader resumes.  A pending write therefore waits at most one slice per
//! active reader.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub struct NavMeshLock<T> {
    inner:  RwLock<T>,
    yields: AtomicU64,
    writes: AtomicU64,
}

impl<T> NavMeshLock<T> {
    pub fn new(mesh: T) -> Self {
        Self { inner: RwLock::new(mesh), yields: AtomicU64::new(0), writes: AtomicU64::new(0) }
    }

    /// Enter a read section.  Blocks while a writer is active or waiting.
    pub fn read(&self) -> NavMeshReadGuard<'_, T> {
        NavMeshReadGuard { guard: self.inner.read(), lock: self }
    }

    /// Enter the exclusive write section.
    pub fn write(&self) -> NavMeshWriteGuard<'_, T> {
        let guard = self.inner.write();
        self.writes.fetch_add(1, Ordering::Relaxed);
        NavMeshWriteGuard { guard }
    }

    /// Total reader yields so far.
    pub fn yield_count(&self) -> u64 {
        self.yields.load(Ordering::Relaxed)
    }

    /// Total write sections entered so far.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

// ── Guards ────────────────────────────────────────────────────────────────────

/// Shared read section.  Released on drop.
pub struct NavMeshReadGuard<'a, T> {
    guard: RwLockReadGuard<'a, T>,
    lock:  &'a NavMeshLock<T>,
}

impl<T> NavMeshReadGuard<'_, T> {
    /// Release and immediately reacquire the read section, handing the lock
    /// to a waiting writer first if there is one.
    pub fn yield_to_writers(&mut self) {
        RwLockReadGuard::bump(&mut self.guard);
        self.lock.yields.fetch_add(1, Ordering::Relaxed);
    }
}

impl<T> Deref for NavMeshReadGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

/// Exclusive write section.  Released on drop.
pub struct NavMeshWriteGuard<'a, T> {
    guard: RwLockWriteGuard<'a, T>,
}

impl<T> Deref for NavMeshWriteGuard<'_, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for NavMeshWriteGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}
