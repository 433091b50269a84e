//! Completion handle for a scheduled batch.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

struct Completion {
    done: Mutex<bool>,
    cv:   Condvar,
}

/// Cheap, cloneable view of one schedule's completion.
///
/// Completion is signalled only after the workers have dropped every
/// reference to the job's buffers.
#[derive(Clone)]
pub struct JobHandle {
    inner: Arc<Completion>,
}

impl JobHandle {
    pub(crate) fn pending() -> Self {
        Self { inner: Arc::new(Completion { done: Mutex::new(false), cv: Condvar::new() }) }
    }

    /// A handle that is already complete (empty batches).
    pub(crate) fn finished() -> Self {
        let h = Self::pending();
        h.complete();
        h
    }

    pub(crate) fn complete(&self) {
        let mut done = self.inner.done.lock();
        *done = true;
        self.inner.cv.notify_all();
    }

    /// Non-blocking poll.
    pub fn is_completed(&self) -> bool {
        *self.inner.done.lock()
    }

    /// Block until the batch completes.
    pub fn wait(&self) {
        let mut done = self.inner.done.lock();
        while !*done {
            self.inner.cv.wait(&mut done);
        }
    }

    /// Block for at most `timeout`.  Returns `true` if the batch completed.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut done = self.inner.done.lock();
        while !*done {
            if self.inner.cv.wait_until(&mut done, deadline).timed_out() {
                break;
            }
        }
        *done
    }

    /// `true` if both handles observe the same schedule.
    pub fn same_schedule(&self, other: &JobHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobHandle").field("completed", &self.is_completed()).finish()
    }
}
