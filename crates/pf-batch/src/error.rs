//! Batch-subsystem error type.
//!
//! Only setup can fail.  Per-destination failures are slot states, never
//! `Err`.

use thiserror::Error;

use pf_core::PfError;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("worker pool could not be built: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Config(#[from] PfError),
}

pub type BatchResult<T> = Result<T, BatchError>;
