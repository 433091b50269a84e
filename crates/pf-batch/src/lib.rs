//! `pf-batch`: one origin, many destinations, one path per destination,
//! computed in parallel off the simulation thread.
//!
//! # Crate layout
//!
//! | Module      | Contents                                                     |
//! |-------------|--------------------------------------------------------------|
//! | [`job`]     | `FindPathsJob`, `SlotStatus`, `FailureReason`               |
//! | [`handle`]  | `JobHandle`: completion polling / waiting                  |
//! | [`workers`] | `PathWorkers`: rayon pool + navmesh guard + query pool     |
//! | [`error`]   | `BatchError`, `BatchResult<T>`                              |
//!
//! # Threading model
//!
//! The simulation thread owns each [`FindPathsJob`] and only ever calls
//! `initialize`, `schedule`, `cancel`, and the read accessors.  Workers
//! write nothing but their own slot's output.  A job may be re-initialised
//! only after the [`JobHandle`] of its previous schedule reports completion.

pub mod error;
pub mod handle;
pub mod job;
pub mod workers;

#[cfg(test)]
mod tests;

pub use error::{BatchError, BatchResult};
pub use handle::JobHandle;
pub use job::{FailureReason, FindPathsJob, SlotStatus};
pub use workers::{JobParams, PathWorkers};
