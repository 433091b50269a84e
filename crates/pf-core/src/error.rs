//! Workspace base error type.
//!
//! Sub-crates define their own enums for their own failure sites; `PfError`
//! covers configuration and the I/O around it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PfError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shorthand result type for `pf-core`.
pub type PfResult<T> = Result<T, PfError>;
