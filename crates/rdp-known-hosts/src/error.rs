//! Error types for the known-hosts store.
//!
//! All errors are strongly typed and propagated without panicking.
//! Malformed table lines are not errors: they surface as
//! [`FormatWarning`](crate::storage::format::FormatWarning) values instead.

use std::path::PathBuf;
use std::time::Duration;

/// Store error types covering all operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Certificate parse error: {0}")]
    Parse(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out after {waited:?} waiting for store lock {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, StoreError>;
