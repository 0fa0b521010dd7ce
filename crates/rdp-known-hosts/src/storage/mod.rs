//! Storage layer for the known-hosts table and certificate side-files.
//!
//! # Modules
//!
//! - [`format`] — line codec for the table file.
//! - [`atomic`] — write-temp, sync, rename file replacement.
//! - [`lock`] — cross-process writer lock with bounded wait.
//! - [`store`] — `CertificateStore`, keyed CRUD over `(host, port)`.

pub mod atomic;
pub mod format;
pub mod lock;
pub mod store;

pub use atomic::write_atomic;
pub use format::{FormatWarning, Table};
pub use lock::StoreLock;
pub use store::{CertificateStore, TrustStatus};
