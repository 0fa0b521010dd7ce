//! rdp-known-hosts — trust-on-first-use certificate store.
//!
//! Remembers, for every remote endpoint `(host, port)` a client has connected
//! to, which certificate it presented, so that a later connection can detect
//! a changed certificate without a PKI chain of trust.
//!
//! ```no_run
//! use rdp_known_hosts::{compare, CertificateData, CertificateStore};
//!
//! # fn main() -> rdp_known_hosts::Result<()> {
//! # let pem_bytes = b"";
//! let store = CertificateStore::new("/home/user/.config/rdp");
//! let presented = CertificateData::from_pem("server.example", 3389, pem_bytes)?;
//!
//! match store.load("server.example", 3389)? {
//!     None => store.save(&presented)?,
//!     Some(stored) if compare(&presented, &stored) => {}
//!     Some(_) => eprintln!("certificate changed!"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod certificate;
pub mod config;
pub mod error;
pub mod storage;

// Re-export primary types
pub use certificate::{compare, compare_ex, CertificateData};
pub use config::StoreOptions;
pub use error::{Result, StoreError};
pub use storage::{CertificateStore, FormatWarning, TrustStatus};
