//! Certificate identity values and their comparison.
//!
//! The certificate module provides `CertificateData`, the value a caller
//! hands to the store, and the `compare` / `compare_ex` checks used when
//! deciding whether an endpoint still presents the certificate it did before.

pub mod compare;
pub mod data;

pub use compare::{compare, compare_ex};
pub use data::{fingerprint_der, CertificateData};
