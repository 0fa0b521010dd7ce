//! Identity comparison at two granularities.
//!
//! [`compare`] checks the compact identity (subject, issuer, fingerprint).
//! [`compare_ex`] additionally requires byte-identical certificate text on
//! both sides, so a fingerprint digest collision alone cannot pass it.
//!
//! Neither function looks at the endpoint key: callers compare a freshly
//! presented certificate against the record stored for the same endpoint.

use super::data::CertificateData;

/// Return `true` if subject, issuer and fingerprint are pairwise equal.
pub fn compare(a: &CertificateData, b: &CertificateData) -> bool {
    a.subject() == b.subject() && a.issuer() == b.issuer() && a.fingerprint() == b.fingerprint()
}

/// Return `true` if [`compare`] holds and both sides carry identical PEM text.
///
/// A record without certificate text never passes.
pub fn compare_ex(a: &CertificateData, b: &CertificateData) -> bool {
    if !compare(a, b) {
        return false;
    }
    match (a.pem(), b.pem()) {
        (Some(pa), Some(pb)) => pa == pb,
        _ => false,
    }
}
