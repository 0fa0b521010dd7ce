//! Certificate data — the identity a remote endpoint presented.
//!
//! A `CertificateData` binds an endpoint key `(host, port)` to the subject,
//! issuer and fingerprint of the certificate seen there, and optionally to
//! the full PEM text of that certificate.

use serde::Serialize;
use sha2::{Digest, Sha256};
use x509_parser::pem::Pem;
use x509_parser::prelude::*;

use crate::error::{Result, StoreError};

// ── Constants ─────────────────────────────────────────────────────────────────

const PEM_LABEL: &str = "CERTIFICATE";
const PEM_LINE_WIDTH: usize = 64;

// ── CertificateData ───────────────────────────────────────────────────────────

/// Immutable identity of one certificate as seen at one endpoint.
///
/// Values are independent of any store: they are built by the caller from a
/// parsed certificate, or produced by the store when reading a record back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateData {
    host: String,
    port: u16,
    subject: String,
    issuer: String,
    fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pem: Option<String>,
}

impl CertificateData {
    /// Build from a PEM document holding exactly one certificate.
    ///
    /// The PEM text is kept verbatim so that a later
    /// [`compare_ex`](crate::certificate::compare_ex) against a stored copy
    /// is a byte-exact comparison.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` if the input is not UTF-8, does not hold
    /// exactly one `CERTIFICATE` block, or the block is not a well-formed
    /// X.509 certificate. Returns `StoreError::InvalidRecord` if `host` cannot
    /// be stored.
    pub fn from_pem(host: &str, port: u16, pem: &[u8]) -> Result<Self> {
        validate_host(host)?;

        let text = std::str::from_utf8(pem)
            .map_err(|e| StoreError::Parse(format!("PEM input is not UTF-8: {e}")))?;

        let mut blocks = Vec::new();
        for block in Pem::iter_from_buffer(pem) {
            let block = block.map_err(|e| StoreError::Parse(format!("invalid PEM: {e}")))?;
            blocks.push(block);
        }

        let block = match blocks.as_slice() {
            [single] => single,
            [] => return Err(StoreError::Parse("no PEM block found".to_string())),
            many => {
                return Err(StoreError::Parse(format!(
                    "expected a single certificate, found {} PEM blocks",
                    many.len()
                )))
            }
        };

        if block.label != PEM_LABEL {
            return Err(StoreError::Parse(format!(
                "expected {PEM_LABEL} block, got {}",
                block.label
            )));
        }

        let (subject, issuer, fingerprint) = inspect_der(&block.contents)?;

        Ok(Self {
            host: host.to_string(),
            port,
            subject,
            issuer,
            fingerprint,
            pem: Some(text.to_string()),
        })
    }

    /// Build from a DER-encoded certificate, as handed over by a TLS stack.
    ///
    /// The PEM text is synthesised from the DER bytes.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Parse` if `der` is not exactly one well-formed
    /// X.509 certificate, or `StoreError::InvalidRecord` for a bad `host`.
    pub fn from_der(host: &str, port: u16, der: &[u8]) -> Result<Self> {
        validate_host(host)?;
        let (subject, issuer, fingerprint) = inspect_der(der)?;

        Ok(Self {
            host: host.to_string(),
            port,
            subject,
            issuer,
            fingerprint,
            pem: Some(der_to_pem(der)),
        })
    }

    /// Build a compact record without certificate text.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidRecord` if `host` or `fingerprint` cannot
    /// be represented in the table format.
    pub fn from_parts(
        host: &str,
        port: u16,
        subject: &str,
        issuer: &str,
        fingerprint: &str,
    ) -> Result<Self> {
        validate_host(host)?;
        validate_fingerprint(fingerprint)?;

        Ok(Self {
            host: host.to_string(),
            port,
            subject: subject.to_string(),
            issuer: issuer.to_string(),
            fingerprint: fingerprint.to_string(),
            pem: None,
        })
    }

    /// Attach certificate text loaded from a side-file.
    pub(crate) fn with_pem(mut self, pem: String) -> Self {
        self.pem = Some(pem);
        self
    }

    /// Drop the certificate text, keeping the compact identity.
    pub fn without_pem(mut self) -> Self {
        self.pem = None;
        self
    }

    /// Return the endpoint host name.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Return the endpoint port.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Return the certificate subject distinguished name.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Return the certificate issuer distinguished name.
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Return the colon-separated SHA-256 fingerprint.
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Return the full PEM text, if known.
    pub fn pem(&self) -> Option<&str> {
        self.pem.as_deref()
    }

    /// Return `true` if this record belongs to the endpoint `(host, port)`.
    pub fn is_for(&self, host: &str, port: u16) -> bool {
        self.host == host && self.port == port
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Compute the canonical fingerprint of a DER certificate: SHA-256 as
/// lowercase hex byte pairs joined with `:`.
pub fn fingerprint_der(der: &[u8]) -> String {
    Sha256::digest(der)
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// Parse DER and derive `(subject, issuer, fingerprint)`.
fn inspect_der(der: &[u8]) -> Result<(String, String, String)> {
    let (rest, cert) = parse_x509_certificate(der)
        .map_err(|e| StoreError::Parse(format!("invalid X.509 certificate: {e}")))?;

    if !rest.is_empty() {
        return Err(StoreError::Parse(format!(
            "{} trailing bytes after certificate",
            rest.len()
        )));
    }

    Ok((
        cert.subject().to_string(),
        cert.issuer().to_string(),
        fingerprint_der(der),
    ))
}

fn der_to_pem(der: &[u8]) -> String {
    let body = base64::Engine::encode(&base64::engine::general_purpose::STANDARD, der);
    let mut pem = format!("-----BEGIN {PEM_LABEL}-----\n");
    for line in body.as_bytes().chunks(PEM_LINE_WIDTH) {
        // base64 output is ASCII, so every chunk boundary is a char boundary.
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {PEM_LABEL}-----\n"));
    pem
}

/// Reject hosts the line-oriented table cannot round-trip.
pub(crate) fn validate_host(host: &str) -> Result<()> {
    if host.is_empty() {
        return Err(StoreError::InvalidRecord("host must not be empty".to_string()));
    }
    if host.starts_with('#') {
        return Err(StoreError::InvalidRecord(format!(
            "host must not start with '#': {host}"
        )));
    }
    if host.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(StoreError::InvalidRecord(format!(
            "host contains whitespace or control characters: {host:?}"
        )));
    }
    Ok(())
}

pub(crate) fn validate_fingerprint(fingerprint: &str) -> Result<()> {
    if fingerprint.is_empty() {
        return Err(StoreError::InvalidRecord(
            "fingerprint must not be empty".to_string(),
        ));
    }
    if fingerprint
        .chars()
        .any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(StoreError::InvalidRecord(format!(
            "fingerprint contains whitespace or control characters: {fingerprint:?}"
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
