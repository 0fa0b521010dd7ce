//! Known-hosts certificate store.
//!
//! Persists, per endpoint `(host, port)`, the identity of the certificate the
//! endpoint presented, under a caller-supplied root directory:
//!
//! ```text
//! {root}/
//! ├── known_hosts2         — the table, one compact record per endpoint
//! ├── known_hosts2.lock    — exists only while a writer is committing
//! └── certs/               — full certificate text per record
//!     └── {digest}.pem
//! ```
//!
//! `{digest}` is the hex SHA-256 of the record's host, port and fingerprint,
//! so a side-file can only ever be attached to the record it was written for.
//!
//! Nothing is cached between calls: every operation re-reads the committed
//! table, so several processes can share one store. Writers serialize through
//! [`StoreLock`]; readers never wait.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::atomic::write_atomic;
use super::format::Table;
use super::lock::StoreLock;
use crate::certificate::{compare, CertificateData};
use crate::config::StoreOptions;
use crate::error::Result;

const LOCK_SUFFIX: &str = "lock";
const PEM_EXTENSION: &str = "pem";

// ── TrustStatus ───────────────────────────────────────────────────────────────

/// Outcome of checking a presented certificate against the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustStatus {
    /// A record exists and matches subject, issuer and fingerprint.
    Trusted,
    /// A record exists for the endpoint but describes another certificate.
    Mismatch(CertificateData),
    /// The endpoint has never been saved.
    Unknown,
}

// ── CertificateStore ──────────────────────────────────────────────────────────

/// Filesystem-backed trust-on-first-use store keyed by `(host, port)`.
///
/// Construction performs no I/O. The root directory, table and `certs/`
/// directory are created by the first `save`.
#[derive(Debug, Clone)]
pub struct CertificateStore {
    root: PathBuf,
    options: StoreOptions,
}

impl CertificateStore {
    /// Create a store rooted at `root` with default options.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_options(root, StoreOptions::default())
    }

    /// Create a store rooted at `root` with explicit options.
    pub fn with_options(root: impl Into<PathBuf>, options: StoreOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Path of the table file.
    pub fn table_path(&self) -> PathBuf {
        self.root.join(&self.options.table_name)
    }

    /// Path of the side-file directory.
    pub fn certs_dir(&self) -> PathBuf {
        self.root.join(&self.options.certs_dir)
    }

    /// Path of the writer lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.root
            .join(format!("{}.{LOCK_SUFFIX}", self.options.table_name))
    }

    /// Path of the side-file holding `data`'s certificate text.
    pub fn cert_path(&self, data: &CertificateData) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(data.host().as_bytes());
        hasher.update([0]);
        hasher.update(data.port().to_be_bytes());
        hasher.update([0]);
        hasher.update(data.fingerprint().as_bytes());
        let digest = hex::encode(hasher.finalize());

        self.certs_dir().join(format!("{digest}.{PEM_EXTENSION}"))
    }

    // ── Reads ─────────────────────────────────────────────────────────────────

    /// Load the record for `(host, port)`.
    ///
    /// Returns `Ok(None)` if the endpoint was never saved (or the store does
    /// not exist yet). The certificate text is attached when its side-file
    /// is present.
    ///
    /// Table and side-file are read without the writer lock. If the side-file
    /// is missing, the table is read once more, since a `save` committing in
    /// between removes the replaced record's side-file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the table or side-file exists but cannot
    /// be read.
    pub fn load(&self, host: &str, port: u16) -> Result<Option<CertificateData>> {
        let table = self.read_table()?;
        match table.get(host, port).cloned() {
            Some(record) => self.attach_pem(record).map(Some),
            None => Ok(None),
        }
    }

    /// Check a presented certificate against the stored record.
    ///
    /// # Errors
    ///
    /// Same as [`CertificateStore::load`].
    pub fn contains(&self, data: &CertificateData) -> Result<TrustStatus> {
        Ok(match self.load(data.host(), data.port())? {
            None => TrustStatus::Unknown,
            Some(stored) if compare(data, &stored) => TrustStatus::Trusted,
            Some(stored) => TrustStatus::Mismatch(stored),
        })
    }

    /// List every well-formed record in table order, without certificate text.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the table exists but cannot be read.
    pub fn entries(&self) -> Result<Vec<CertificateData>> {
        Ok(self.read_table()?.records().cloned().collect())
    }

    /// Read and parse the committed table. A missing file is an empty table.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` for any read failure other than not-found.
    pub fn read_table(&self) -> Result<Table> {
        let path = self.table_path();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => return Err(e.into()),
        };

        Ok(Table::parse_bytes(&bytes))
    }

    // ── Writes ────────────────────────────────────────────────────────────────

    /// Insert or replace the record for `data`'s endpoint.
    ///
    /// Last write wins: any previous record for the same key is replaced in
    /// full, including its certificate text.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockTimeout` if a competing writer holds the lock
    /// for longer than the configured timeout, or `StoreError::Io` on any
    /// filesystem failure. The committed table is unchanged on error.
    pub fn save(&self, data: &CertificateData) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        let _lock = StoreLock::acquire(&self.lock_path(), &self.options)?;

        let mut table = self.read_table()?;
        let side_file = self.cert_path(data);

        // Side-file first: a crash before the table commit leaves an orphan,
        // never a record pointing at missing or foreign text.
        if let Some(pem) = data.pem() {
            std::fs::create_dir_all(self.certs_dir())?;
            write_atomic(&side_file, pem.as_bytes())?;
        }

        let previous = table.upsert(data);
        write_atomic(&self.table_path(), &table.encode())?;

        if data.pem().is_none() {
            discard_side_file(&side_file);
        }
        if let Some(previous) = previous {
            let previous_file = self.cert_path(&previous);
            if previous_file != side_file {
                discard_side_file(&previous_file);
            }
        }

        log::debug!("saved {}:{}", data.host(), data.port());
        Ok(())
    }

    /// Remove the record for `data`'s endpoint. Only the key is consulted.
    ///
    /// Removing an absent endpoint succeeds and leaves the store untouched.
    ///
    /// # Errors
    ///
    /// Same as [`CertificateStore::save`].
    pub fn remove(&self, data: &CertificateData) -> Result<()> {
        self.remove_key(data.host(), data.port())
    }

    /// Remove the record for `(host, port)`.
    ///
    /// # Errors
    ///
    /// Same as [`CertificateStore::save`].
    pub fn remove_key(&self, host: &str, port: u16) -> Result<()> {
        if !self.root.is_dir() {
            return Ok(());
        }
        let _lock = StoreLock::acquire(&self.lock_path(), &self.options)?;

        let mut table = self.read_table()?;
        let Some(removed) = table.remove(host, port) else {
            return Ok(());
        };

        write_atomic(&self.table_path(), &table.encode())?;
        discard_side_file(&self.cert_path(&removed));

        log::debug!("removed {host}:{port}");
        Ok(())
    }

    fn attach_pem(&self, record: CertificateData) -> Result<CertificateData> {
        if let Some(pem) = self.read_pem(&record)? {
            return Ok(record.with_pem(pem));
        }

        let current = self.read_table()?.get(record.host(), record.port()).cloned();
        match current {
            Some(current) if current != record => {
                log::debug!(
                    "{}:{} changed while loading; using the newer record",
                    record.host(),
                    record.port()
                );
                Ok(match self.read_pem(&current)? {
                    Some(pem) => current.with_pem(pem),
                    None => current,
                })
            }
            _ => Ok(record),
        }
    }

    fn read_pem(&self, record: &CertificateData) -> Result<Option<String>> {
        match std::fs::read_to_string(self.cert_path(record)) {
            Ok(pem) => Ok(Some(pem)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Best-effort side-file removal. The table commit has already happened, so
/// a leftover file is only an orphan.
fn discard_side_file(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => log::warn!("failed to remove side-file {}: {e}", path.display()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
