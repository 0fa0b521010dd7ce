//! Store configuration.
//!
//! `StoreOptions` is plain data so a host application can embed it in its
//! own settings file. Every field has a default; missing keys fall back to
//! them when deserializing.
//!
//! ```json
//! {
//!     "table_name": "known_hosts2",
//!     "certs_dir": "certs",
//!     "lock_timeout_ms": 5000,
//!     "lock_retry_ms": 25,
//!     "stale_lock_ms": 30000
//! }
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ── Defaults ──────────────────────────────────────────────────────────────────

/// File name of the current ("V2") table layout.
pub const DEFAULT_TABLE_NAME: &str = "known_hosts2";
pub const DEFAULT_CERTS_DIR: &str = "certs";

const DEFAULT_LOCK_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_LOCK_RETRY_MS: u64 = 25;
const DEFAULT_STALE_LOCK_MS: u64 = 30_000;

// ── StoreOptions ──────────────────────────────────────────────────────────────

/// Tunables for a [`CertificateStore`](crate::storage::CertificateStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
    /// Table file name, relative to the store root.
    pub table_name: String,
    /// Side-file directory name, relative to the store root.
    pub certs_dir: String,
    /// Upper bound on waiting for a competing writer.
    pub lock_timeout_ms: u64,
    /// Delay between lock acquisition attempts.
    pub lock_retry_ms: u64,
    /// Age after which an abandoned lock file is broken. `0` disables this.
    pub stale_lock_ms: u64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            table_name: DEFAULT_TABLE_NAME.to_string(),
            certs_dir: DEFAULT_CERTS_DIR.to_string(),
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            lock_retry_ms: DEFAULT_LOCK_RETRY_MS,
            stale_lock_ms: DEFAULT_STALE_LOCK_MS,
        }
    }
}

impl StoreOptions {
    /// Set the lock acquisition timeout.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout_ms = duration_to_ms(timeout);
        self
    }

    /// Set the delay between lock attempts.
    pub fn with_lock_retry(mut self, interval: Duration) -> Self {
        self.lock_retry_ms = duration_to_ms(interval);
        self
    }

    /// Set the stale-lock threshold. `Duration::ZERO` never breaks a lock.
    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_ms = duration_to_ms(age);
        self
    }

    /// Set the table file name.
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        self.table_name = name.into();
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// Retry interval, never below one millisecond.
    pub fn lock_retry(&self) -> Duration {
        Duration::from_millis(self.lock_retry_ms.max(1))
    }

    /// Stale-lock threshold, or `None` when disabled.
    pub fn stale_lock_after(&self) -> Option<Duration> {
        (self.stale_lock_ms > 0).then(|| Duration::from_millis(self.stale_lock_ms))
    }
}

fn duration_to_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}
