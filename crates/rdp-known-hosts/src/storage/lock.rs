//! Cross-process writer lock.
//!
//! A writer owns the store while the lock file `<table>.lock` exists. The
//! file is created with `create_new`, which is atomic on every platform and
//! filesystem the store targets, so exactly one process or thread wins.
//! Readers never look at the lock.
//!
//! The file holds a token unique to its owner. Releasing and stale-breaking
//! both rename the file aside before looking at it, so a guard never deletes
//! a lock that another writer has since acquired.
//!
//! A lock left behind by a crashed writer is broken once it is older than the
//! configured stale threshold.

use std::ffi::OsString;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crate::config::StoreOptions;
use crate::error::{Result, StoreError};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(0);

/// Guard for an acquired store lock. Dropping it releases the lock.
#[derive(Debug)]
pub struct StoreLock {
    path: PathBuf,
    token: String,
}

impl StoreLock {
    /// Acquire the lock at `path`, waiting at most `options.lock_timeout()`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LockTimeout` if another writer holds the lock for
    /// the whole wait, or `StoreError::Io` if the lock file cannot be created
    /// for any other reason.
    pub fn acquire(path: &Path, options: &StoreOptions) -> Result<Self> {
        let started = Instant::now();
        let timeout = options.lock_timeout();
        let token = unique_token();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{token}") {
                        let _ = std::fs::remove_file(path);
                        return Err(e.into());
                    }
                    return Ok(Self {
                        path: path.to_path_buf(),
                        token,
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if break_if_stale(path, options.stale_lock_after()) {
                        continue;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                return Err(StoreError::LockTimeout {
                    path: path.to_path_buf(),
                    waited,
                });
            }
            std::thread::sleep(options.lock_retry().min(timeout - waited));
        }
    }

    /// Path of the lock file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Owner token written into the lock file.
    pub fn token(&self) -> &str {
        &self.token
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        match release(&self.path, &self.token) {
            Ok(true) => {}
            Ok(false) => log::warn!(
                "store lock {} was broken while held; leaving the new owner's lock",
                self.path.display()
            ),
            Err(e) => log::warn!("failed to release store lock {}: {e}", self.path.display()),
        }
    }
}

/// `pid-nanos-counter`: distinct across processes and across guards of one
/// process.
fn unique_token() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    format!(
        "{}-{nanos}-{}",
        std::process::id(),
        NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)
    )
}

/// Atomically move the lock file to a private name.
///
/// Returns `None` if there was no lock file to take.
fn sideline(path: &Path) -> std::io::Result<Option<PathBuf>> {
    let mut name = OsString::from(path.as_os_str());
    name.push(format!(".{}", unique_token()));
    let taken = PathBuf::from(name);

    match std::fs::rename(path, &taken) {
        Ok(()) => Ok(Some(taken)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Put a sidelined lock back, unless a new lock has appeared meanwhile.
fn restore(taken: &Path, path: &Path) {
    // hard_link fails if `path` exists, unlike rename.
    if let Err(e) = std::fs::hard_link(taken, path) {
        log::warn!("failed to restore store lock {}: {e}", path.display());
    }
    let _ = std::fs::remove_file(taken);
}

/// Remove the lock file if it still carries `token`.
///
/// Returns `Ok(false)` if the file is gone or belongs to someone else.
fn release(path: &Path, token: &str) -> std::io::Result<bool> {
    let Some(taken) = sideline(path)? else {
        return Ok(false);
    };

    let owner = std::fs::read_to_string(&taken).unwrap_or_default();
    if owner.trim() == token {
        std::fs::remove_file(&taken)?;
        Ok(true)
    } else {
        restore(&taken, path);
        Ok(false)
    }
}

fn lock_age(path: &Path) -> std::io::Result<Duration> {
    let modified = std::fs::metadata(path)?.modified()?;
    Ok(SystemTime::now()
        .duration_since(modified)
        .unwrap_or(Duration::ZERO))
}

/// Remove the lock file if it is older than `stale_after`.
///
/// Returns `true` if the caller should retry immediately.
fn break_if_stale(path: &Path, stale_after: Option<Duration>) -> bool {
    let Some(stale_after) = stale_after else {
        return false;
    };

    match lock_age(path) {
        Ok(age) if age < stale_after => return false,
        Ok(_) => {}
        // Released between our attempt and now.
        Err(e) if e.kind() == ErrorKind::NotFound => return true,
        Err(_) => return false,
    }

    let taken = match sideline(path) {
        Ok(Some(taken)) => taken,
        Ok(None) => return true,
        Err(_) => return false,
    };

    // Another contender may have broken the stale lock and a new owner
    // created a fresh one between the age check and the rename.
    match lock_age(&taken) {
        Ok(age) if age >= stale_after => {
            log::warn!(
                "breaking stale store lock {} (age {:?})",
                path.display(),
                age
            );
            if let Err(e) = std::fs::remove_file(&taken) {
                log::warn!("failed to remove stale lock {}: {e}", taken.display());
            }
            true
        }
        _ => {
            restore(&taken, path);
            false
        }
    }
}
