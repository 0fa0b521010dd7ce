//! Crash-safe whole-file replacement.
//!
//! Content is written to a temporary file in the destination directory,
//! flushed to stable storage, then renamed over the destination. Readers see
//! either the previous file or the new one, never a partial write, even if
//! the process dies or the machine loses power mid-write.

use std::io::Write;
use std::path::Path;

use crate::error::{Result, StoreError};

/// Atomically replace `path` with `contents`.
///
/// The parent directory must exist. On Unix the directory entry is synced
/// after the rename so the new name itself survives a crash.
///
/// # Errors
///
/// Returns `StoreError::Io` if the temporary file cannot be created, written,
/// synced or renamed. The destination is untouched in every failure case.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = path.parent().ok_or_else(|| {
        StoreError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("{} has no parent directory", path.display()),
        ))
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| StoreError::Io(e.error))?;

    #[cfg(unix)]
    {
        if let Ok(dir) = std::fs::File::open(dir) {
            let _ = dir.sync_all();
        }
    }

    log::debug!("committed {} ({} bytes)", path.display(), contents.len());
    Ok(())
}
