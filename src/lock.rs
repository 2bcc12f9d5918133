//! Single-instance lock over the state directory.

use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const LOCK_FILE_NAME: &str = "tuck.lock";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("could not acquire lock on {} (is tuck already running?)", .0.display())]
    Held(PathBuf),

    #[error("failed to acquire lock on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Exclusive lock held for as long as this value lives.
#[derive(Debug)]
pub struct StateLock {
    file: File,
    path: PathBuf,
}

impl Drop for StateLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!("Failed to release lock {}: {}", self.path.display(), e);
        } else {
            tracing::debug!("Released lock {}", self.path.display());
        }
    }
}

/// Take the lock in `state_dir` without waiting.
pub fn acquire(state_dir: &Path) -> Result<StateLock, LockError> {
    let path = state_dir.join(LOCK_FILE_NAME);
    let io_err = |source| LockError::Io {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(state_dir).map_err(io_err)?;
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .map_err(io_err)?;

    match file.try_lock_exclusive() {
        Ok(()) => {
            tracing::debug!("Acquired lock {}", path.display());
            Ok(StateLock { file, path })
        }
        Err(e) if e.kind() == ErrorKind::WouldBlock || is_contended(&e) => {
            Err(LockError::Held(path))
        }
        Err(e) => Err(io_err(e)),
    }
}

fn is_contended(e: &io::Error) -> bool {
    e.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}
