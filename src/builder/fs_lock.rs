//! Filesystem-based locking for cross-process coordination
//!
//! The vector index and build ledger are owned by one builder process at a
//! time. An flock() on a per-output-directory lock file keeps a second
//! builder from targeting the same output directory; the OS releases the
//! lock automatically if the process crashes.

use anyhow::{Context, Result};
use fs2::FileExt;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Get the directory for lock files
fn lock_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("esg-rag")
        .join("locks")
}

/// Get the lock file path for a given output directory
fn lock_file_path(output_dir: &str) -> PathBuf {
    // Hash the path to create a safe filename
    let mut hasher = Sha256::new();
    hasher.update(output_dir.as_bytes());
    let hash = format!("{:x}", hasher.finalize());
    lock_dir().join(format!("{}.lock", &hash[..16]))
}

/// Guard that holds an exclusive filesystem lock on an output directory
///
/// The lock is released when the guard is dropped.
pub struct BuildLockGuard {
    _file: File,
    _path: PathBuf,
}

impl BuildLockGuard {
    /// Try to acquire an exclusive filesystem lock, non-blocking
    ///
    /// Returns:
    /// - `Ok(Some(guard))` if the lock was acquired
    /// - `Ok(None)` if another process holds the lock
    /// - `Err(...)` on IO errors
    pub fn try_acquire(output_dir: &Path) -> Result<Option<Self>> {
        let key = output_dir.display().to_string();
        let lock_path = lock_file_path(&key);

        tracing::debug!(
            "Attempting to acquire build lock: output={}, lock_file={:?}",
            key,
            lock_path
        );

        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).context("Failed to create lock directory")?;
        }

        let file = File::create(&lock_path).context("Failed to create lock file")?;

        match file.try_lock_exclusive() {
            Ok(()) => {
                tracing::debug!("Acquired build lock for: {}", key);
                Ok(Some(Self {
                    _file: file,
                    _path: lock_path,
                }))
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                tracing::debug!("Build lock held by another process for: {}", key);
                Ok(None)
            }
            Err(e) => Err(e).context("Failed to acquire build lock"),
        }
    }
}
