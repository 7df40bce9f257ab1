// src/cache/lock.rs

//! Single-instance advisory lock
//!
//! The lock is a plain file (`file.lck`) holding the acquisition time and the
//! owner's pid. Its existence is the lock: a second acquisition while the
//! file exists fails with `LockConflict` instead of waiting. Nothing stops a
//! process that ignores the file; this is cooperative exclusion only.
//!
//! ```ignore
//! let guard = cache.lock()?;
//! // ... mutate cache files, build packages ...
//! drop(guard); // file removed
//! ```

use crate::error::{Error, Result};
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Lock file name inside the cache directory
pub const LOCK_FILE: &str = "file.lck";

/// Contents of the lock file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub time: String,
    pub pid: String,
}

/// Shared view of the lock used by the interrupt handler
#[derive(Debug, Clone)]
pub struct LockHandle {
    path: PathBuf,
    held: Arc<AtomicBool>,
}

impl LockHandle {
    pub(super) fn new(path: PathBuf) -> Self {
        Self {
            path,
            held: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Is the lock currently held by this process?
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    /// Remove the lock file if this process holds it
    ///
    /// Idempotent; a lock file owned by another instance is never touched.
    pub fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            unlock_path(&self.path);
        }
    }

    /// Create the lock file; fails if it already exists
    pub(super) fn acquire(&self) -> Result<InstanceLock> {
        debug!("locking");
        let record = LockRecord {
            time: Local::now().to_rfc3339(),
            pid: std::process::id().to_string(),
        };

        let mut file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(Error::LockConflict(self.path.clone()));
            }
            Err(e) => {
                return Err(Error::IoError(format!(
                    "Failed to create lock file {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        self.held.store(true, Ordering::SeqCst);
        let lock = InstanceLock {
            handle: self.clone(),
        };
        file.write_all(serde_json::to_string(&record)?.as_bytes())?;
        debug!("locked");
        Ok(lock)
    }

    /// Read the current holder, if any
    pub fn holder(&self) -> Option<LockRecord> {
        fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
    }
}

/// Held instance lock; the file is removed on drop
#[derive(Debug)]
pub struct InstanceLock {
    handle: LockHandle,
}

impl InstanceLock {
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// Release explicitly (same as dropping)
    pub fn unlock(self) {
        drop(self);
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        self.handle.release();
    }
}

/// Remove a lock file; no-op when absent
pub fn unlock_path(path: &Path) {
    debug!("unlocking");
    match fs::remove_file(path) {
        Ok(()) => debug!("unlocked"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => debug!("failed to remove {}: {}", path.display(), e),
    }
}
