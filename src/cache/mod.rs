// src/cache/mod.rs

//! Cache directory state
//!
//! One directory holds everything auric persists between runs:
//!
//! ```text
//! <cache>/file.lck             instance lock
//! <cache>/vcs.cache            VCS cooldown timestamp
//! <cache>/ignoring.cache       per-package ignore windows
//! <cache>/rpc-<name>.cache     raw RPC responses
//! <cache>/pkg/                 copies of built packages
//! ```
//!
//! Only [`CacheManager::clean`] deletes in bulk.

mod clean;
mod ignore;
mod lock;

pub use clean::CleanReport;
pub use ignore::{IgnoreRule, hours_since, timestamp_string};
pub use lock::{InstanceLock, LOCK_FILE, LockHandle, LockRecord, unlock_path};

use crate::error::{Error, Result};
use crate::report::Reporter;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tracing::{debug, error, trace};

/// Extension of every cache record
pub const CACHE_EXT: &str = ".cache";

/// Extension of lock files
pub const LOCK_EXT: &str = ".lck";

/// Built package copies
pub const PKG_DIR: &str = "pkg";

/// Owner of the cache directory
pub struct CacheManager {
    dir: PathBuf,
    lock: LockHandle,
    reporter: Arc<dyn Reporter>,
}

impl CacheManager {
    pub fn new(dir: impl AsRef<Path>, reporter: Arc<dyn Reporter>) -> Self {
        let dir = dir.as_ref().to_path_buf();
        Self {
            lock: LockHandle::new(dir.join(LOCK_FILE)),
            dir,
            reporter,
        }
    }

    /// Create the cache directory if needed
    pub fn ensure_dir(&self) -> Result<()> {
        if !self.dir.exists() {
            debug!("creating cache directory {}", self.dir.display());
            fs::create_dir_all(&self.dir).map_err(|e| {
                Error::InitError(format!(
                    "Failed to create cache directory {}: {}",
                    self.dir.display(),
                    e
                ))
            })?;
        }
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub(crate) fn reporter(&self) -> &dyn Reporter {
        self.reporter.as_ref()
    }

    /// Path of a `<stem>.cache` record
    ///
    /// Fails if the cache directory disappeared during the run.
    pub fn cache_file(&self, stem: &str) -> Result<PathBuf> {
        if !self.dir.exists() {
            error!("cache directory has gone missing");
            return Err(Error::InitError(format!(
                "cache directory has gone missing: {}",
                self.dir.display()
            )));
        }
        Ok(self.dir.join(format!("{}{}", stem, CACHE_EXT)))
    }

    /// Directory receiving copies of built packages (created on demand)
    pub fn pkg_dir(&self) -> Result<PathBuf> {
        let dir = self.dir.join(PKG_DIR);
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Acquire the instance lock
    pub fn lock(&self) -> Result<InstanceLock> {
        match self.lock.acquire() {
            Err(Error::LockConflict(path)) => {
                self.reporter.error("lock file exists");
                self.reporter.error("only one instance of auric may run at a time");
                self.reporter
                    .error(&format!("delete {} if this is an error", path.display()));
                Err(Error::LockConflict(path))
            }
            other => other,
        }
    }

    /// Acquire the lock unless this process already holds it
    ///
    /// Returns `None` when an outer guard is active; that guard keeps
    /// ownership.
    pub fn hold(&self) -> Result<Option<InstanceLock>> {
        if self.lock.is_held() {
            return Ok(None);
        }
        self.lock().map(Some)
    }

    /// Fail with `LockConflict` if another instance holds the lock
    pub fn ensure_unlocked(&self) -> Result<()> {
        if self.lock.path().exists() && !self.lock.is_held() {
            // Reuse the reporting in lock() without creating anything
            return self.lock().map(|_| ());
        }
        Ok(())
    }

    /// Handle for releasing the lock from an interrupt handler
    pub fn lock_handle(&self) -> LockHandle {
        self.lock.clone()
    }

    /// Cache file name for an exact RPC lookup
    ///
    /// Everything except ASCII alphanumerics and '-' becomes '_'.
    pub fn rpc_cache_name(package: &str) -> String {
        let sanitized: String = package
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        format!("rpc-{}", sanitized)
    }

    /// Read a cached RPC response if it is younger than `ttl`
    ///
    /// A stale record is deleted. Caller must hold the instance lock.
    pub fn read_rpc(&self, package: &str, ttl: Duration) -> Result<Option<Vec<u8>>> {
        let path = self.cache_file(&Self::rpc_cache_name(package))?;
        trace!("rpc cache {}", path.display());

        let modified = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(t) => t,
            Err(_) => return Ok(None),
        };

        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age > ttl {
            debug!("over rpc cache threshold for {}", package);
            fs::remove_file(&path)?;
            return Ok(None);
        }

        debug!("opening rpc cache for {}", package);
        Ok(Some(fs::read(&path)?))
    }

    /// Store a raw RPC response. Caller must hold the instance lock.
    pub fn write_rpc(&self, package: &str, body: &[u8]) -> Result<()> {
        let path = self.cache_file(&Self::rpc_cache_name(package))?;
        debug!("writing rpc cache {}", path.display());
        fs::write(path, body)?;
        Ok(())
    }
}
