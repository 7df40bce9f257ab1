// src/cancel.rs

//! Cooperative cancellation
//!
//! The interrupt handler flips a shared flag; long-running work checks it at
//! state transitions, between archive entries and while waiting on child
//! processes.

use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Shared cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    /// Number of open supervised sections
    supervising: Arc<AtomicUsize>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Error out if cancellation was requested
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// True while some section will observe the flag and unwind
    ///
    /// The interrupt handler uses this to decide between letting that
    /// section unwind (dropping build directories and the lock) and
    /// terminating the process itself.
    pub fn is_supervising(&self) -> bool {
        self.supervising.load(Ordering::SeqCst) > 0
    }

    /// Mark a supervised section; ends when the guard is dropped
    pub fn supervise(&self) -> SuperviseGuard {
        self.supervising.fetch_add(1, Ordering::SeqCst);
        SuperviseGuard {
            counter: Arc::clone(&self.supervising),
        }
    }
}

/// Guard returned by [`CancelToken::supervise`]
pub struct SuperviseGuard {
    counter: Arc<AtomicUsize>,
}

impl Drop for SuperviseGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
