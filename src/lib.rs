// src/lib.rs

//! auric: an AUR helper
//!
//! Resolves community packages from the Arch User Repository against the
//! local pacman database, builds them with makepkg and installs the results
//! with pacman.
//!
//! # Architecture
//!
//! - `aur`: RPC queries, optional response cache, snapshot downloads
//! - `resolver`: dependency verification and install ordering
//! - `cache`: instance lock, ignore windows, cache clearing
//! - `build`: per-package fetch/split-check/build/install state machine
//! - `sync`: the operator-facing verbs tying everything together
//!
//! pacman and makepkg stay behind the `LocalDatabase`, `Installer` and
//! `PackageBuilder` traits; the in-memory implementations back the tests.

pub mod aur;
pub mod build;
pub mod cache;
pub mod cancel;
pub mod config;
mod error;
pub mod localdb;
pub mod report;
pub mod resolver;
pub mod sync;
pub mod version;

pub use aur::{RemotePackage, RepositoryClient};
pub use build::{BuildMode, BuildOutcome, BuildPipeline, PackageBuilder};
pub use cache::CacheManager;
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{Error, Result};
pub use report::{ConsoleReporter, Reporter};
#[cfg(any(test, feature = "test-utils"))]
pub use report::MemoryReporter;
pub use resolver::{DependencySpec, ResolutionNode, Resolver};
pub use sync::{SyncOptions, SyncOrchestrator, SyncSummary};
pub use version::vercmp;
