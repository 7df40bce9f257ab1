// src/error.rs

//! Error types for auric
//!
//! Library code returns [`Result`]; the binary wraps these in `anyhow` at the
//! command layer. Recoverable situations (cache miss, VCS package already
//! current, package already installed) are ordinary return values and never
//! show up here.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the resolution and build pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// Conflicting or missing flags/targets supplied by the operator
    #[error("{0}")]
    UserInputError(String),

    /// Required AUR packages that are neither installed nor requested
    #[error("unmet AUR dependencies: {}", .0.join(", "))]
    UnmetDependencies(Vec<String>),

    /// A requested dependency follows its dependent and reordering is off
    #[error("verify order of target/deps: {dependency} must come before {dependent}")]
    OrderingViolation {
        dependency: String,
        dependent: String,
    },

    /// The dependency walk came back to a package it is still resolving
    #[error("dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    /// Network or decoding failure talking to the AUR RPC
    #[error("repository query failed: {0}")]
    RepositoryQueryError(String),

    /// The external build tool (or a build step) exited unsuccessfully
    #[error("build failed for {package}: {reason}")]
    BuildFailure { package: String, reason: String },

    /// Another instance holds the lock file
    #[error("lock file exists: {} (delete it if no other instance is running)", .0.display())]
    LockConflict(PathBuf),

    /// Split recipe rejected by the configured policy
    #[error("split package policy rejected {0}")]
    SplitPolicyError(String),

    /// The PKGBUILD package-name declaration could not be parsed
    #[error("unable to parse PKGBUILD: {0}")]
    PkgbuildParseError(String),

    /// The operator answered no to a confirmation
    #[error("{0}: cancelled by user")]
    Declined(String),

    /// Operation interrupted by the operator
    #[error("operation cancelled")]
    Cancelled,

    /// A subprocess exceeded its time limit
    #[error("timed out: {0}")]
    TimeoutError(String),

    /// Package not found
    #[error("not found: {0}")]
    NotFoundError(String),

    /// Setup failure (missing tool, missing cache directory, bad client)
    #[error("initialization error: {0}")]
    InitError(String),

    /// Download failure
    #[error("download error: {0}")]
    DownloadError(String),

    /// Parse failure for configuration or tool output
    #[error("parse error: {0}")]
    ParseError(String),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias for auric operations
pub type Result<T> = std::result::Result<T, Error>;
