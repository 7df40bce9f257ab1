// src/localdb/mod.rs

//! Local package database and installer collaborators
//!
//! auric never reads or writes the pacman database itself. It asks narrow
//! questions through [`LocalDatabase`] and hands finished artifacts to an
//! [`Installer`]. The pacman-backed implementations shell out to `pacman`;
//! the in-memory ones back the tests.

#[cfg(any(test, feature = "test-utils"))]
mod memory;
mod pacman;

#[cfg(any(test, feature = "test-utils"))]
pub use memory::{InstallerCall, MemoryDatabase, RecordingInstaller};
pub use pacman::{PacmanDatabase, PacmanInstaller, parse_cache_dirs};

use crate::error::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// An installed package as reported by the local database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
}

impl InstalledPackage {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

/// Read-only view of the system package database
pub trait LocalDatabase: Send + Sync {
    /// Installed version of `name`, if installed
    fn installed_version(&self, name: &str) -> Result<Option<String>>;

    /// Every installed package
    fn list_installed(&self) -> Result<Vec<InstalledPackage>>;

    /// Names provided by the configured sync repositories
    fn repository_packages(&self) -> Result<HashSet<String>>;

    /// Dependency strings recorded for an installed package
    fn installed_depends(&self, name: &str) -> Result<Vec<String>>;

    /// Is `name` provided by the sync repositories?
    fn is_repository_package(&self, name: &str) -> Result<bool> {
        Ok(self.repository_packages()?.contains(name))
    }

    /// Installed packages that did not come from a sync repository
    fn foreign_packages(&self) -> Result<Vec<InstalledPackage>> {
        let repos = self.repository_packages()?;
        Ok(self
            .list_installed()?
            .into_iter()
            .filter(|p| !repos.contains(&p.name))
            .collect())
    }
}

/// The system installer/remover
pub trait Installer: Send + Sync {
    /// Install built package files
    fn install_files(&self, files: &[PathBuf]) -> Result<()>;

    /// Remove installed packages; `extra_args` follow `-R`
    fn remove(&self, names: &[String], extra_args: &[String]) -> Result<()>;

    /// Copy built package files into a package cache directory
    fn cache_files(&self, files: &[PathBuf], dir: &Path) -> Result<()>;
}
