// src/localdb/memory.rs

//! In-memory database and recording installer

use super::{InstalledPackage, Installer, LocalDatabase};
use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Database held entirely in memory
#[derive(Debug, Default, Clone)]
pub struct MemoryDatabase {
    installed: BTreeMap<String, (String, Vec<String>)>,
    repository: HashSet<String>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a package as installed
    pub fn with_installed(mut self, name: &str, version: &str, depends: &[&str]) -> Self {
        self.installed.insert(
            name.to_string(),
            (
                version.to_string(),
                depends.iter().map(|d| d.to_string()).collect(),
            ),
        );
        self
    }

    /// Mark a name as provided by a sync repository
    pub fn with_repository(mut self, name: &str) -> Self {
        self.repository.insert(name.to_string());
        self
    }
}

impl LocalDatabase for MemoryDatabase {
    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        Ok(self.installed.get(name).map(|(v, _)| v.clone()))
    }

    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        Ok(self
            .installed
            .iter()
            .map(|(name, (version, _))| InstalledPackage::new(name.clone(), version.clone()))
            .collect())
    }

    fn repository_packages(&self) -> Result<HashSet<String>> {
        Ok(self.repository.clone())
    }

    fn installed_depends(&self, name: &str) -> Result<Vec<String>> {
        self.installed
            .get(name)
            .map(|(_, deps)| deps.clone())
            .ok_or_else(|| Error::NotFoundError(format!("Package '{}' is not installed", name)))
    }
}

/// A call made against [`RecordingInstaller`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallerCall {
    Install(Vec<PathBuf>),
    Remove {
        names: Vec<String>,
        extra_args: Vec<String>,
    },
    Cache {
        files: Vec<PathBuf>,
        dir: PathBuf,
    },
}

/// Installer that records calls instead of running pacman
#[derive(Default)]
pub struct RecordingInstaller {
    calls: Mutex<Vec<InstallerCall>>,
    fail_remove: bool,
}

impl RecordingInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `remove` call fail
    pub fn failing_remove() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            fail_remove: true,
        }
    }

    pub fn calls(&self) -> Vec<InstallerCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: InstallerCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Installer for RecordingInstaller {
    fn install_files(&self, files: &[PathBuf]) -> Result<()> {
        self.record(InstallerCall::Install(files.to_vec()));
        Ok(())
    }

    fn remove(&self, names: &[String], extra_args: &[String]) -> Result<()> {
        self.record(InstallerCall::Remove {
            names: names.to_vec(),
            extra_args: extra_args.to_vec(),
        });
        if self.fail_remove {
            return Err(Error::IoError("pacman -R failed (exit code 1)".to_string()));
        }
        Ok(())
    }

    fn cache_files(&self, files: &[PathBuf], dir: &Path) -> Result<()> {
        self.record(InstallerCall::Cache {
            files: files.to_vec(),
            dir: dir.to_path_buf(),
        });
        Ok(())
    }
}
