// src/sync/recording.rs

//! Builder double that records requests instead of running makepkg

use crate::aur::RemotePackage;
use crate::build::{BuildMode, BuildOutcome, PackageBuilder};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// Records every build request and answers from canned outcomes
///
/// Packages without a canned outcome "install" successfully; a version check
/// without one reports the package as outdated.
#[derive(Default)]
pub struct RecordingBuilder {
    builds: Mutex<Vec<(String, BuildMode)>>,
    outcomes: HashMap<String, BuildOutcome>,
    failures: HashMap<String, String>,
}

impl RecordingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make builds of `name` fail with `reason`
    pub fn failing(mut self, name: &str, reason: &str) -> Self {
        self.failures.insert(name.to_string(), reason.to_string());
        self
    }

    /// Answer builds of `name` with `outcome`
    pub fn with_outcome(mut self, name: &str, outcome: BuildOutcome) -> Self {
        self.outcomes.insert(name.to_string(), outcome);
        self
    }

    /// (package, mode) for every request, in order
    pub fn builds(&self) -> Vec<(String, BuildMode)> {
        self.builds.lock().map(|b| b.clone()).unwrap_or_default()
    }

    /// Names of packages built for installation, in order
    pub fn installed(&self) -> Vec<String> {
        self.builds()
            .into_iter()
            .filter(|(_, mode)| *mode == BuildMode::Install)
            .map(|(name, _)| name)
            .collect()
    }
}

impl PackageBuilder for RecordingBuilder {
    fn build(&self, pkg: &RemotePackage, mode: &BuildMode) -> Result<BuildOutcome> {
        if let Ok(mut builds) = self.builds.lock() {
            builds.push((pkg.name.clone(), mode.clone()));
        }

        if let Some(reason) = self.failures.get(&pkg.name) {
            return Err(Error::BuildFailure {
                package: pkg.name.clone(),
                reason: reason.clone(),
            });
        }
        if let Some(outcome) = self.outcomes.get(&pkg.name) {
            return Ok(outcome.clone());
        }

        Ok(match mode {
            BuildMode::Install => {
                BuildOutcome::Installed(vec![PathBuf::from(format!("{}-1.0-1-any.pkg.tar.zst", pkg.name))])
            }
            BuildMode::VersionCheck { .. } => BuildOutcome::Outdated(pkg.version.clone()),
            BuildMode::FetchOnly { dest } => BuildOutcome::Fetched(dest.join(&pkg.name)),
        })
    }
}
