// src/build/fetch.rs

//! Recipe retrieval: shallow git clone or snapshot archive

use super::command::CommandSpec;
use crate::aur::{RemotePackage, RepositoryClient};
use crate::cancel::CancelToken;
use crate::config::DownloadMethod;
use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tar::Archive;
use tracing::{debug, trace};

/// How a recipe is retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Git,
    Archive,
}

impl FetchMethod {
    /// Resolve the configured method; `detect` uses git when it is on PATH
    pub fn resolve(download: DownloadMethod) -> Self {
        match download {
            DownloadMethod::Git => Self::Git,
            DownloadMethod::Tar => Self::Archive,
            DownloadMethod::Detect => {
                if which::which("git").is_ok() {
                    Self::Git
                } else {
                    debug!("git not found, using snapshot archives");
                    Self::Archive
                }
            }
        }
    }
}

/// Retrieves recipes into build directories
pub struct Fetcher {
    client: Arc<RepositoryClient>,
    method: FetchMethod,
    git_timeout: Duration,
    cancel: CancelToken,
}

impl Fetcher {
    pub fn new(
        client: Arc<RepositoryClient>,
        method: FetchMethod,
        git_timeout: Duration,
        cancel: CancelToken,
    ) -> Self {
        Self {
            client,
            method,
            git_timeout,
            cancel,
        }
    }

    pub fn method(&self) -> FetchMethod {
        self.method
    }

    /// Place the recipe for `pkg` directly in `dest`
    pub fn fetch(&self, pkg: &RemotePackage, dest: &Path) -> Result<()> {
        fs::create_dir_all(dest)?;
        match self.method {
            FetchMethod::Git => self.clone_repo(pkg, dest),
            FetchMethod::Archive => self.download_archive(pkg, dest),
        }
    }

    fn clone_repo(&self, pkg: &RemotePackage, dest: &Path) -> Result<()> {
        let url = self.client.git_url(pkg);
        CommandSpec::new("git")
            .args(["clone", "--depth=1", url.as_str(), "."])
            .current_dir(dest)
            .capture()
            .run_checked(Some(self.git_timeout), &self.cancel)
            .map_err(|e| match e {
                Error::Cancelled | Error::TimeoutError(_) => e,
                other => Error::DownloadError(format!("git clone of {} failed: {}", url, other)),
            })?;
        Ok(())
    }

    fn download_archive(&self, pkg: &RemotePackage, dest: &Path) -> Result<()> {
        debug!("using tar");
        let archive = dest.join(format!("{}.tar.gz", pkg.name));
        self.client.download_snapshot(pkg, &archive)?;
        self.cancel.check()?;
        extract_stripped(&archive, dest, &self.cancel)?;
        fs::remove_file(&archive)?;
        Ok(())
    }
}

/// Extract a gzip tarball into `dest`, dropping the leading path component
///
/// Entries that would land outside `dest` are rejected. `cancel` is checked
/// before each entry.
pub fn extract_stripped(archive: &Path, dest: &Path, cancel: &CancelToken) -> Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut tar = Archive::new(GzDecoder::new(file));
    let mut extracted = Vec::new();

    let entries = tar
        .entries()
        .map_err(|e| Error::ParseError(format!("Failed to read archive entries: {}", e)))?;
    for entry in entries {
        cancel.check()?;
        let mut entry =
            entry.map_err(|e| Error::ParseError(format!("Failed to read archive entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| Error::ParseError(format!("Failed to get entry path: {}", e)))?
            .into_owned();

        let Some(relative) = strip_first(&path)? else {
            continue;
        };
        let target = dest.join(&relative);
        trace!("extracting {}", relative.display());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(|e| {
            Error::IoError(format!("Failed to extract {}: {}", relative.display(), e))
        })?;
        extracted.push(relative);
    }

    Ok(extracted)
}

fn strip_first(path: &Path) -> Result<Option<PathBuf>> {
    let mut relative = PathBuf::new();
    let mut leading = true;
    for component in path.components() {
        match component {
            Component::Normal(_) if leading => leading = false,
            Component::Normal(part) => relative.push(part),
            Component::CurDir => {}
            _ => {
                return Err(Error::ParseError(format!(
                    "unsafe path in archive: {}",
                    path.display()
                )));
            }
        }
    }
    Ok((!relative.as_os_str().is_empty()).then_some(relative))
}
