// src/cache/clean.rs

//! Cache clearing

use super::{CACHE_EXT, CacheManager, LOCK_EXT, PKG_DIR};
use crate::build::BUILD_DIR_PREFIX;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What a clean pass removed
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub files_removed: Vec<PathBuf>,
    pub dirs_removed: Vec<PathBuf>,
    /// Directories that could not be removed
    pub failed: Vec<PathBuf>,
}

impl CacheManager {
    /// Recognized cache files (`*.cache`, `*.lck`) directly in the cache dir
    pub fn cleanable_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        if !self.dir().exists() {
            return Ok(files);
        }
        for entry in fs::read_dir(self.dir())? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            if name.ends_with(CACHE_EXT) || name.ends_with(LOCK_EXT) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// auric's build directories under `builds_dir` plus the package copy
    /// directory
    ///
    /// Only entries named with the build directory prefix count; anything
    /// else under `builds_dir` belongs to someone else.
    pub fn cleanable_dirs(&self, builds_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
        let mut dirs = Vec::new();
        if let Some(builds) = builds_dir
            && builds.is_dir()
        {
            let mut found = Vec::new();
            for entry in fs::read_dir(builds)? {
                let path = entry?.path();
                let ours = path
                    .file_name()
                    .is_some_and(|n| n.to_string_lossy().starts_with(BUILD_DIR_PREFIX));
                if ours && path.is_dir() {
                    debug!("build directory {}", path.display());
                    found.push(path);
                }
            }
            found.sort();
            dirs.extend(found);
        }
        let pkg = self.dir().join(PKG_DIR);
        if pkg.exists() {
            dirs.push(pkg);
        }
        Ok(dirs)
    }

    /// Remove cache files and build directories after confirmation
    ///
    /// Each group is confirmed separately. A directory that cannot be removed
    /// is reported and the remaining ones are still attempted.
    pub fn clean(&self, builds_dir: Option<&Path>) -> Result<CleanReport> {
        let mut report = CleanReport::default();
        let reporter = self.reporter();

        let files = self.cleanable_files()?;
        if files.is_empty() {
            reporter.output("no files to cleanup");
        } else {
            let names: Vec<String> = files.iter().map(|f| display_name(f)).collect();
            if !reporter.confirm("clear cache files", &names, true)? {
                return Err(Error::Declined("clear cache files".to_string()));
            }
            for file in files {
                reporter.output(&format!("removing {}", display_name(&file)));
                fs::remove_file(&file)?;
                report.files_removed.push(file);
            }
        }

        let dirs = self.cleanable_dirs(builds_dir)?;
        if dirs.is_empty() {
            reporter.output("no directories to cleanup");
        } else {
            let names: Vec<String> = dirs.iter().map(|d| d.display().to_string()).collect();
            if !reporter.confirm("clear cache directories", &names, true)? {
                return Err(Error::Declined("clear cache directories".to_string()));
            }
            for dir in dirs {
                match fs::remove_dir_all(&dir) {
                    Ok(()) => report.dirs_removed.push(dir),
                    Err(e) => {
                        warn!("failed on removal of {}: {}", dir.display(), e);
                        reporter.error(&format!("unable to cleanup {}", dir.display()));
                        report.failed.push(dir);
                    }
                }
            }
        }

        Ok(report)
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn populate(dir: &Path) {
        fs::write(dir.join("vcs.cache"), "1").unwrap();
        fs::write(dir.join("rpc-foo.cache"), "{}").unwrap();
        fs::write(dir.join("file.lck"), "{}").unwrap();
        fs::write(dir.join("notes.txt"), "keep").unwrap();
        fs::create_dir_all(dir.join("pkg")).unwrap();
        fs::write(dir.join("pkg/foo-1.0-1-any.pkg.tar.zst"), "x").unwrap();
    }

    #[test]
    fn test_clean_removes_recognized_entries() {
        let cache_dir = TempDir::new().unwrap();
        let builds = TempDir::new().unwrap();
        populate(cache_dir.path());
        fs::create_dir_all(builds.path().join("auric.abc/foo")).unwrap();
        fs::write(builds.path().join("stray-file"), "x").unwrap();

        let reporter = Arc::new(MemoryReporter::new());
        let cache = CacheManager::new(cache_dir.path(), reporter.clone());
        let report = cache.clean(Some(builds.path())).unwrap();

        assert_eq!(report.files_removed.len(), 3);
        assert_eq!(report.dirs_removed.len(), 2);
        assert!(report.failed.is_empty());
        assert!(cache_dir.path().join("notes.txt").exists());
        assert!(builds.path().join("stray-file").exists());

        let prompts = reporter.prompts();
        assert_eq!(prompts[0].message, "clear cache files");
        assert_eq!(
            prompts[0].items,
            vec!["file.lck", "rpc-foo.cache", "vcs.cache"]
        );
        assert_eq!(prompts[1].message, "clear cache directories");
    }

    #[test]
    fn test_clean_spares_foreign_build_dirs() {
        let cache_dir = TempDir::new().unwrap();
        let builds = TempDir::new().unwrap();
        fs::create_dir_all(builds.path().join("auric.abc/foo")).unwrap();
        fs::create_dir_all(builds.path().join("my_project/src")).unwrap();
        fs::write(builds.path().join("my_project/src/main.rs"), "fn main() {}").unwrap();

        let reporter = Arc::new(MemoryReporter::new());
        let cache = CacheManager::new(cache_dir.path(), reporter.clone());
        assert_eq!(
            cache.cleanable_dirs(Some(builds.path())).unwrap(),
            vec![builds.path().join("auric.abc")]
        );

        let report = cache.clean(Some(builds.path())).unwrap();
        assert_eq!(report.dirs_removed, vec![builds.path().join("auric.abc")]);
        assert!(!builds.path().join("auric.abc").exists());
        assert!(builds.path().join("my_project/src/main.rs").exists());
    }

    #[test]
    fn test_clean_nothing_to_do() {
        let cache_dir = TempDir::new().unwrap();
        let reporter = Arc::new(MemoryReporter::new());
        let cache = CacheManager::new(cache_dir.path(), reporter.clone());
        let report = cache.clean(None).unwrap();

        assert_eq!(report, CleanReport::default());
        assert_eq!(
            reporter.outputs(),
            vec!["no files to cleanup", "no directories to cleanup"]
        );
        assert!(reporter.prompts().is_empty());
    }

    #[test]
    fn test_clean_declined_keeps_files() {
        let cache_dir = TempDir::new().unwrap();
        populate(cache_dir.path());
        let reporter = Arc::new(MemoryReporter::with_answers(&[false]));
        let cache = CacheManager::new(cache_dir.path(), reporter);

        assert!(matches!(cache.clean(None), Err(Error::Declined(_))));
        assert!(cache_dir.path().join("vcs.cache").exists());
    }
}
