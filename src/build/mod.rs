// src/build/mod.rs

//! Per-package build pipeline
//!
//! Every package goes through the same state machine, entered once per
//! package in install order:
//!
//! ```text
//! Fetching -> SplitCheck -> Building -> Verifying  -> Done (version check)
//!                                    -> Installing -> Caching -> Done
//! ```
//!
//! Any step may end in `Failed`. The cancellation token is checked at every
//! transition. Each package builds in its own temporary directory, which is
//! removed however the build ends.

mod command;
mod fetch;
mod pkgbuild;
mod srcinfo;

pub use command::{CommandOutput, CommandSpec, OutputMode, running_as_root};
pub use fetch::{FetchMethod, Fetcher, extract_stripped};
pub use pkgbuild::{PkgnameDecl, SplitOutcome, apply_split_policy, parse_pkgname, rewrite_pkgname};
pub use srcinfo::srcinfo_version;

use crate::aur::RemotePackage;
use crate::cancel::CancelToken;
use crate::config::SplitPolicy;
use crate::error::{Error, Result};
use crate::localdb::Installer;
use crate::report::Reporter;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Prefix of per-package build directories
pub const BUILD_DIR_PREFIX: &str = "auric.";

/// makepkg arguments for a version check: fetch sources and run prepare()
pub const VERSION_CHECK_ARGS: &[&str] = &["-od"];

/// What the pipeline should do with a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildMode {
    /// Build, install and cache
    Install,
    /// Compute the recipe's current version and compare it to `installed`
    VersionCheck { installed: String },
    /// Retrieve the recipe into `dest/<name>` and stop
    FetchOnly { dest: PathBuf },
}

/// Pipeline states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Fetching,
    SplitCheck,
    Building,
    Verifying,
    Installing,
    Caching,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fetching => "fetching",
            Self::SplitCheck => "split check",
            Self::Building => "building",
            Self::Verifying => "verifying",
            Self::Installing => "installing",
            Self::Caching => "caching",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// How a package run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildOutcome {
    /// Artifacts installed
    Installed(Vec<PathBuf>),
    /// Split recipe skipped by policy
    Skipped,
    /// Version check: the installed version is current
    UpToDate(String),
    /// Version check: the recipe would produce this newer version
    Outdated(String),
    /// Fetch-only: the recipe directory
    Fetched(PathBuf),
}

/// Runs one package through the pipeline
pub trait PackageBuilder: Send + Sync {
    fn build(&self, pkg: &RemotePackage, mode: &BuildMode) -> Result<BuildOutcome>;
}

/// Cache directories usable for artifact copies
///
/// Directories containing whitespace are dropped with a warning.
pub fn usable_cache_dirs(dirs: &[PathBuf], reporter: &dyn Reporter) -> Vec<PathBuf> {
    dirs.iter()
        .filter(|dir| {
            let has_space = dir.to_string_lossy().chars().any(char::is_whitespace);
            if has_space {
                warn!("cache dir with space is skipped ({})", dir.display());
                reporter.warn(&format!("cache dir with space is skipped ({})", dir.display()));
            }
            !has_space
        })
        .cloned()
        .collect()
}

/// Package name encoded in an artifact file name
///
/// `name-pkgver-pkgrel-arch.pkg.tar.*`; the name itself may contain dashes.
pub fn artifact_package_name(path: &Path) -> Option<String> {
    let file = path.file_name()?.to_str()?;
    let parts: Vec<&str> = file.rsplitn(4, '-').collect();
    (parts.len() == 4).then(|| parts[3].to_string())
}

/// The makepkg-driven pipeline
pub struct BuildPipeline {
    fetcher: Fetcher,
    installer: Arc<dyn Installer>,
    reporter: Arc<dyn Reporter>,
    cancel: CancelToken,
    makepkg: PathBuf,
    makepkg_args: Vec<String>,
    split_policy: SplitPolicy,
    cache_dirs: Vec<PathBuf>,
    builds_dir: Option<PathBuf>,
    build_timeout: Option<Duration>,
}

impl BuildPipeline {
    pub fn new(
        fetcher: Fetcher,
        installer: Arc<dyn Installer>,
        reporter: Arc<dyn Reporter>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            fetcher,
            installer,
            reporter,
            cancel,
            makepkg: PathBuf::from("makepkg"),
            makepkg_args: vec!["-sr".to_string()],
            split_policy: SplitPolicy::Nothing,
            cache_dirs: Vec::new(),
            builds_dir: None,
            build_timeout: None,
        }
    }

    pub fn makepkg(mut self, path: impl Into<PathBuf>, args: Vec<String>) -> Self {
        self.makepkg = path.into();
        self.makepkg_args = args;
        self
    }

    pub fn split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split_policy = policy;
        self
    }

    /// Directories receiving artifact copies; whitespace paths are dropped
    pub fn cache_dirs(mut self, dirs: &[PathBuf]) -> Self {
        self.cache_dirs = usable_cache_dirs(dirs, self.reporter.as_ref());
        self
    }

    /// Root for per-package build directories (system temp dir otherwise)
    pub fn builds_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.builds_dir = dir;
        self
    }

    pub fn build_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.build_timeout = timeout;
        self
    }

    pub fn active_cache_dirs(&self) -> &[PathBuf] {
        &self.cache_dirs
    }

    fn workspace(&self) -> Result<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(BUILD_DIR_PREFIX);
        let dir = match &self.builds_dir {
            Some(root) => {
                fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        debug!("build directory {}", dir.path().display());
        Ok(dir)
    }

    fn run(&self, pkg: &RemotePackage, mode: &BuildMode) -> Result<BuildOutcome> {
        let action = match mode {
            BuildMode::Install => "installing",
            BuildMode::VersionCheck { .. } => "checking version",
            BuildMode::FetchOnly { .. } => "fetching",
        };
        self.reporter.output(&format!("{}: {}", action, pkg.name));

        // Interrupts unwind through here instead of exiting, so the build
        // directory below is always dropped
        let _supervised = self.cancel.supervise();

        // Dropping the TempDir removes the build tree on every exit path
        let (_workspace, recipe_dir) = match mode {
            BuildMode::FetchOnly { dest } => {
                let dir = dest.join(&pkg.name);
                if dir.exists() {
                    return Err(Error::UserInputError(format!(
                        "fetch target already exists: {}",
                        dir.display()
                    )));
                }
                (None, dir)
            }
            _ => {
                let workspace = self.workspace()?;
                let dir = workspace.path().join(&pkg.name);
                (Some(workspace), dir)
            }
        };

        let mut state = BuildState::Fetching;
        let mut installed = Vec::new();
        loop {
            self.cancel.check()?;
            debug!("{}: {}", pkg.name, state);

            let step = match state {
                BuildState::Fetching => self
                    .fetcher
                    .fetch(pkg, &recipe_dir)
                    .map(|()| BuildState::SplitCheck),
                BuildState::SplitCheck => match self.split_check(pkg, &recipe_dir) {
                    Ok(SplitOutcome::Skipped) => return Ok(BuildOutcome::Skipped),
                    Ok(_) if matches!(mode, BuildMode::FetchOnly { .. }) => {
                        info!("fetched {} into {}", pkg.name, recipe_dir.display());
                        return Ok(BuildOutcome::Fetched(recipe_dir));
                    }
                    Ok(_) => Ok(BuildState::Building),
                    Err(e) => Err(e),
                },
                BuildState::Building => self.makepkg_build(pkg, &recipe_dir, mode).map(|()| {
                    if matches!(mode, BuildMode::VersionCheck { .. }) {
                        BuildState::Verifying
                    } else {
                        BuildState::Installing
                    }
                }),
                BuildState::Verifying => {
                    let BuildMode::VersionCheck { installed } = mode else {
                        return Err(Error::BuildFailure {
                            package: pkg.name.clone(),
                            reason: "verification requested outside a version check".to_string(),
                        });
                    };
                    return self.verify(pkg, &recipe_dir, installed);
                }
                BuildState::Installing => self.install(pkg, &recipe_dir).map(|files| {
                    installed = files;
                    BuildState::Caching
                }),
                BuildState::Caching => {
                    self.cache(&installed);
                    Ok(BuildState::Done)
                }
                BuildState::Done => return Ok(BuildOutcome::Installed(installed)),
                BuildState::Failed => Err(Error::BuildFailure {
                    package: pkg.name.clone(),
                    reason: "build already failed".to_string(),
                }),
            };

            state = match step {
                Ok(next) => next,
                Err(e) => {
                    debug!("{}: {} while {}", pkg.name, BuildState::Failed, state);
                    return Err(e);
                }
            };
        }
    }

    fn split_check(&self, pkg: &RemotePackage, recipe_dir: &Path) -> Result<SplitOutcome> {
        if self.fetcher.method() != FetchMethod::Archive {
            return Ok(SplitOutcome::NotSplit);
        }
        apply_split_policy(
            &recipe_dir.join("PKGBUILD"),
            &pkg.name,
            self.split_policy,
            self.reporter.as_ref(),
        )
    }

    fn makepkg_build(&self, pkg: &RemotePackage, recipe_dir: &Path, mode: &BuildMode) -> Result<()> {
        let args: Vec<String> = match mode {
            BuildMode::VersionCheck { .. } => {
                VERSION_CHECK_ARGS.iter().map(|a| a.to_string()).collect()
            }
            _ => self.makepkg_args.clone(),
        };

        let output = CommandSpec::trap_guarded(&self.makepkg, &args)
            .current_dir(recipe_dir)
            .run(self.build_timeout, &self.cancel)?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::BuildFailure {
                package: pkg.name.clone(),
                reason: format!(
                    "{} exited with code {}",
                    self.makepkg.display(),
                    output.code()
                ),
            })
        }
    }

    fn makepkg_query(&self, recipe_dir: &Path, flag: &str) -> Result<String> {
        let output = CommandSpec::new(&self.makepkg)
            .arg(flag)
            .current_dir(recipe_dir)
            .capture()
            .run_checked(self.build_timeout, &self.cancel)?;
        Ok(output.stdout)
    }

    fn verify(&self, pkg: &RemotePackage, recipe_dir: &Path, installed: &str) -> Result<BuildOutcome> {
        let current = srcinfo_version(&self.makepkg_query(recipe_dir, "--printsrcinfo")?)?;
        debug!("{}: installed {}, recipe {}", pkg.name, installed, current);
        if current == installed {
            self.reporter
                .output(&format!("up-to-date: {} ({})", pkg.name, installed));
            Ok(BuildOutcome::UpToDate(current))
        } else {
            Ok(BuildOutcome::Outdated(current))
        }
    }

    /// Artifacts produced by the last build
    fn artifacts(&self, pkg: &RemotePackage, recipe_dir: &Path) -> Result<Vec<PathBuf>> {
        let listed = self.makepkg_query(recipe_dir, "--packagelist")?;
        let files: Vec<PathBuf> = listed
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(|l| recipe_dir.join(l))
            .filter(|p| p.exists())
            .collect();
        if files.is_empty() {
            return Err(Error::BuildFailure {
                package: pkg.name.clone(),
                reason: "no package files were produced".to_string(),
            });
        }
        Ok(files)
    }

    fn install(&self, pkg: &RemotePackage, recipe_dir: &Path) -> Result<Vec<PathBuf>> {
        let artifacts = self.artifacts(pkg, recipe_dir)?;
        let selected = if artifacts.len() == 1 {
            artifacts
        } else {
            let names: Vec<String> = artifacts
                .iter()
                .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                .collect();
            if self
                .reporter
                .confirm("install all split packages", &names, true)?
            {
                artifacts
            } else {
                let target: Vec<PathBuf> = artifacts
                    .into_iter()
                    .filter(|p| artifact_package_name(p).as_deref() == Some(pkg.name.as_str()))
                    .collect();
                if target.is_empty() {
                    return Err(Error::BuildFailure {
                        package: pkg.name.clone(),
                        reason: "unable to find the package file for the target".to_string(),
                    });
                }
                target
            }
        };

        self.installer.install_files(&selected).map_err(|e| Error::BuildFailure {
            package: pkg.name.clone(),
            reason: format!("install failed: {}", e),
        })?;
        Ok(selected)
    }

    fn cache(&self, files: &[PathBuf]) {
        for dir in &self.cache_dirs {
            debug!("caching into {}", dir.display());
            if let Err(e) = self.installer.cache_files(files, dir) {
                warn!("unable to cache packages in {}: {}", dir.display(), e);
                self.reporter
                    .warn(&format!("unable to cache packages in {}", dir.display()));
            }
        }
    }
}

impl PackageBuilder for BuildPipeline {
    fn build(&self, pkg: &RemotePackage, mode: &BuildMode) -> Result<BuildOutcome> {
        self.run(pkg, mode)
    }
}
