// src/config.rs
//! Configuration file parsing for auric
//!
//! Supports TOML configuration files with the following sections:
//! - [sync] - Ignore policies, VCS cooldown, RPC cache, dependency handling
//! - [build] - makepkg location and arguments, download method, split policy
//! - [paths] - Cache directory and pacman.conf location
//! - [pacman] - Removal arguments, sudo usage, package cache directories
//! - [rpc] - AUR endpoint and HTTP timeout
//!
//! Files are layered: `/etc/auric.toml`, then the user's config directory,
//! then an explicit `--config` file. Later files override individual keys of
//! earlier ones; command-line flags override everything.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default AUR endpoint
pub const DEFAULT_AUR_URL: &str = "https://aur.archlinux.org";

/// System-wide configuration file
pub const SYSTEM_CONFIG: &str = "/etc/auric.toml";

/// TOML configuration file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub pacman: PacmanSection,

    #[serde(default)]
    pub rpc: RpcSection,
}

/// What to do with a PKGBUILD that declares several packages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    /// Build it as-is (no inspection)
    #[default]
    Nothing,
    /// Report success without building
    Skip,
    /// Fail the package
    Error,
    /// Rewrite the PKGBUILD to only build the requested package
    Split,
}

impl SplitPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nothing => "nothing",
            Self::Skip => "skip",
            Self::Error => "error",
            Self::Split => "split",
        }
    }
}

impl FromStr for SplitPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "nothing" => Ok(Self::Nothing),
            "skip" => Ok(Self::Skip),
            "error" => Ok(Self::Error),
            "split" => Ok(Self::Split),
            other => Err(format!(
                "invalid split policy '{}' (expected nothing, skip, error or split)",
                other
            )),
        }
    }
}

impl fmt::Display for SplitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How recipe sources are retrieved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMethod {
    /// git when it is on PATH, otherwise the snapshot tarball
    #[default]
    Detect,
    Git,
    Tar,
}

impl FromStr for DownloadMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "detect" => Ok(Self::Detect),
            "git" => Ok(Self::Git),
            "tar" => Ok(Self::Tar),
            other => Err(format!(
                "invalid download method '{}' (expected detect, git or tar)",
                other
            )),
        }
    }
}

/// RPC field used by fuzzy search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub enum SearchField {
    #[default]
    #[serde(rename = "name-desc")]
    NameDesc,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "maintainer")]
    Maintainer,
}

impl SearchField {
    /// Value of the `by=` query parameter
    pub fn as_rpc_str(&self) -> &'static str {
        match self {
            Self::NameDesc => "name-desc",
            Self::Name => "name",
            Self::Maintainer => "maintainer",
        }
    }
}

impl FromStr for SearchField {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "name-desc" => Ok(Self::NameDesc),
            "name" => Ok(Self::Name),
            "maintainer" => Ok(Self::Maintainer),
            other => Err(format!(
                "invalid search field '{}' (expected name-desc, name or maintainer)",
                other
            )),
        }
    }
}

/// Upgrade/sync settings
#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    /// Packages never upgraded (unless forced)
    #[serde(default)]
    pub ignore: Vec<String>,

    /// Rolling ignore windows, `name=hours`
    #[serde(default)]
    pub ignore_for: Vec<String>,

    /// Hours between VCS package rebuilds (0 = always consider them)
    #[serde(default = "default_vcs_ignore_hours")]
    pub vcs_ignore_hours: u64,

    /// Minutes an RPC response stays cached (0 = no caching)
    #[serde(default = "default_rpc_cache_minutes")]
    pub rpc_cache_minutes: u64,

    /// Move requested dependencies ahead of their dependents
    #[serde(default = "default_true")]
    pub reorder_deps: bool,

    /// Pull missing AUR dependencies into an install
    #[serde(default = "default_true")]
    pub pull_deps: bool,

    /// Skip VCS packages during upgrades
    #[serde(default)]
    pub no_vcs: bool,

    /// Never version-check VCS packages, only install them
    #[serde(default)]
    pub vcs_install_only: bool,

    /// Skip dependency verification entirely
    #[serde(default)]
    pub skip_deps: bool,

    /// Include MakeDepends in dependency handling
    #[serde(default)]
    pub makedeps: bool,

    /// Do not copy built packages into the package caches
    #[serde(default)]
    pub no_cache: bool,

    /// Packages auric never touches
    #[serde(default)]
    pub do_not_track: Vec<String>,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            ignore: Vec::new(),
            ignore_for: Vec::new(),
            vcs_ignore_hours: default_vcs_ignore_hours(),
            rpc_cache_minutes: default_rpc_cache_minutes(),
            reorder_deps: true,
            pull_deps: true,
            no_vcs: false,
            vcs_install_only: false,
            skip_deps: false,
            makedeps: false,
            no_cache: false,
            do_not_track: Vec::new(),
        }
    }
}

impl SyncSection {
    /// How long a cached RPC response stays fresh
    pub fn rpc_cache_ttl(&self) -> Duration {
        minutes(self.rpc_cache_minutes)
    }
}

fn default_vcs_ignore_hours() -> u64 {
    720
}

fn default_rpc_cache_minutes() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

/// Build settings
#[derive(Debug, Clone, Deserialize)]
pub struct BuildSection {
    /// Build tool (a name on PATH or an absolute path)
    #[serde(default = "default_makepkg")]
    pub makepkg: PathBuf,

    /// Arguments passed to every real build
    #[serde(default = "default_makepkg_args")]
    pub makepkg_args: Vec<String>,

    #[serde(default)]
    pub download: DownloadMethod,

    #[serde(default)]
    pub on_split: SplitPolicy,

    /// Parent directory for per-package build directories (default: system temp)
    #[serde(default)]
    pub builds_dir: Option<PathBuf>,

    /// Build time limit in minutes (0 = unbounded, makepkg may prompt)
    #[serde(default)]
    pub build_timeout_minutes: u64,

    /// Time limit for a git clone in minutes
    #[serde(default = "default_git_timeout_minutes")]
    pub git_timeout_minutes: u64,

    /// Where `--fetch` leaves recipes
    #[serde(default = "default_fetch_dir")]
    pub fetch_dir: PathBuf,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            makepkg: default_makepkg(),
            makepkg_args: default_makepkg_args(),
            download: DownloadMethod::default(),
            on_split: SplitPolicy::default(),
            builds_dir: None,
            build_timeout_minutes: 0,
            git_timeout_minutes: default_git_timeout_minutes(),
            fetch_dir: default_fetch_dir(),
        }
    }
}

/// `minutes` as a duration; huge values saturate instead of overflowing
fn minutes(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(60))
}

impl BuildSection {
    pub fn build_timeout(&self) -> Option<Duration> {
        (self.build_timeout_minutes > 0).then(|| minutes(self.build_timeout_minutes))
    }

    pub fn git_timeout(&self) -> Duration {
        minutes(self.git_timeout_minutes)
    }
}

fn default_makepkg() -> PathBuf {
    PathBuf::from("makepkg")
}

fn default_makepkg_args() -> Vec<String> {
    vec!["-sr".to_string()]
}

fn default_git_timeout_minutes() -> u64 {
    10
}

fn default_fetch_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Filesystem locations
#[derive(Debug, Clone, Deserialize)]
pub struct PathsSection {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    #[serde(default = "default_pacman_conf")]
    pub pacman_conf: PathBuf,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            pacman_conf: default_pacman_conf(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("auric")
}

fn default_pacman_conf() -> PathBuf {
    PathBuf::from("/etc/pacman.conf")
}

/// pacman invocation settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PacmanSection {
    /// Extra arguments appended to `pacman -R`
    #[serde(default)]
    pub removal_args: Vec<String>,

    /// Run pacman without sudo
    #[serde(default)]
    pub no_sudo: bool,

    /// Package cache directories (default: CacheDir from pacman.conf)
    #[serde(default)]
    pub cache_dirs: Option<Vec<PathBuf>>,
}

/// AUR RPC settings
#[derive(Debug, Clone, Deserialize)]
pub struct RpcSection {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for RpcSection {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl RpcSection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_base_url() -> String {
    DEFAULT_AUR_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load a single configuration file
    pub fn load(path: &Path) -> Result<Self> {
        Self::load_layered(&[path.to_path_buf()], &[])
    }

    /// Load and merge configuration files in order
    ///
    /// `required` files must exist; `optional` files are skipped when missing.
    /// Optional files are applied first.
    pub fn load_layered(required: &[PathBuf], optional: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Value::Table(toml::map::Map::new());

        for path in optional {
            if path.exists() {
                merge_values(&mut merged, read_value(path)?);
            }
        }
        for path in required {
            merge_values(&mut merged, read_value(path)?);
        }

        let config: Config = merged
            .try_into()
            .context("Failed to apply configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Default optional locations: system file, then the user's file
    pub fn default_locations() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("auric.toml"));
        }
        paths
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.build.download == DownloadMethod::Git && self.build.on_split != SplitPolicy::Nothing
        {
            anyhow::bail!(
                "build.on_split = \"{}\" needs the tarball download, not git",
                self.build.on_split
            );
        }

        if self.build.makepkg.as_os_str().is_empty() {
            anyhow::bail!("build.makepkg must not be empty");
        }

        if self.rpc.timeout_secs == 0 {
            anyhow::bail!("rpc.timeout_secs must be greater than zero");
        }

        if self.build.git_timeout_minutes == 0 {
            anyhow::bail!("build.git_timeout_minutes must be greater than zero");
        }

        if !self.rpc.base_url.starts_with("http://") && !self.rpc.base_url.starts_with("https://")
        {
            anyhow::bail!("rpc.base_url must be an http(s) URL, got {}", self.rpc.base_url);
        }

        Ok(())
    }
}

fn read_value(path: &Path) -> Result<toml::Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Overlay `top` onto `base`, table by table
fn merge_values(base: &mut toml::Value, top: toml::Value) {
    match (base, top) {
        (toml::Value::Table(base), toml::Value::Table(top)) => {
            for (key, value) in top {
                match base.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, top) => *base = top,
    }
}
