// tests/common/mod.rs

//! Shared fixtures for integration tests: a canned AUR, a fake makepkg and
//! an orchestrator wired to the real build pipeline.

#![allow(dead_code)]

use auric::aur::{StaticTransport, info_url, snapshot_url};
use auric::build::{BuildPipeline, FetchMethod, Fetcher};
use auric::config::SplitPolicy;
use auric::localdb::{InstallerCall, LocalDatabase, MemoryDatabase, RecordingInstaller};
use auric::{CacheManager, CancelToken, MemoryReporter, RepositoryClient, SyncOptions, SyncOrchestrator};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const BASE: &str = "https://aur.example.org";

/// Stand-in for makepkg
///
/// Sources the PKGBUILD, logs `pkgname args` and answers the queries the
/// pipeline makes. A PKGBUILD setting `fail=1` fails to build.
const FAKE_MAKEPKG: &str = r#"#!/bin/bash
. ./PKGBUILD
echo "$pkgname $*" >> "@LOG@"
artifact="$pkgname-$pkgver-$pkgrel-any.pkg.tar.zst"
case "$1" in
    --packagelist)
        echo "$PWD/$artifact"
        ;;
    --printsrcinfo)
        printf 'pkgbase = %s\n\tpkgver = %s\n\tpkgrel = %s\n\npkgname = %s\n' \
            "$pkgname" "$pkgver" "$pkgrel" "$pkgname"
        ;;
    *)
        if [ -n "$fail" ]; then
            echo "build() failed" >&2
            exit 1
        fi
        touch "$artifact"
        ;;
esac
"#;

pub fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

/// gzip tarball holding `<name>/PKGBUILD`, laid out like an AUR snapshot
pub fn snapshot(name: &str, pkgbuild: &str) -> Vec<u8> {
    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    let mut header = tar::Header::new_gnu();
    header.set_size(pkgbuild.len() as u64);
    header.set_mode(0o644);
    builder
        .append_data(&mut header, format!("{}/PKGBUILD", name), pkgbuild.as_bytes())
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

/// PKGBUILD for `name` at `version` (`pkgver-pkgrel`)
pub fn pkgbuild(name: &str, version: &str) -> String {
    let (pkgver, pkgrel) = version.rsplit_once('-').unwrap_or((version, "1"));
    format!("pkgname={}\npkgver={}\npkgrel={}\n", name, pkgver, pkgrel)
}

/// Canned AUR: RPC info responses plus snapshot archives
#[derive(Default)]
pub struct TestAur {
    transport: StaticTransport,
}

impl TestAur {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn package(self, name: &str, version: &str, depends: &[&str]) -> Self {
        let recipe = pkgbuild(name, version);
        self.with_recipe(name, version, depends, &recipe)
    }

    /// A package whose build always fails
    pub fn failing(self, name: &str, version: &str) -> Self {
        let recipe = format!("{}fail=1\n", pkgbuild(name, version));
        self.with_recipe(name, version, &[], &recipe)
    }

    pub fn with_recipe(mut self, name: &str, version: &str, depends: &[&str], recipe: &str) -> Self {
        let url_path = format!("/cgit/aur.git/snapshot/{}.tar.gz", name);
        let info = serde_json::json!({
            "results": [{
                "Name": name,
                "Version": version,
                "PackageBase": name,
                "URLPath": url_path,
                "Depends": depends,
            }]
        })
        .to_string();
        self.transport = self
            .transport
            .with_route(info_url(BASE, name), info)
            .with_route(snapshot_url(BASE, &url_path), snapshot(name, recipe));
        self
    }
}

/// Everything a pipeline test inspects
pub struct World {
    pub root: TempDir,
    pub transport: Arc<StaticTransport>,
    pub reporter: Arc<MemoryReporter>,
    pub installer: Arc<RecordingInstaller>,
    pub cache: Arc<CacheManager>,
    pub sync: SyncOrchestrator,
}

impl World {
    pub fn cache_dir(&self) -> PathBuf {
        self.root.path().join("cache")
    }

    pub fn builds_dir(&self) -> PathBuf {
        self.root.path().join("builds")
    }

    /// `pkgname args` for each makepkg invocation, in order
    pub fn makepkg_calls(&self) -> Vec<String> {
        fs::read_to_string(self.root.path().join("makepkg.log"))
            .map(|log| log.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// File names handed to the installer, per install call
    pub fn installed_files(&self) -> Vec<Vec<String>> {
        self.installer
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                InstallerCall::Install(files) => Some(file_names(&files)),
                _ => None,
            })
            .collect()
    }

    /// Directories artifacts were cached into
    pub fn cached_into(&self) -> Vec<PathBuf> {
        self.installer
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                InstallerCall::Cache { dir, .. } => Some(dir),
                _ => None,
            })
            .collect()
    }

    /// Build directories left behind
    pub fn leftover_builds(&self) -> usize {
        fs::read_dir(self.builds_dir())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn file_names(files: &[PathBuf]) -> Vec<String> {
    files
        .iter()
        .filter_map(|f| f.file_name().map(|n| n.to_string_lossy().into_owned()))
        .collect()
}

/// Options for tests: no VCS cooldown
pub fn options() -> SyncOptions {
    SyncOptions {
        vcs_ignore_hours: 0,
        ..SyncOptions::default()
    }
}

pub struct WorldBuilder {
    aur: TestAur,
    db: MemoryDatabase,
    reporter: MemoryReporter,
    options: SyncOptions,
    split_policy: SplitPolicy,
    cache_dirs: Vec<String>,
}

impl WorldBuilder {
    pub fn new(aur: TestAur) -> Self {
        Self {
            aur,
            db: MemoryDatabase::new(),
            reporter: MemoryReporter::new(),
            options: options(),
            split_policy: SplitPolicy::Nothing,
            cache_dirs: Vec::new(),
        }
    }

    pub fn installed(mut self, name: &str, version: &str) -> Self {
        self.db = self.db.with_installed(name, version, &[]);
        self
    }

    pub fn answers(mut self, answers: &[bool]) -> Self {
        self.reporter = MemoryReporter::with_answers(answers);
        self
    }

    pub fn options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    pub fn split_policy(mut self, policy: SplitPolicy) -> Self {
        self.split_policy = policy;
        self
    }

    /// Package cache directories, relative to the test root
    pub fn cache_dirs(mut self, dirs: &[&str]) -> Self {
        self.cache_dirs = names(dirs);
        self
    }

    pub fn build(self) -> World {
        let root = TempDir::new().unwrap();
        let makepkg = write_makepkg(root.path());

        let reporter = Arc::new(self.reporter);
        let transport = Arc::new(self.aur.transport);
        let installer = Arc::new(RecordingInstaller::new());
        let db: Arc<dyn LocalDatabase> = Arc::new(self.db);

        let cache = Arc::new(CacheManager::new(root.path().join("cache"), reporter.clone()));
        cache.ensure_dir().unwrap();

        let client = Arc::new(RepositoryClient::new(
            transport.clone(),
            db.clone(),
            reporter.clone(),
            BASE,
        ));
        let cancel = CancelToken::new();
        let fetcher = Fetcher::new(
            client.clone(),
            FetchMethod::Archive,
            Duration::from_secs(60),
            cancel.clone(),
        );
        let cache_dirs: Vec<PathBuf> = self
            .cache_dirs
            .iter()
            .map(|d| root.path().join(d))
            .collect();
        let pipeline = BuildPipeline::new(fetcher, installer.clone(), reporter.clone(), cancel)
            .makepkg(&makepkg, vec!["-sr".to_string()])
            .split_policy(self.split_policy)
            .cache_dirs(&cache_dirs)
            .builds_dir(Some(root.path().join("builds")))
            .build_timeout(Some(Duration::from_secs(60)));

        let sync = SyncOrchestrator::new(
            client,
            db,
            installer.clone(),
            Arc::new(pipeline),
            cache.clone(),
            reporter.clone(),
        )
        .with_options(self.options);

        World {
            root,
            transport,
            reporter,
            installer,
            cache,
            sync,
        }
    }
}

fn write_makepkg(root: &Path) -> PathBuf {
    let log = root.join("makepkg.log");
    let script = FAKE_MAKEPKG.replace("@LOG@", &log.to_string_lossy());
    let path = root.join("makepkg");
    fs::write(&path, script).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}
