// src/sync/mod.rs

//! Sync orchestration: the install, upgrade, deps and remove verbs
//!
//! Every installing verb funnels into one flow:
//!
//! 1. filter targets (ignore lists, VCS cooldown) unless the run is an
//!    explicit install or a forced refresh
//! 2. look up each target, verifying its dependencies
//! 3. optionally version-check installed VCS packages
//! 4. move reordered dependencies to the front, report and confirm
//! 5. build the queue under the instance lock, asking whether to continue
//!    after a failure

mod listing;
#[cfg(any(test, feature = "test-utils"))]
mod recording;

#[cfg(any(test, feature = "test-utils"))]
pub use recording::RecordingBuilder;

use crate::aur::{RemotePackage, RepositoryClient, is_vcs};
use crate::build::{BuildMode, BuildOutcome, PackageBuilder};
use crate::cache::{CacheManager, CleanReport};
use crate::config::{Config, SearchField};
use crate::error::{Error, Result};
use crate::localdb::{InstalledPackage, Installer, LocalDatabase};
use crate::report::Reporter;
use crate::resolver::Resolver;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Run-wide settings, from the config file with CLI overrides applied
#[derive(Debug, Clone)]
pub struct SyncOptions {
    /// `-y` count: 1 refresh, 2 force (skip filters, check VCS versions),
    /// 3 force without VCS version checks
    pub refresh: u8,
    pub no_vcs: bool,
    pub vcs_ignore_hours: u64,
    pub vcs_install_only: bool,
    pub ignore: Vec<String>,
    pub ignore_for: Vec<String>,
    pub pull_deps: bool,
    pub skip_deps: bool,
    pub reorder_deps: bool,
    pub makedeps: bool,
    pub do_not_track: Vec<String>,
    /// Fetch recipes here instead of building them
    pub fetch_dir: Option<PathBuf>,
    pub removal_args: Vec<String>,
    pub builds_dir: Option<PathBuf>,
    pub quiet: bool,
    /// `--info` count; 2 looks the term up as an exact name
    pub info: u8,
    pub search_field: SearchField,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            refresh: 0,
            no_vcs: config.sync.no_vcs,
            vcs_ignore_hours: config.sync.vcs_ignore_hours,
            vcs_install_only: config.sync.vcs_install_only,
            ignore: config.sync.ignore.clone(),
            ignore_for: config.sync.ignore_for.clone(),
            pull_deps: config.sync.pull_deps,
            skip_deps: config.sync.skip_deps,
            reorder_deps: config.sync.reorder_deps,
            makedeps: config.sync.makedeps,
            do_not_track: config.sync.do_not_track.clone(),
            fetch_dir: None,
            removal_args: config.pacman.removal_args.clone(),
            builds_dir: config.build.builds_dir.clone(),
            quiet: false,
            info: 0,
            search_field: SearchField::default(),
        }
    }

    fn forced(&self) -> bool {
        self.refresh >= 2
    }
}

/// What happened to each package of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub built: Vec<String>,
    pub up_to_date: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
    /// Queued packages never attempted because the operator stopped
    pub aborted: Vec<String>,
}

impl SyncSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn merge(&mut self, other: SyncSummary) {
        self.built.extend(other.built);
        self.up_to_date.extend(other.up_to_date);
        self.skipped.extend(other.skipped);
        self.failed.extend(other.failed);
        self.aborted.extend(other.aborted);
    }

    fn report(&self, reporter: &dyn Reporter) {
        let groups = [
            ("built", &self.built),
            ("up-to-date", &self.up_to_date),
            ("skipped", &self.skipped),
            ("failed", &self.failed),
            ("not attempted", &self.aborted),
        ];
        for (label, names) in groups {
            if !names.is_empty() {
                reporter.output(&format!("{}: {}", label, names.join(", ")));
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verb {
    Install,
    Upgrade,
}

/// Drives the resolver, builder and installer for one invocation
pub struct SyncOrchestrator {
    client: Arc<RepositoryClient>,
    localdb: Arc<dyn LocalDatabase>,
    installer: Arc<dyn Installer>,
    builder: Arc<dyn PackageBuilder>,
    cache: Arc<CacheManager>,
    reporter: Arc<dyn Reporter>,
    options: SyncOptions,
    now: DateTime<Utc>,
}

impl SyncOrchestrator {
    pub fn new(
        client: Arc<RepositoryClient>,
        localdb: Arc<dyn LocalDatabase>,
        installer: Arc<dyn Installer>,
        builder: Arc<dyn PackageBuilder>,
        cache: Arc<CacheManager>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            client,
            localdb,
            installer,
            builder,
            cache,
            reporter,
            options: SyncOptions::default(),
            now: Utc::now(),
        }
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Clock used by the cooldown and ignore windows
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.now = now;
        self
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    fn resolver(&self, check_deps: bool) -> Resolver {
        Resolver::new(self.client.clone(), self.localdb.clone(), self.reporter.clone())
            .reorder(self.options.reorder_deps)
            .check_deps(check_deps)
            .include_make(self.options.makedeps)
            .do_not_track(&self.options.do_not_track)
    }

    /// `-S`: install the named packages
    ///
    /// With dependency pulling on, each target's AUR dependency chain is
    /// queued ahead of it.
    pub fn install(&self, targets: &[String]) -> Result<SyncSummary> {
        self.cache.ensure_unlocked()?;
        let mut resolver = self.resolver(!self.options.skip_deps);

        let queue = if self.options.pull_deps && !self.options.skip_deps {
            let mut queue: Vec<String> = Vec::new();
            for target in targets {
                if !resolver.is_tracked(target) {
                    continue;
                }
                let chain = resolver.resolve_chain(target).map_err(|e| match e {
                    Error::NotFoundError(_) => self.unknown(target),
                    other => other,
                })?;
                for node in chain {
                    if !queue.contains(&node.name) {
                        queue.push(node.name);
                    }
                }
            }
            queue
        } else {
            targets.to_vec()
        };

        debug!("install queue: {:?}", queue);
        resolver.set_requested(queue.clone());
        self.syncing(&mut resolver, &queue, Verb::Install)
    }

    /// `-Su`: upgrade installed AUR packages (all, or the named ones)
    pub fn upgrade(&self, targets: &[String]) -> Result<SyncSummary> {
        self.cache.ensure_unlocked()?;
        let installed = self.query_packages(targets)?;
        let mut resolver = self.resolver(!self.options.skip_deps);
        let ordered = resolver.order_installed(&installed)?;
        trace!("upgrade order: {:?}", ordered);
        resolver.set_requested(ordered.clone());
        self.syncing(&mut resolver, &ordered, Verb::Upgrade)
    }

    /// `-Sd`: install each target with its full dependency chain
    ///
    /// Targets are handled one after another; one that cannot be found is
    /// reported and the rest still run.
    pub fn deps(&self, targets: &[String]) -> Result<SyncSummary> {
        self.cache.ensure_unlocked()?;
        let mut summary = SyncSummary::default();

        for target in targets {
            let mut resolver = self.resolver(false);
            let chain = match resolver.resolve_chain(target) {
                Ok(chain) => chain,
                Err(Error::NotFoundError(_)) => {
                    self.reporter
                        .error(&format!("unable to find package: {}", target));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let names: Vec<String> = chain.into_iter().map(|n| n.name).collect();
            debug!("chain for {}: {:?}", target, names);
            resolver.set_requested(names.clone());
            summary.merge(self.syncing(&mut resolver, &names, Verb::Install)?);
        }

        Ok(summary)
    }

    /// `-R`: remove installed AUR packages
    pub fn remove(&self, targets: &[String]) -> Result<()> {
        self.cache.ensure_unlocked()?;
        let packages = self.query_packages(targets)?;
        if packages.is_empty() {
            self.reporter.output("nothing to do");
            return Ok(());
        }

        let items: Vec<String> = packages
            .iter()
            .map(|p| format!("{} {}", p.name, p.version))
            .collect();
        self.confirm("remove packages", &items, true)?;

        let names: Vec<String> = packages.into_iter().map(|p| p.name).collect();
        if let Err(e) = self.installer.remove(&names, &self.options.removal_args) {
            error!("removal failed: {}", e);
            self.reporter.error("unable to remove packages");
            return Err(e);
        }
        self.reporter.output("packages removed");
        Ok(())
    }

    /// `-Sc`: clear cache files and build directories
    pub fn clean(&self) -> Result<CleanReport> {
        self.cache.clean(self.options.builds_dir.as_deref())
    }

    /// Installed AUR packages, all or the named ones
    ///
    /// A named package that is not installed, or that came from a sync
    /// repository, is fatal.
    pub fn query_packages(&self, targets: &[String]) -> Result<Vec<InstalledPackage>> {
        if targets.is_empty() {
            return Ok(self
                .localdb
                .foreign_packages()?
                .into_iter()
                .filter(|p| !self.options.do_not_track.contains(&p.name))
                .collect());
        }

        let repos = self.localdb.repository_packages()?;
        let mut found = Vec::new();
        for target in targets {
            match self.localdb.installed_version(target)? {
                Some(version) if !repos.contains(target) => {
                    found.push(InstalledPackage::new(target.clone(), version));
                }
                _ => {
                    self.reporter.error(&format!("unknown package: {}", target));
                    return Err(Error::NotFoundError(format!("unknown package: {}", target)));
                }
            }
        }
        Ok(found)
    }

    fn syncing(&self, resolver: &mut Resolver, targets: &[String], verb: Verb) -> Result<SyncSummary> {
        let opts = &self.options;
        let mut summary = SyncSummary::default();

        let skip_filters = verb == Verb::Install || opts.forced();
        if skip_filters {
            debug!("skip filtering options");
        }
        let mut ignored = if skip_filters {
            Vec::new()
        } else {
            opts.ignore.clone()
        };
        let mut no_vcs = opts.no_vcs || (opts.refresh > 0 && !skip_filters);

        if !no_vcs && opts.vcs_ignore_hours > 0 && !skip_filters {
            let _guard = self.cache.hold()?;
            match self.cache.check_vcs_ignore(opts.vcs_ignore_hours, self.now) {
                Ok(true) => {
                    trace!("vcs ignore threshold met");
                    no_vcs = true;
                }
                Ok(false) => {}
                Err(e @ Error::InitError(_)) => return Err(e),
                Err(e) => error!("unexpected vcs error: {}", e),
            }
        }
        debug!("novcs? {}", no_vcs);

        if !opts.ignore_for.is_empty() && !skip_filters {
            let _guard = self.cache.hold()?;
            match self.cache.check_ignore_for(&opts.ignore_for, &mut ignored, self.now) {
                Ok(()) => {}
                Err(e @ Error::InitError(_)) => return Err(e),
                Err(e) => error!("unexpected ignore_for error: {}", e),
            }
        }
        trace!("ignoring {:?}", ignored);

        let mut candidates = Vec::new();
        for name in targets {
            if !resolver.is_tracked(name) {
                debug!("{} is not tracked", name);
                continue;
            }
            if ignored.contains(name) {
                self.reporter.output(&format!("{} is ignored", name));
                summary.skipped.push(name.clone());
                continue;
            }
            let vcs = is_vcs(name);
            if no_vcs && vcs {
                debug!("skipping vcs package {}", name);
                summary.skipped.push(name.clone());
                continue;
            }

            let Some(pkg) = resolver.lookup(name)? else {
                return Err(self.unknown(name));
            };

            if vcs && !opts.vcs_install_only && opts.refresh == 2 && !self.vcs_needs_update(&pkg, &mut summary)? {
                continue;
            }
            candidates.push(pkg);
        }

        let queue = apply_reorders(candidates, resolver.reorders());
        trace!("queue: {:?}", queue.iter().map(|p| &p.name).collect::<Vec<_>>());

        let mut report = Vec::new();
        let mut work = Vec::new();
        for pkg in queue {
            let vcs = pkg.is_vcs();
            let mut tag = "";
            match self.localdb.installed_version(&pkg.name)? {
                Some(installed) if installed == pkg.version || vcs => {
                    if !vcs && verb == Verb::Upgrade {
                        summary.up_to_date.push(pkg.name);
                        continue;
                    }
                    tag = " [installed]";
                }
                Some(_) => {}
                None if verb != Verb::Install => {
                    self.reporter.error(&format!("{} not installed", pkg.name));
                    return Err(Error::NotFoundError(format!("{} not installed", pkg.name)));
                }
                None => {}
            }
            report.push(format!("{} {}{}", pkg.name, pkg.display_version(), tag));
            work.push(pkg);
        }

        if work.is_empty() {
            self.reporter.output("nothing to do");
            return Ok(summary);
        }

        let (prompt, mode) = match &opts.fetch_dir {
            Some(dest) => ("fetch packages", BuildMode::FetchOnly { dest: dest.clone() }),
            None => ("install packages", BuildMode::Install),
        };
        self.confirm(prompt, &report, true)?;

        self.build_queue(&work, &mode, &mut summary)?;
        summary.report(self.reporter.as_ref());
        Ok(summary)
    }

    /// Version-check an installed VCS package; false when it is current
    fn vcs_needs_update(&self, pkg: &RemotePackage, summary: &mut SyncSummary) -> Result<bool> {
        debug!("checking vcs version");
        let Some(installed) = self.localdb.installed_version(&pkg.name)? else {
            debug!("unable to find installed package {}", pkg.name);
            return Ok(true);
        };

        let _guard = self.cache.hold()?;
        match self.builder.build(pkg, &BuildMode::VersionCheck { installed }) {
            Ok(BuildOutcome::UpToDate(_)) => {
                summary.up_to_date.push(pkg.name.clone());
                Ok(false)
            }
            Ok(_) => Ok(true),
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                error!("version check of {} failed: {}", pkg.name, e);
                self.reporter
                    .error(&format!("unable to check version: {}", pkg.name));
                summary.failed.push(pkg.name.clone());
                Ok(false)
            }
        }
    }

    fn build_queue(&self, work: &[RemotePackage], mode: &BuildMode, summary: &mut SyncSummary) -> Result<()> {
        let _guard = self.cache.hold()?;

        for (index, pkg) in work.iter().enumerate() {
            match self.builder.build(pkg, mode) {
                Ok(BuildOutcome::Skipped) => summary.skipped.push(pkg.name.clone()),
                Ok(BuildOutcome::UpToDate(_)) => summary.up_to_date.push(pkg.name.clone()),
                Ok(outcome) => {
                    info!("{}: {:?}", pkg.name, outcome);
                    summary.built.push(pkg.name.clone());
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    error!("unexpected install error: {}", e);
                    self.reporter.error(&e.to_string());
                    self.reporter
                        .error(&format!("error installing package: {}", pkg.name));
                    summary.failed.push(pkg.name.clone());

                    let remaining: Vec<String> = work[index + 1..].iter().map(|p| p.name.clone()).collect();
                    if !remaining.is_empty() && !self.reporter.confirm("attempt to continue", &remaining, false)? {
                        self.reporter.error("attempt to continue cancelled");
                        summary.aborted = remaining;
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn confirm(&self, message: &str, items: &[String], default_yes: bool) -> Result<()> {
        if self.reporter.confirm(message, items, default_yes)? {
            Ok(())
        } else {
            self.reporter.error(&format!("{} cancelled", message));
            Err(Error::Declined(message.to_string()))
        }
    }

    fn unknown(&self, name: &str) -> Error {
        self.reporter.error(&format!("unknown AUR package: {}", name));
        Error::NotFoundError(format!("unknown AUR package: {}", name))
    }
}

/// Dependencies recorded as reordered go first, then everything else in order
fn apply_reorders(candidates: Vec<RemotePackage>, reorders: &[String]) -> Vec<RemotePackage> {
    let mut queue: Vec<RemotePackage> = reorders
        .iter()
        .filter_map(|name| candidates.iter().find(|p| &p.name == name).cloned())
        .collect();
    for pkg in candidates {
        if !queue.iter().any(|q| q.name == pkg.name) {
            queue.push(pkg);
        }
    }
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aur::{StaticTransport, info_url};
    use crate::cache::{LOCK_FILE, timestamp_string};
    use crate::localdb::{InstallerCall, MemoryDatabase, RecordingInstaller};
    use crate::report::MemoryReporter;
    use chrono::Duration as ChronoDuration;
    use std::fs;
    use tempfile::TempDir;

    const BASE: &str = "https://aur.example.org";

    fn info(name: &str, version: &str, depends: &[&str]) -> String {
        serde_json::json!({
            "results": [{
                "Name": name,
                "Version": version,
                "PackageBase": name,
                "URLPath": format!("/cgit/aur.git/snapshot/{name}.tar.gz"),
                "Depends": depends,
            }]
        })
        .to_string()
    }

    struct Harness {
        dir: TempDir,
        transport: Arc<StaticTransport>,
        reporter: Arc<MemoryReporter>,
        builder: Arc<RecordingBuilder>,
        installer: Arc<RecordingInstaller>,
        sync: SyncOrchestrator,
    }

    struct Setup {
        transport: StaticTransport,
        db: MemoryDatabase,
        reporter: MemoryReporter,
        builder: RecordingBuilder,
        installer: RecordingInstaller,
        options: SyncOptions,
    }

    impl Setup {
        fn new() -> Self {
            Self {
                transport: StaticTransport::new(),
                db: MemoryDatabase::new(),
                reporter: MemoryReporter::new(),
                builder: RecordingBuilder::new(),
                installer: RecordingInstaller::new(),
                options: SyncOptions {
                    vcs_ignore_hours: 0,
                    ..SyncOptions::default()
                },
            }
        }

        fn aur(mut self, name: &str, version: &str, depends: &[&str]) -> Self {
            self.transport = self
                .transport
                .with_route(info_url(BASE, name), info(name, version, depends));
            self
        }

        fn installed(mut self, name: &str, version: &str, depends: &[&str]) -> Self {
            self.db = self.db.with_installed(name, version, depends);
            self
        }

        fn finish(self) -> Harness {
            let dir = TempDir::new().unwrap();
            let reporter = Arc::new(self.reporter);
            let transport = Arc::new(self.transport);
            let builder = Arc::new(self.builder);
            let installer = Arc::new(self.installer);
            let db: Arc<dyn LocalDatabase> = Arc::new(self.db);
            let cache = Arc::new(CacheManager::new(dir.path(), reporter.clone()));
            let client = Arc::new(RepositoryClient::new(
                transport.clone(),
                db.clone(),
                reporter.clone(),
                BASE,
            ));
            let sync = SyncOrchestrator::new(
                client,
                db,
                installer.clone(),
                builder.clone(),
                cache,
                reporter.clone(),
            )
            .with_options(self.options);
            Harness {
                dir,
                transport,
                reporter,
                builder,
                installer,
                sync,
            }
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_install_pulls_dependencies_first() {
        let h = Setup::new()
            .aur("foo", "1.0-1", &["bar"])
            .aur("bar", "2.0-1", &[])
            .finish();

        let summary = h.sync.install(&names(&["foo"])).unwrap();

        assert_eq!(h.builder.installed(), vec!["bar", "foo"]);
        assert_eq!(summary.built, vec!["bar", "foo"]);
        let prompts = h.reporter.prompts();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0].message, "install packages");
        assert_eq!(prompts[0].items, vec!["bar 2.0-1", "foo 1.0-1"]);
        assert!(!h.dir.path().join(LOCK_FILE).exists());
    }

    #[test]
    fn test_install_unknown_target_is_fatal() {
        let h = Setup::new().aur("foo", "1.0-1", &[]).finish();

        let err = h.sync.install(&names(&["nope"])).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
        assert!(h.reporter.errors().contains(&"unknown AUR package: nope".to_string()));
        assert!(h.builder.builds().is_empty());
    }

    #[test]
    fn test_install_marks_installed_packages() {
        let h = Setup::new()
            .aur("foo", "1.0-1", &[])
            .installed("foo", "1.0-1", &[])
            .finish();

        h.sync.install(&names(&["foo"])).unwrap();
        assert_eq!(h.reporter.prompts()[0].items, vec!["foo 1.0-1 [installed]"]);
    }

    #[test]
    fn test_install_without_pull_reports_unmet() {
        let mut setup = Setup::new()
            .aur("foo", "1.0-1", &["bar"])
            .aur("bar", "2.0-1", &[]);
        setup.options.pull_deps = false;
        let h = setup.finish();

        let err = h.sync.install(&names(&["foo"])).unwrap_err();
        assert!(matches!(err, Error::UnmetDependencies(_)));
        assert!(h.builder.builds().is_empty());
    }

    #[test]
    fn test_requested_dependency_is_moved_first() {
        let mut setup = Setup::new()
            .aur("foo", "1.0-1", &["bar"])
            .aur("bar", "2.0-1", &[]);
        setup.options.pull_deps = false;
        let h = setup.finish();

        h.sync.install(&names(&["foo", "bar"])).unwrap();
        assert_eq!(h.builder.installed(), vec!["bar", "foo"]);
        assert!(h.reporter.outputs().contains(&"switching bar and foo".to_string()));
    }

    #[test]
    fn test_declined_confirmation_builds_nothing() {
        let mut setup = Setup::new().aur("foo", "1.0-1", &[]);
        setup.reporter = MemoryReporter::with_answers(&[false]);
        let h = setup.finish();

        let err = h.sync.install(&names(&["foo"])).unwrap_err();
        assert!(matches!(err, Error::Declined(_)));
        assert!(h.builder.builds().is_empty());
    }

    #[test]
    fn test_failure_declined_aborts_rest() {
        let mut setup = Setup::new()
            .aur("a", "1-1", &[])
            .aur("b", "1-1", &[])
            .aur("c", "1-1", &[]);
        setup.builder = RecordingBuilder::new().failing("a", "makepkg exited 1");
        setup.reporter = MemoryReporter::with_answers(&[true, false]);
        let h = setup.finish();

        let summary = h.sync.install(&names(&["a", "b", "c"])).unwrap();
        assert_eq!(summary.failed, vec!["a"]);
        assert_eq!(summary.aborted, vec!["b", "c"]);
        assert!(summary.built.is_empty());
        assert!(!summary.is_success());

        let prompts = h.reporter.prompts();
        assert_eq!(prompts[1].message, "attempt to continue");
        assert_eq!(prompts[1].items, vec!["b", "c"]);
        assert!(!prompts[1].default_yes);
        assert!(h.reporter.errors().contains(&"error installing package: a".to_string()));
    }

    #[test]
    fn test_failure_accepted_continues() {
        let mut setup = Setup::new()
            .aur("a", "1-1", &[])
            .aur("b", "1-1", &[]);
        setup.builder = RecordingBuilder::new().failing("a", "makepkg exited 1");
        setup.reporter = MemoryReporter::with_answers(&[true, true]);
        let h = setup.finish();

        let summary = h.sync.install(&names(&["a", "b"])).unwrap();
        assert_eq!(summary.failed, vec!["a"]);
        assert_eq!(summary.built, vec!["b"]);
    }

    #[test]
    fn test_last_failure_does_not_prompt() {
        let mut setup = Setup::new().aur("a", "1-1", &[]);
        setup.builder = RecordingBuilder::new().failing("a", "boom");
        let h = setup.finish();

        let summary = h.sync.install(&names(&["a"])).unwrap();
        assert_eq!(summary.failed, vec!["a"]);
        assert_eq!(h.reporter.prompts().len(), 1);
    }

    #[test]
    fn test_upgrade_skips_current_packages() {
        let h = Setup::new()
            .aur("foo", "1.1-1", &[])
            .aur("bar", "2.0-1", &[])
            .installed("foo", "1.0-1", &[])
            .installed("bar", "2.0-1", &[])
            .finish();

        let summary = h.sync.upgrade(&[]).unwrap();
        assert_eq!(h.builder.installed(), vec!["foo"]);
        assert_eq!(summary.up_to_date, vec!["bar"]);
        assert_eq!(h.reporter.prompts()[0].items, vec!["foo 1.1-1"]);
    }

    #[test]
    fn test_upgrade_orders_dependencies_first() {
        let h = Setup::new()
            .aur("app", "2-1", &["lib"])
            .aur("lib", "2-1", &[])
            .installed("app", "1-1", &["lib"])
            .installed("lib", "1-1", &[])
            .finish();

        h.sync.upgrade(&[]).unwrap();
        assert_eq!(h.builder.installed(), vec!["lib", "app"]);
    }

    #[test]
    fn test_upgrade_nothing_to_do() {
        let h = Setup::new()
            .aur("foo", "1.0-1", &[])
            .installed("foo", "1.0-1", &[])
            .finish();

        let summary = h.sync.upgrade(&[]).unwrap();
        assert!(h.reporter.outputs().contains(&"nothing to do".to_string()));
        assert!(h.reporter.prompts().is_empty());
        assert!(summary.built.is_empty());
    }

    #[test]
    fn test_upgrade_honors_ignore_list() {
        let mut setup = Setup::new()
            .aur("foo", "1.1-1", &[])
            .installed("foo", "1.0-1", &[]);
        setup.options.ignore = names(&["foo"]);
        let h = setup.finish();

        h.sync.upgrade(&[]).unwrap();
        assert!(h.reporter.outputs().contains(&"foo is ignored".to_string()));
        assert!(h.builder.builds().is_empty());
        assert!(h.transport.requests().is_empty());
    }

    #[test]
    fn test_forced_refresh_ignores_ignore_list() {
        let mut setup = Setup::new()
            .aur("foo", "1.1-1", &[])
            .installed("foo", "1.0-1", &[]);
        setup.options.ignore = names(&["foo"]);
        setup.options.refresh = 3;
        let h = setup.finish();

        h.sync.upgrade(&[]).unwrap();
        assert_eq!(h.builder.installed(), vec!["foo"]);
    }

    #[test]
    fn test_vcs_cooldown_skips_vcs_packages() {
        let mut setup = Setup::new()
            .aur("foo-git", "r1-1", &[])
            .installed("foo-git", "r1-1", &[]);
        setup.options.vcs_ignore_hours = 24;
        let h = setup.finish();
        fs::write(
            h.dir.path().join("vcs.cache"),
            timestamp_string(Utc::now() - ChronoDuration::hours(1)),
        )
        .unwrap();

        h.sync.upgrade(&[]).unwrap();
        assert!(h.transport.requests().is_empty());
        assert!(h.builder.builds().is_empty());
        assert!(h.reporter.outputs().contains(&"nothing to do".to_string()));
    }

    #[test]
    fn test_refresh_alone_skips_vcs() {
        let mut setup = Setup::new()
            .aur("foo-git", "r1-1", &[])
            .installed("foo-git", "r1-1", &[]);
        setup.options.refresh = 1;
        let h = setup.finish();

        h.sync.upgrade(&[]).unwrap();
        assert!(h.builder.builds().is_empty());
    }

    #[test]
    fn test_forced_refresh_checks_vcs_versions() {
        let mut setup = Setup::new()
            .aur("foo-git", "r1-1", &[])
            .aur("bar-git", "r1-1", &[])
            .installed("foo-git", "r1-1", &[])
            .installed("bar-git", "r1-1", &[]);
        setup.options.refresh = 2;
        setup.builder = RecordingBuilder::new()
            .with_outcome("foo-git", BuildOutcome::UpToDate("r1-1".to_string()));
        let h = setup.finish();

        let summary = h.sync.upgrade(&[]).unwrap();
        assert_eq!(summary.up_to_date, vec!["foo-git"]);
        assert_eq!(summary.built, vec!["bar-git"]);
        assert_eq!(
            h.reporter.prompts()[0].items,
            vec!["bar-git latest (vcs version) [installed]"]
        );
        let checks: Vec<String> = h
            .builder
            .builds()
            .into_iter()
            .filter(|(_, mode)| matches!(mode, BuildMode::VersionCheck { .. }))
            .map(|(name, _)| name)
            .collect();
        assert_eq!(checks, vec!["bar-git", "foo-git"]);
    }

    #[test]
    fn test_upgrade_of_unknown_target_is_fatal() {
        let h = Setup::new().finish();
        let err = h.sync.upgrade(&names(&["ghost"])).unwrap_err();
        assert!(matches!(err, Error::NotFoundError(_)));
        assert!(h.reporter.errors().contains(&"unknown package: ghost".to_string()));
    }

    #[test]
    fn test_lock_conflict_stops_install() {
        let h = Setup::new().aur("foo", "1.0-1", &[]).finish();
        let lock = h.dir.path().join(LOCK_FILE);
        fs::write(&lock, "{}").unwrap();

        let err = h.sync.install(&names(&["foo"])).unwrap_err();
        assert!(matches!(err, Error::LockConflict(_)));
        assert!(h.builder.builds().is_empty());
        assert!(h.transport.requests().is_empty());
        assert_eq!(fs::read_to_string(&lock).unwrap(), "{}");
    }

    #[test]
    fn test_deps_installs_each_chain() {
        let h = Setup::new()
            .aur("foo", "1.0-1", &["bar"])
            .aur("bar", "1.0-1", &["baz"])
            .aur("baz", "1.0-1", &[])
            .finish();

        let summary = h.sync.deps(&names(&["foo", "missing"])).unwrap();
        assert_eq!(summary.built, vec!["baz", "bar", "foo"]);
        assert!(h.reporter.errors().contains(&"unable to find package: missing".to_string()));
    }

    #[test]
    fn test_fetch_only_mode() {
        let mut setup = Setup::new().aur("foo", "1.0-1", &[]);
        setup.options.fetch_dir = Some(PathBuf::from("/tmp/recipes"));
        let h = setup.finish();

        h.sync.install(&names(&["foo"])).unwrap();
        assert_eq!(h.reporter.prompts()[0].message, "fetch packages");
        assert_eq!(
            h.builder.builds(),
            vec![(
                "foo".to_string(),
                BuildMode::FetchOnly {
                    dest: PathBuf::from("/tmp/recipes")
                }
            )]
        );
    }

    #[test]
    fn test_do_not_track_is_never_built() {
        let mut setup = Setup::new()
            .aur("foo", "1.1-1", &[])
            .aur("bar", "1.1-1", &[])
            .installed("foo", "1.0-1", &[])
            .installed("bar", "1.0-1", &[]);
        setup.options.do_not_track = names(&["bar"]);
        let h = setup.finish();

        h.sync.upgrade(&[]).unwrap();
        assert_eq!(h.builder.installed(), vec!["foo"]);
    }

    #[test]
    fn test_remove_confirms_and_calls_installer() {
        let mut setup = Setup::new().installed("foo", "1.0-1", &[]);
        setup.options.removal_args = names(&["-s"]);
        let h = setup.finish();

        h.sync.remove(&names(&["foo"])).unwrap();
        assert_eq!(h.reporter.prompts()[0].items, vec!["foo 1.0-1"]);
        assert_eq!(
            h.installer.calls(),
            vec![InstallerCall::Remove {
                names: names(&["foo"]),
                extra_args: names(&["-s"]),
            }]
        );
        assert!(h.reporter.outputs().contains(&"packages removed".to_string()));
    }

    #[test]
    fn test_remove_failure_is_fatal() {
        let mut setup = Setup::new().installed("foo", "1.0-1", &[]);
        setup.installer = RecordingInstaller::failing_remove();
        let h = setup.finish();

        assert!(h.sync.remove(&names(&["foo"])).is_err());
        assert!(h.reporter.errors().contains(&"unable to remove packages".to_string()));
    }

    #[test]
    fn test_remove_repository_package_is_rejected() {
        let mut setup = Setup::new().installed("glibc", "2.40-1", &[]);
        setup.db = setup.db.with_repository("glibc");
        let h = setup.finish();

        assert!(h.sync.remove(&names(&["glibc"])).is_err());
        assert!(h.installer.calls().is_empty());
    }

    #[test]
    fn test_apply_reorders() {
        let pkg = |name: &str| RemotePackage {
            name: name.to_string(),
            ..RemotePackage::default()
        };
        let queue = apply_reorders(vec![pkg("a"), pkg("b"), pkg("c")], &names(&["c", "x"]));
        let order: Vec<&str> = queue.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(order, vec!["c", "a", "b"]);
    }
}
