// src/resolver/mod.rs

//! Dependency resolution for AUR packages
//!
//! Two walks share one [`Resolver`]:
//! - verification (`verify_dependencies`): every dependency of a requested
//!   package must be requested too, provided by the sync repositories,
//!   already installed at a suitable version, or not an AUR package at all
//! - chain resolution (`resolve_chain`): full recursive descent from one root
//!   producing an ordered install list, deepest dependencies first
//!
//! The resolver owns its visited state. `seen` holds packages whose check is
//! finished; `in_progress` holds the chain walk's descent path, and meeting a
//! name on that path is a cycle. Verification looks one level deep only, so
//! the one cycle it can meet is a package naming itself.

mod spec;

pub use spec::DependencySpec;

use crate::aur::{RemotePackage, RepositoryClient};
use crate::error::{Error, Result};
use crate::localdb::{InstalledPackage, LocalDatabase};
use crate::report::Reporter;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Interval between "still working..." notices during chain resolution
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// A package found during chain resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionNode {
    /// Distance from the resolution root
    pub depth: usize,
    pub name: String,
}

impl ResolutionNode {
    pub fn new(depth: usize, name: impl Into<String>) -> Self {
        Self {
            depth,
            name: name.into(),
        }
    }
}

/// Order nodes for installation
///
/// Sorted by descending depth (stable), then only the first occurrence of
/// each name is kept, so every package lands at its deepest position.
pub fn order_nodes(mut nodes: Vec<ResolutionNode>) -> Vec<ResolutionNode> {
    nodes.sort_by(|a, b| b.depth.cmp(&a.depth));
    let mut seen = HashSet::new();
    nodes.retain(|n| seen.insert(n.name.clone()));
    nodes
}

/// Dependency resolver for one run
pub struct Resolver {
    client: Arc<RepositoryClient>,
    localdb: Arc<dyn LocalDatabase>,
    reporter: Arc<dyn Reporter>,
    /// Targets named by the operator, in order
    requested: Vec<String>,
    reorder: bool,
    check_deps: bool,
    include_make: bool,
    do_not_track: HashSet<String>,
    seen: HashSet<String>,
    in_progress: Vec<String>,
    lookups: HashMap<String, Option<RemotePackage>>,
    reorders: Vec<String>,
    last_report: Instant,
}

impl Resolver {
    pub fn new(
        client: Arc<RepositoryClient>,
        localdb: Arc<dyn LocalDatabase>,
        reporter: Arc<dyn Reporter>,
    ) -> Self {
        Self {
            client,
            localdb,
            reporter,
            requested: Vec::new(),
            reorder: true,
            check_deps: true,
            include_make: false,
            do_not_track: HashSet::new(),
            seen: HashSet::new(),
            in_progress: Vec::new(),
            lookups: HashMap::new(),
            reorders: Vec::new(),
            last_report: Instant::now(),
        }
    }

    /// Targets whose relative order the verification walk enforces
    pub fn with_requested(mut self, requested: Vec<String>) -> Self {
        self.requested = requested;
        self
    }

    pub fn reorder(mut self, enabled: bool) -> Self {
        self.reorder = enabled;
        self
    }

    /// Verify dependencies on every exact lookup
    pub fn check_deps(mut self, enabled: bool) -> Self {
        self.check_deps = enabled;
        self
    }

    /// Treat make dependencies like runtime dependencies
    pub fn include_make(mut self, enabled: bool) -> Self {
        self.include_make = enabled;
        self
    }

    /// Names that are never resolved, built or reported
    pub fn do_not_track(mut self, names: &[String]) -> Self {
        self.do_not_track = names.iter().cloned().collect();
        self
    }

    /// Replace the requested target list
    pub fn set_requested(&mut self, requested: Vec<String>) {
        self.requested = requested;
    }

    /// Dependencies that must move ahead of their dependents
    pub fn reorders(&self) -> &[String] {
        &self.reorders
    }

    pub fn is_tracked(&self, name: &str) -> bool {
        !self.do_not_track.contains(name)
    }

    /// Exact lookup, verifying dependencies of the match when enabled
    pub fn lookup(&mut self, name: &str) -> Result<Option<RemotePackage>> {
        let found = self.fetch(name)?;
        if let Some(pkg) = &found
            && self.check_deps
        {
            self.verify_dependencies(pkg)?;
        }
        Ok(found)
    }

    /// Exact lookup without verification, memoized for the run
    fn fetch(&mut self, name: &str) -> Result<Option<RemotePackage>> {
        if !self.is_tracked(name) {
            debug!("{} is not tracked", name);
            return Ok(None);
        }
        if let Some(found) = self.lookups.get(name) {
            return Ok(found.clone());
        }
        let found = self.client.search_exact(name)?;
        self.lookups.insert(name.to_string(), found.clone());
        Ok(found)
    }

    /// Check every dependency of `pkg`
    ///
    /// Runs at most once per package per run. Unmet dependencies are all
    /// reported before failing with [`Error::UnmetDependencies`].
    pub fn verify_dependencies(&mut self, pkg: &RemotePackage) -> Result<()> {
        if self.seen.contains(&pkg.name) {
            trace!("{} already verified", pkg.name);
            return Ok(());
        }
        let result = self.verify_each(pkg);
        self.seen.insert(pkg.name.clone());
        result
    }

    fn verify_each(&mut self, pkg: &RemotePackage) -> Result<()> {
        debug!("resolving deps of {}", pkg.name);
        let mut unmet = Vec::new();

        for raw in pkg.dependencies(self.include_make) {
            let dep = DependencySpec::parse(&raw);
            trace!("{} requires {}", pkg.name, dep);

            if dep.name == pkg.name {
                return Err(Error::DependencyCycle(vec![pkg.name.clone(), dep.name]));
            }
            if self.requested.contains(&dep.name) {
                self.check_order(&dep.name, &pkg.name)?;
                continue;
            }
            if self.seen.contains(&dep.name) {
                debug!("{} known", dep.name);
                continue;
            }
            if !self.is_tracked(&dep.name) || self.localdb.is_repository_package(&dep.name)? {
                continue;
            }
            if self.installed_satisfies(&dep)? {
                debug!("{} installed", dep.name);
                continue;
            }
            if self.fetch(&dep.name)?.is_none() {
                debug!("{} is not an AUR package", dep.name);
                continue;
            }

            self.reporter.error(&format!(
                "unmet AUR dependency: {}{}",
                dep.name,
                dep.constraint_suffix()
            ));
            unmet.push(dep.to_string());
        }

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(Error::UnmetDependencies(unmet))
        }
    }

    /// A requested dependency placed after its dependent
    fn check_order(&mut self, dependency: &str, dependent: &str) -> Result<()> {
        let position = |name: &str| self.requested.iter().position(|r| r == name);
        let (Some(dep_pos), Some(root_pos)) = (position(dependency), position(dependent)) else {
            return Ok(());
        };
        if dep_pos <= root_pos {
            return Ok(());
        }

        if self.reorder {
            self.reporter
                .output(&format!("switching {} and {}", dependency, dependent));
            if !self.reorders.iter().any(|r| r == dependency) {
                self.reorders.push(dependency.to_string());
            }
            Ok(())
        } else {
            self.reporter.error("verify order of target/deps");
            Err(Error::OrderingViolation {
                dependency: dependency.to_string(),
                dependent: dependent.to_string(),
            })
        }
    }

    /// Installed and at a version meeting the constraint
    pub fn installed_satisfies(&self, dep: &DependencySpec) -> Result<bool> {
        Ok(self
            .localdb
            .installed_version(&dep.name)?
            .is_some_and(|installed| dep.satisfied_by(&installed)))
    }

    /// Ordered install list for `root` and everything it needs
    ///
    /// Dependencies already satisfied locally and names that are not AUR
    /// packages are left out. The root is always last.
    pub fn resolve_chain(&mut self, root: &str) -> Result<Vec<ResolutionNode>> {
        debug!("resolving {}", root);
        let pkg = self
            .fetch(root)?
            .ok_or_else(|| Error::NotFoundError(format!("unable to find package: {}", root)))?;

        self.last_report = Instant::now();
        let mut nodes = Vec::new();
        let mut depths = HashMap::new();

        self.enter(&pkg.name)?;
        let result = self.descend(1, &pkg, &mut depths, &mut nodes);
        self.in_progress.pop();
        result?;

        nodes.push(ResolutionNode::new(0, root));
        let ordered = order_nodes(nodes);
        trace!("chain for {}: {:?}", root, ordered);
        Ok(ordered)
    }

    fn descend(
        &mut self,
        depth: usize,
        pkg: &RemotePackage,
        depths: &mut HashMap<String, usize>,
        nodes: &mut Vec<ResolutionNode>,
    ) -> Result<()> {
        self.progress();

        for raw in pkg.dependencies(self.include_make) {
            let dep = DependencySpec::parse(&raw);
            if self.in_progress.contains(&dep.name) {
                return Err(self.cycle_error(&dep.name));
            }
            if depths.get(&dep.name).is_some_and(|&d| d >= depth) {
                continue;
            }
            debug!("resolving dependencies level {}, {}", depth, dep.name);
            if self.installed_satisfies(&dep)? {
                continue;
            }
            let Some(child) = self.fetch(&dep.name)? else {
                debug!("non-aur {}", dep.name);
                continue;
            };

            self.enter(&child.name)?;
            let result = self.descend(depth + 1, &child, depths, nodes);
            self.in_progress.pop();
            result?;

            depths.insert(dep.name.clone(), depth);
            nodes.push(ResolutionNode::new(depth, dep.name));
        }
        Ok(())
    }

    /// Upgrade order for installed AUR packages
    ///
    /// Each package is preceded by those of its installed dependencies that
    /// are themselves in `packages`; the first occurrence of a name wins.
    pub fn order_installed(&self, packages: &[InstalledPackage]) -> Result<Vec<String>> {
        let names: HashSet<&str> = packages.iter().map(|p| p.name.as_str()).collect();
        let mut ordered = Vec::new();
        let mut emitted = HashSet::new();

        for pkg in packages {
            if !self.is_tracked(&pkg.name) {
                continue;
            }
            for raw in self.localdb.installed_depends(&pkg.name)? {
                let dep = DependencySpec::parse(&raw);
                if names.contains(dep.name.as_str())
                    && self.is_tracked(&dep.name)
                    && emitted.insert(dep.name.clone())
                {
                    ordered.push(dep.name);
                }
            }
            if emitted.insert(pkg.name.clone()) {
                ordered.push(pkg.name.clone());
            }
        }
        Ok(ordered)
    }

    fn enter(&mut self, name: &str) -> Result<()> {
        if self.in_progress.iter().any(|n| n == name) {
            return Err(self.cycle_error(name));
        }
        self.in_progress.push(name.to_string());
        Ok(())
    }

    fn cycle_error(&self, name: &str) -> Error {
        let start = self
            .in_progress
            .iter()
            .position(|n| n == name)
            .unwrap_or(0);
        let mut path: Vec<String> = self.in_progress[start..].to_vec();
        path.push(name.to_string());
        debug!("cycle: {:?}", path);
        Error::DependencyCycle(path)
    }

    fn progress(&mut self) {
        if self.last_report.elapsed() > PROGRESS_INTERVAL {
            self.reporter.output("still working...");
            self.last_report = Instant::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aur::{StaticTransport, info_url};
    use crate::localdb::MemoryDatabase;
    use crate::report::MemoryReporter;

    const BASE: &str = "https://aur.example.org";

    fn info(name: &str, depends: &[&str]) -> String {
        serde_json::json!({
            "results": [{
                "Name": name,
                "Version": "1.0-1",
                "PackageBase": name,
                "URLPath": format!("/cgit/aur.git/snapshot/{name}.tar.gz"),
                "Depends": depends,
            }]
        })
        .to_string()
    }

    fn empty() -> String {
        r#"{"results":[]}"#.to_string()
    }

    struct Fixture {
        transport: StaticTransport,
        db: MemoryDatabase,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                transport: StaticTransport::new(),
                db: MemoryDatabase::new(),
            }
        }

        fn aur(mut self, name: &str, depends: &[&str]) -> Self {
            self.transport = self.transport.with_route(info_url(BASE, name), info(name, depends));
            self
        }

        fn missing(mut self, name: &str) -> Self {
            self.transport = self.transport.with_route(info_url(BASE, name), empty());
            self
        }

        fn build(self) -> (Resolver, Arc<MemoryReporter>) {
            let reporter = Arc::new(MemoryReporter::new());
            let db: Arc<dyn LocalDatabase> = Arc::new(self.db);
            let client = Arc::new(RepositoryClient::new(
                Arc::new(self.transport),
                db.clone(),
                reporter.clone(),
                BASE,
            ));
            (Resolver::new(client, db, reporter.clone()), reporter)
        }
    }

    fn names(nodes: &[ResolutionNode]) -> Vec<&str> {
        nodes.iter().map(|n| n.name.as_str()).collect()
    }

    #[test]
    fn test_order_nodes_deepest_wins() {
        let nodes = vec![
            ResolutionNode::new(1, "q"),
            ResolutionNode::new(2, "s"),
            ResolutionNode::new(0, "p"),
            ResolutionNode::new(1, "s"),
        ];
        let ordered = order_nodes(nodes);
        assert_eq!(names(&ordered), vec!["s", "q", "p"]);
        assert_eq!(ordered[0].depth, 2);
    }

    #[test]
    fn test_chain_simple() {
        let (mut resolver, _) = Fixture::new().aur("p", &["q"]).aur("q", &[]).build();
        let chain = resolver.resolve_chain("p").unwrap();
        assert_eq!(names(&chain), vec!["q", "p"]);
    }

    #[test]
    fn test_chain_diamond() {
        let (mut resolver, _) = Fixture::new()
            .aur("p", &["q", "r"])
            .aur("q", &["s"])
            .aur("r", &["s>=1.0"])
            .aur("s", &[])
            .build();
        let chain = resolver.resolve_chain("p").unwrap();
        let order = names(&chain);
        assert_eq!(order.iter().filter(|n| **n == "s").count(), 1);
        assert_eq!(order[0], "s");
        assert_eq!(*order.last().unwrap(), "p");
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_chain_skips_installed_and_repo_packages() {
        let mut fixture = Fixture::new()
            .aur("p", &["q", "glibc", "r>=2"])
            .aur("q", &[])
            .aur("r", &[]);
        fixture.db = MemoryDatabase::new()
            .with_repository("glibc")
            .with_installed("q", "1.0-1", &[])
            .with_installed("r", "1.0-1", &[]);
        let (mut resolver, _) = fixture.build();

        let chain = resolver.resolve_chain("p").unwrap();
        assert_eq!(names(&chain), vec!["r", "p"]);
    }

    #[test]
    fn test_chain_non_aur_dependency_ignored() {
        let (mut resolver, _) = Fixture::new().aur("p", &["libfoo"]).missing("libfoo").build();
        let chain = resolver.resolve_chain("p").unwrap();
        assert_eq!(names(&chain), vec!["p"]);
    }

    #[test]
    fn test_chain_cycle_is_fatal() {
        let (mut resolver, _) = Fixture::new().aur("a", &["b"]).aur("b", &["a"]).build();
        match resolver.resolve_chain("a") {
            Err(Error::DependencyCycle(path)) => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_self_dependency_is_cycle() {
        let (resolver, _) = Fixture::new().aur("foo", &["foo>=1"]).build();
        let mut resolver = resolver.with_requested_names(&["foo"]);

        match resolver.lookup("foo") {
            Err(Error::DependencyCycle(path)) => assert_eq!(path, vec!["foo", "foo"]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_mutual_requested_dependencies_are_ordering_only() {
        let (resolver, _) = Fixture::new().aur("a", &["b"]).aur("b", &["a"]).build();
        let mut resolver = resolver.with_requested_names(&["a", "b"]);

        assert!(resolver.lookup("a").unwrap().is_some());
        assert!(resolver.lookup("b").unwrap().is_some());
        assert_eq!(resolver.reorders(), ["b".to_string()]);
    }

    #[test]
    fn test_chain_unknown_root() {
        let (mut resolver, _) = Fixture::new().missing("nope").build();
        assert!(matches!(
            resolver.resolve_chain("nope"),
            Err(Error::NotFoundError(_))
        ));
    }

    #[test]
    fn test_verify_unmet_dependencies_aggregated() {
        let (resolver, reporter) = Fixture::new()
            .aur("foo", &["bar>=2", "baz", "zlib"])
            .aur("bar", &[])
            .aur("baz", &[])
            .missing("zlib")
            .build();
        let mut resolver = resolver.with_requested_names(&["foo"]);

        match resolver.lookup("foo") {
            Err(Error::UnmetDependencies(unmet)) => assert_eq!(unmet, vec!["bar>=2", "baz"]),
            other => panic!("expected unmet, got {:?}", other),
        }
        assert_eq!(
            reporter.errors(),
            vec!["unmet AUR dependency: bar (>=2)", "unmet AUR dependency: baz"]
        );
    }

    #[test]
    fn test_verify_reorders_requested_dependency() {
        let (resolver, reporter) = Fixture::new().aur("foo", &["bar"]).aur("bar", &[]).build();
        let mut resolver = resolver.with_requested_names(&["foo", "bar"]);

        assert!(resolver.lookup("foo").unwrap().is_some());
        assert!(resolver.lookup("bar").unwrap().is_some());
        assert_eq!(resolver.reorders(), ["bar".to_string()]);
        assert_eq!(reporter.outputs(), vec!["switching bar and foo"]);
    }

    #[test]
    fn test_verify_ordering_violation_without_reorder() {
        let (resolver, _) = Fixture::new().aur("foo", &["bar"]).aur("bar", &[]).build();
        let mut resolver = resolver.with_requested_names(&["foo", "bar"]).reorder(false);

        match resolver.lookup("foo") {
            Err(Error::OrderingViolation {
                dependency,
                dependent,
            }) => {
                assert_eq!(dependency, "bar");
                assert_eq!(dependent, "foo");
            }
            other => panic!("expected ordering violation, got {:?}", other),
        }
    }

    #[test]
    fn test_verify_correct_order_is_silent() {
        let (resolver, reporter) = Fixture::new().aur("foo", &["bar"]).aur("bar", &[]).build();
        let mut resolver = resolver.with_requested_names(&["bar", "foo"]).reorder(false);
        assert!(resolver.lookup("foo").unwrap().is_some());
        assert!(resolver.reorders().is_empty());
        assert!(reporter.outputs().is_empty());
    }

    #[test]
    fn test_verify_installed_satisfies() {
        let mut fixture = Fixture::new().aur("foo", &["bar>=1.0"]).aur("bar", &[]);
        fixture.db = MemoryDatabase::new().with_installed("bar", "1.2-1", &[]);
        let (mut resolver, _) = fixture.build();
        assert!(resolver.lookup("foo").unwrap().is_some());
    }

    #[test]
    fn test_verify_outdated_install_is_unmet() {
        let mut fixture = Fixture::new().aur("foo", &["bar>=2.0"]).aur("bar", &[]);
        fixture.db = MemoryDatabase::new().with_installed("bar", "1.2-1", &[]);
        let (mut resolver, _) = fixture.build();
        assert!(matches!(
            resolver.lookup("foo"),
            Err(Error::UnmetDependencies(_))
        ));
    }

    #[test]
    fn test_do_not_track_is_never_looked_up() {
        let (resolver, _) = Fixture::new().aur("foo", &["bar"]).build();
        let mut resolver = resolver.do_not_track(&["bar".to_string()]);
        assert!(resolver.lookup("foo").unwrap().is_some());
        assert_eq!(names(&resolver.resolve_chain("foo").unwrap()), vec!["foo"]);
    }

    #[test]
    fn test_order_installed_dependencies_first() {
        let mut fixture = Fixture::new();
        fixture.db = MemoryDatabase::new()
            .with_installed("app", "1-1", &["lib>=1", "glibc"])
            .with_installed("lib", "1-1", &[])
            .with_installed("glibc", "2.39-1", &[])
            .with_repository("glibc");
        let (resolver, _) = fixture.build();

        let installed = vec![InstalledPackage::new("app", "1-1"), InstalledPackage::new("lib", "1-1")];
        assert_eq!(resolver.order_installed(&installed).unwrap(), vec!["lib", "app"]);
    }

    impl Resolver {
        fn with_requested_names(self, names: &[&str]) -> Self {
            self.with_requested(names.iter().map(|s| s.to_string()).collect())
        }
    }
}
