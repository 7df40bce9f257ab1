// src/commands/mod.rs
//! Command handlers for the auric CLI

mod clean;
mod install;
mod query;
mod remove;

pub use clean::cmd_clean;
pub use install::{cmd_deps, cmd_install, cmd_upgrade};
pub use query::{cmd_query, cmd_search};
pub use remove::cmd_remove;

use crate::cli::{Cli, Operation};
use anyhow::{Context, Result};
use auric::aur::HttpTransport;
use auric::build::{BuildPipeline, FetchMethod, Fetcher, running_as_root};
use auric::localdb::{Installer, LocalDatabase, PacmanDatabase, PacmanInstaller, parse_cache_dirs};
use auric::{CacheManager, CancelToken, Config, ConsoleReporter, Reporter, RepositoryClient};
use auric::{SyncOptions, SyncOrchestrator};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

/// Load the configuration files and apply command-line overrides
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if cli.no_config {
        debug!("not loading config");
        Config::default()
    } else {
        let required: Vec<PathBuf> = cli.config.iter().cloned().collect();
        Config::load_layered(&required, &Config::default_locations())?
    };

    if let Some(dir) = &cli.cache_dir {
        config.paths.cache_dir = dir.clone();
    }
    if let Some(conf) = &cli.pacman {
        config.paths.pacman_conf = conf.clone();
    }
    if let Some(dir) = &cli.builds {
        config.build.builds_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.fetch_dir {
        config.build.fetch_dir = dir.clone();
    }
    if let Some(method) = cli.download {
        config.build.download = method;
    }
    if let Some(policy) = cli.on_split {
        config.build.on_split = policy;
    }
    if let Some(hours) = cli.vcs_ignore {
        config.sync.vcs_ignore_hours = hours;
    }
    if let Some(minutes) = cli.rpc_cache {
        config.sync.rpc_cache_minutes = minutes;
    }

    let sync = &mut config.sync;
    sync.ignore.extend(cli.ignore.iter().cloned());
    sync.ignore_for.extend(cli.ignore_for.iter().cloned());
    sync.do_not_track.extend(cli.do_not_track.iter().cloned());
    sync.no_vcs |= cli.no_vcs;
    sync.no_cache |= cli.no_cache;
    sync.skip_deps |= cli.skip_deps;
    sync.vcs_install_only |= cli.vcs_install_only;
    sync.makedeps |= cli.makedeps;
    if cli.no_reorder_deps {
        sync.reorder_deps = false;
    }
    config.pacman.no_sudo |= cli.no_sudo;

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Run-wide sync settings for this command line
pub fn sync_options(cli: &Cli, config: &Config) -> SyncOptions {
    let mut options = SyncOptions::from_config(config);
    options.refresh = cli.refresh;
    options.quiet = cli.quiet;
    options.info = cli.info;
    if let Some(field) = cli.rpc_field {
        options.search_field = field;
    }
    if cli.fetch {
        options.fetch_dir = Some(config.build.fetch_dir.clone());
    }
    options
}

/// Everything one invocation needs, wired together
pub struct Session {
    pub cache: Arc<CacheManager>,
    pub sync: SyncOrchestrator,
}

impl Session {
    pub fn open(cli: &Cli, op: Operation, config: &Config, cancel: CancelToken) -> Result<Self> {
        let interactive = !cli.no_confirm && ConsoleReporter::stdin_is_terminal();
        if !cli.no_confirm && !interactive {
            debug!("stdin is not a terminal, taking default answers");
        }
        let reporter: Arc<dyn Reporter> =
            Arc::new(ConsoleReporter::new(interactive).quiet(cli.quiet));

        let cache = Arc::new(CacheManager::new(&config.paths.cache_dir, reporter.clone()));
        cache.ensure_dir()?;

        let localdb: Arc<dyn LocalDatabase> = Arc::new(PacmanDatabase::new());
        let transport = Arc::new(HttpTransport::new(config.rpc.timeout())?);
        let mut client = RepositoryClient::new(
            transport,
            localdb.clone(),
            reporter.clone(),
            config.rpc.base_url.clone(),
        );
        if cli.refresh < 2 {
            client = client.with_rpc_cache(cache.clone(), config.sync.rpc_cache_ttl());
        }
        let client = Arc::new(client);

        let installer: Arc<dyn Installer> =
            Arc::new(PacmanInstaller::new(config.pacman.no_sudo, cancel.clone()));

        let fetcher = Fetcher::new(
            client.clone(),
            FetchMethod::resolve(config.build.download),
            config.build.git_timeout(),
            cancel.clone(),
        );
        let cache_dirs = if op.builds() && !config.sync.no_cache {
            package_cache_dirs(config, &cache)?
        } else {
            Vec::new()
        };
        let pipeline = BuildPipeline::new(fetcher, installer.clone(), reporter.clone(), cancel)
            .makepkg(config.build.makepkg.clone(), config.build.makepkg_args.clone())
            .split_policy(config.build.on_split)
            .cache_dirs(&cache_dirs)
            .builds_dir(config.build.builds_dir.clone())
            .build_timeout(config.build.build_timeout());

        let sync = SyncOrchestrator::new(
            client,
            localdb,
            installer,
            Arc::new(pipeline),
            cache.clone(),
            reporter,
        )
        .with_options(sync_options(cli, config));

        Ok(Self { cache, sync })
    }
}

/// pacman's cache directories plus auric's own `pkg/`
fn package_cache_dirs(config: &Config, cache: &CacheManager) -> Result<Vec<PathBuf>> {
    let mut dirs = match &config.pacman.cache_dirs {
        Some(dirs) => dirs.clone(),
        None => match fs::read_to_string(&config.paths.pacman_conf) {
            Ok(conf) => parse_cache_dirs(&conf),
            Err(e) => {
                warn!(
                    "unable to read {}: {}",
                    config.paths.pacman_conf.display(),
                    e
                );
                parse_cache_dirs("")
            }
        },
    };
    dirs.push(cache.pkg_dir()?);
    Ok(dirs)
}

/// Run the requested operation
///
/// Returns false when the operation finished but some packages failed.
pub fn dispatch(op: Operation, session: &Session, targets: &[String]) -> Result<bool> {
    if op.builds() && running_as_root() {
        anyhow::bail!(auric::Error::UserInputError(
            "can not run install/upgrades as root (uses makepkg)".to_string()
        ));
    }

    match op {
        Operation::Install => cmd_install(session, targets),
        Operation::Upgrade => cmd_upgrade(session, targets),
        Operation::Deps => cmd_deps(session, targets),
        Operation::Remove => cmd_remove(session, targets).map(|()| true),
        Operation::Query => cmd_query(session, targets, false).map(|()| true),
        Operation::Gone => cmd_query(session, targets, true).map(|()| true),
        Operation::Search => cmd_search(session, targets).map(|()| true),
        Operation::Clean => cmd_clean(session).map(|()| true),
    }
}
