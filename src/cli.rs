// src/cli.rs
//! CLI definitions for auric
//!
//! Flags follow pacman: one top-level operation (`-S`, `-R`, `-Q`) with
//! optional sub-operations. clap only parses; [`Cli::operation`] enforces
//! the combinations. The command implementations live in `commands`.

use auric::config::{DownloadMethod, SearchField, SplitPolicy};
use auric::{Error, Result};
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "auric")]
#[command(author = "Auric Contributors")]
#[command(version)]
#[command(about = "Resolve, build and install AUR packages", long_about = None)]
pub struct Cli {
    /// Synchronize packages (install; with -u upgrade, -s search, -c clean, -d deps)
    #[arg(short = 'S', long)]
    pub sync: bool,

    /// Remove installed AUR packages
    #[arg(short = 'R', long)]
    pub remove: bool,

    /// List installed AUR packages
    #[arg(short = 'Q', long)]
    pub query: bool,

    /// Upgrade installed AUR packages (all, or the targets given)
    #[arg(short = 'u', long = "upgrades")]
    pub upgrades: bool,

    /// Search the AUR
    #[arg(short = 's', long)]
    pub search: bool,

    /// Clear cache files and build directories
    #[arg(short = 'c', long)]
    pub clean: bool,

    /// Install each target together with its full dependency chain
    #[arg(short = 'd', long)]
    pub deps: bool,

    /// With -Q: only packages no longer in the AUR
    #[arg(short = 'g', long)]
    pub gone: bool,

    /// Refresh tier: -y skips VCS packages, -yy forces and checks VCS
    /// versions, -yyy forces without VCS checks
    #[arg(short = 'y', long = "refresh", action = ArgAction::Count)]
    pub refresh: u8,

    /// With -s: print every field (-ii: exact name lookup)
    #[arg(short = 'i', long, action = ArgAction::Count)]
    pub info: u8,

    /// Print less
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Fetch recipes into --fetch-dir instead of building them
    #[arg(short = 'f', long)]
    pub fetch: bool,

    /// Where --fetch leaves recipes
    #[arg(long, value_name = "DIR")]
    pub fetch_dir: Option<PathBuf>,

    /// Do not ask for confirmation
    #[arg(long)]
    pub no_confirm: bool,

    /// Debug logging
    #[arg(long)]
    pub verbose: bool,

    /// Trace logging
    #[arg(long)]
    pub trace: bool,

    /// Extra configuration file, applied last
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Ignore every configuration file
    #[arg(long)]
    pub no_config: bool,

    /// pacman configuration file (for CacheDir)
    #[arg(long, value_name = "FILE")]
    pub pacman: Option<PathBuf>,

    /// auric cache directory
    #[arg(long, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Parent directory for build directories
    #[arg(long, value_name = "DIR")]
    pub builds: Option<PathBuf>,

    /// Recipe retrieval: detect, git or tar
    #[arg(long, value_name = "METHOD")]
    pub download: Option<DownloadMethod>,

    /// Split package policy: nothing, skip, error or split
    #[arg(long, value_name = "POLICY")]
    pub on_split: Option<SplitPolicy>,

    /// Never upgrade these packages (unless forced)
    #[arg(long, value_name = "NAME")]
    pub ignore: Vec<String>,

    /// Ignore a package for a number of hours (name=hours)
    #[arg(long, value_name = "NAME=HOURS")]
    pub ignore_for: Vec<String>,

    /// Hours between VCS package updates
    #[arg(long, value_name = "HOURS")]
    pub vcs_ignore: Option<u64>,

    /// Skip VCS packages
    #[arg(long)]
    pub no_vcs: bool,

    /// Do not copy built packages into the package caches
    #[arg(long)]
    pub no_cache: bool,

    /// Skip dependency checks
    #[arg(long)]
    pub skip_deps: bool,

    /// Fail instead of moving requested dependencies ahead of dependents
    #[arg(long)]
    pub no_reorder_deps: bool,

    /// Minutes an RPC response stays cached (0 disables)
    #[arg(long, value_name = "MINUTES")]
    pub rpc_cache: Option<u64>,

    /// Search field: name-desc, name or maintainer
    #[arg(long, value_name = "FIELD")]
    pub rpc_field: Option<SearchField>,

    /// Under -yy, install VCS packages without checking their version
    #[arg(long)]
    pub vcs_install_only: bool,

    /// Packages auric never touches
    #[arg(long, value_name = "NAME")]
    pub do_not_track: Vec<String>,

    /// Include make dependencies
    #[arg(long)]
    pub makedeps: bool,

    /// Call pacman without sudo
    #[arg(long)]
    pub no_sudo: bool,

    /// Package names
    pub targets: Vec<String>,
}

/// The operation a command line asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Install,
    Upgrade,
    Deps,
    Search,
    Clean,
    Remove,
    Query,
    Gone,
}

impl Operation {
    /// Does this operation run makepkg?
    pub fn builds(&self) -> bool {
        matches!(self, Self::Install | Self::Upgrade | Self::Deps)
    }
}

impl Cli {
    /// Validate flag combinations
    pub fn operation(&self) -> Result<Operation> {
        let top_level = [self.sync, self.remove, self.query]
            .iter()
            .filter(|&&set| set)
            .count();

        let sub_ops = [self.upgrades, self.search, self.clean, self.deps]
            .iter()
            .filter(|&&set| set)
            .count();
        if self.sync && sub_ops > 1 {
            return Err(invalid("cannot perform multiple sub-options"));
        }

        match top_level {
            0 => return Err(invalid("no valid top-level arguments given")),
            1 => {}
            _ => return Err(invalid("multiple top-level arguments given")),
        }

        if (self.search || self.upgrades || self.clean || self.deps) && !self.sync {
            return Err(invalid("search, upgrade, deps and clean are sync only"));
        }
        if self.info > 0 && !self.search {
            return Err(invalid("info only works with search"));
        }
        if self.info > 0 && self.quiet {
            return Err(invalid("info and quiet do not work together"));
        }
        if self.gone && !self.query {
            return Err(invalid("gone only works with query"));
        }
        if self.refresh > 3 {
            return Err(invalid("at most three refresh levels (-yyy)"));
        }

        let op = if self.remove {
            Operation::Remove
        } else if self.query {
            if self.gone {
                Operation::Gone
            } else {
                Operation::Query
            }
        } else if self.upgrades {
            Operation::Upgrade
        } else if self.search {
            Operation::Search
        } else if self.clean {
            Operation::Clean
        } else if self.deps {
            Operation::Deps
        } else {
            Operation::Install
        };

        let needs_targets = matches!(
            op,
            Operation::Install | Operation::Deps | Operation::Search | Operation::Remove
        );
        if needs_targets && self.targets.is_empty() {
            return Err(invalid("no targets specified"));
        }

        Ok(op)
    }
}

fn invalid(message: &str) -> Error {
    Error::UserInputError(message.to_string())
}
