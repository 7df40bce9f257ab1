// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

fn flag(id: &'static str, short: Option<char>, help: &'static str) -> Arg {
    let arg = Arg::new(id)
        .long(id)
        .action(ArgAction::SetTrue)
        .help(help);
    match short {
        Some(c) => arg.short(c),
        None => arg,
    }
}

fn value(id: &'static str, name: &'static str, help: &'static str) -> Arg {
    Arg::new(id).long(id).value_name(name).help(help)
}

fn build_cli() -> Command {
    Command::new("auric")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Auric Contributors")
        .about("Resolve, build and install AUR packages")
        .arg(flag("sync", Some('S'), "Synchronize packages (install; with -u upgrade, -s search, -c clean, -d deps)"))
        .arg(flag("remove", Some('R'), "Remove installed AUR packages"))
        .arg(flag("query", Some('Q'), "List installed AUR packages"))
        .arg(flag("upgrades", Some('u'), "Upgrade installed AUR packages (all, or the targets given)"))
        .arg(flag("search", Some('s'), "Search the AUR"))
        .arg(flag("clean", Some('c'), "Clear cache files and build directories"))
        .arg(flag("deps", Some('d'), "Install each target together with its full dependency chain"))
        .arg(flag("gone", Some('g'), "With -Q: only packages no longer in the AUR"))
        .arg(
            Arg::new("refresh")
                .short('y')
                .long("refresh")
                .action(ArgAction::Count)
                .help("Refresh tier: -y skips VCS packages, -yy forces and checks VCS versions, -yyy forces without VCS checks"),
        )
        .arg(
            Arg::new("info")
                .short('i')
                .long("info")
                .action(ArgAction::Count)
                .help("With -s: print every field (-ii: exact name lookup)"),
        )
        .arg(flag("quiet", Some('q'), "Print less"))
        .arg(flag("fetch", Some('f'), "Fetch recipes into --fetch-dir instead of building them"))
        .arg(value("fetch-dir", "DIR", "Where --fetch leaves recipes"))
        .arg(flag("no-confirm", None, "Do not ask for confirmation"))
        .arg(flag("verbose", None, "Debug logging"))
        .arg(flag("trace", None, "Trace logging"))
        .arg(value("config", "FILE", "Extra configuration file, applied last"))
        .arg(flag("no-config", None, "Ignore every configuration file"))
        .arg(value("pacman", "FILE", "pacman configuration file (for CacheDir)"))
        .arg(value("cache-dir", "DIR", "auric cache directory"))
        .arg(value("builds", "DIR", "Parent directory for build directories"))
        .arg(value("download", "METHOD", "Recipe retrieval: detect, git or tar"))
        .arg(value("on-split", "POLICY", "Split package policy: nothing, skip, error or split"))
        .arg(value("ignore", "NAME", "Never upgrade these packages (unless forced)").action(ArgAction::Append))
        .arg(value("ignore-for", "NAME=HOURS", "Ignore a package for a number of hours").action(ArgAction::Append))
        .arg(value("vcs-ignore", "HOURS", "Hours between VCS package updates"))
        .arg(flag("no-vcs", None, "Skip VCS packages"))
        .arg(flag("no-cache", None, "Do not copy built packages into the package caches"))
        .arg(flag("skip-deps", None, "Skip dependency checks"))
        .arg(flag("no-reorder-deps", None, "Fail instead of moving requested dependencies ahead of dependents"))
        .arg(value("rpc-cache", "MINUTES", "Minutes an RPC response stays cached (0 disables)"))
        .arg(value("rpc-field", "FIELD", "Search field: name-desc, name or maintainer"))
        .arg(flag("vcs-install-only", None, "Under -yy, install VCS packages without checking their version"))
        .arg(value("do-not-track", "NAME", "Packages auric never touches").action(ArgAction::Append))
        .arg(flag("makedeps", None, "Include make dependencies"))
        .arg(flag("no-sudo", None, "Call pacman without sudo"))
        .arg(Arg::new("targets").num_args(0..).help("Package names"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("auric.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
