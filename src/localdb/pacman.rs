// src/localdb/pacman.rs

//! pacman-backed database queries and installer
//!
//! Queries run `pacman` with fixed arguments and parse its plain output, so
//! nothing here links against libalpm.

use super::{InstalledPackage, Installer, LocalDatabase};
use crate::build::{CommandSpec, running_as_root};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Default package cache when pacman.conf sets none
const DEFAULT_CACHE_DIR: &str = "/var/cache/pacman/pkg/";

/// Database view backed by the `pacman` command
#[derive(Default)]
pub struct PacmanDatabase {
    /// Sync repository names, queried once per run
    repository: OnceLock<HashSet<String>>,
}

impl PacmanDatabase {
    pub fn new() -> Self {
        Self::default()
    }
}

fn run_pacman(args: &[&str]) -> Result<String> {
    let output = Command::new("pacman")
        .args(args)
        .output()
        .map_err(|e| Error::InitError(format!("Failed to run pacman: {}. Is pacman installed?", e)))?;

    if !output.status.success() {
        return Err(Error::InitError(format!(
            "pacman {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `pacman -Q` output ("name version" per line)
fn parse_query_lines(text: &str) -> Vec<InstalledPackage> {
    text.lines()
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            match (parts.next(), parts.next()) {
                (Some(name), Some(version)) => Some(InstalledPackage::new(name, version)),
                _ => None,
            }
        })
        .collect()
}

/// Pull the "Depends On" field out of `pacman -Qi` output
fn parse_depends_field(text: &str) -> Vec<String> {
    let mut depends = Vec::new();
    let mut in_field = false;

    for line in text.lines() {
        if let Some((key, value)) = line.split_once(':')
            && !line.starts_with(' ')
        {
            in_field = key.trim() == "Depends On";
            if in_field {
                depends.extend(value.split_whitespace().map(String::from));
            }
            continue;
        }
        // wrapped continuation of the previous field
        if in_field {
            depends.extend(line.split_whitespace().map(String::from));
        }
    }

    depends.retain(|d| d != "None");
    depends
}

impl LocalDatabase for PacmanDatabase {
    fn installed_version(&self, name: &str) -> Result<Option<String>> {
        let output = Command::new("pacman")
            .args(["-Q", name])
            .output()
            .map_err(|e| Error::InitError(format!("Failed to run pacman: {}", e)))?;

        if !output.status.success() {
            return Ok(None);
        }

        Ok(parse_query_lines(&String::from_utf8_lossy(&output.stdout))
            .into_iter()
            .find(|p| p.name == name)
            .map(|p| p.version))
    }

    fn list_installed(&self) -> Result<Vec<InstalledPackage>> {
        debug!("Querying installed pacman packages");
        let packages = parse_query_lines(&run_pacman(&["-Q"])?);
        debug!("Found {} installed packages", packages.len());
        Ok(packages)
    }

    fn repository_packages(&self) -> Result<HashSet<String>> {
        if let Some(names) = self.repository.get() {
            return Ok(names.clone());
        }

        let names: HashSet<String> = run_pacman(&["-Slq"])?
            .lines()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        debug!("{} packages available from sync repositories", names.len());

        Ok(self.repository.get_or_init(|| names).clone())
    }

    fn installed_depends(&self, name: &str) -> Result<Vec<String>> {
        let output = Command::new("pacman")
            .args(["-Qi", name])
            .output()
            .map_err(|e| Error::InitError(format!("Failed to run pacman: {}", e)))?;

        if !output.status.success() {
            return Err(Error::NotFoundError(format!(
                "Package '{}' not found in pacman database",
                name
            )));
        }

        Ok(parse_depends_field(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Read `CacheDir` entries from a pacman.conf
///
/// Missing or unreadable configuration falls back to pacman's default cache.
pub fn parse_cache_dirs(conf: &str) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    let mut in_options = false;

    for line in conf.lines() {
        let line = line.split('#').next().unwrap_or("").trim();
        if line.starts_with('[') && line.ends_with(']') {
            in_options = line == "[options]";
            continue;
        }
        if !in_options {
            continue;
        }
        if let Some((key, value)) = line.split_once('=')
            && key.trim() == "CacheDir"
        {
            dirs.extend(value.split_whitespace().map(PathBuf::from));
        }
    }

    if dirs.is_empty() {
        dirs.push(PathBuf::from(DEFAULT_CACHE_DIR));
    }
    dirs
}

/// Installer running `pacman` (through sudo unless disabled or already root)
pub struct PacmanInstaller {
    use_sudo: bool,
    cancel: CancelToken,
}

impl PacmanInstaller {
    pub fn new(no_sudo: bool, cancel: CancelToken) -> Self {
        Self {
            use_sudo: !no_sudo && !running_as_root(),
            cancel,
        }
    }

    fn privileged(&self, program: &str) -> CommandSpec {
        if self.use_sudo {
            CommandSpec::new("sudo").arg(program)
        } else {
            CommandSpec::new(program)
        }
    }

    fn run(&self, spec: CommandSpec, what: &str) -> Result<()> {
        let output = spec.run(None, &self.cancel)?;
        if output.success() {
            Ok(())
        } else {
            Err(Error::IoError(format!(
                "{} failed (exit code {})",
                what,
                output.code()
            )))
        }
    }
}

impl Installer for PacmanInstaller {
    fn install_files(&self, files: &[PathBuf]) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let spec = self.privileged("pacman").arg("-U").args(files);
        self.run(spec, "pacman -U")
    }

    fn remove(&self, names: &[String], extra_args: &[String]) -> Result<()> {
        let spec = self
            .privileged("pacman")
            .arg("-R")
            .args(extra_args)
            .args(names);
        self.run(spec, "pacman -R")
    }

    fn cache_files(&self, files: &[PathBuf], dir: &Path) -> Result<()> {
        let mut denied = Vec::new();
        for file in files {
            let Some(file_name) = file.file_name() else {
                continue;
            };
            match fs::copy(file, dir.join(file_name)) {
                Ok(_) => {}
                Err(e) if e.kind() == io::ErrorKind::PermissionDenied => denied.push(file.clone()),
                Err(e) => {
                    return Err(Error::IoError(format!(
                        "Failed to copy {} into {}: {}",
                        file.display(),
                        dir.display(),
                        e
                    )));
                }
            }
        }

        if denied.is_empty() {
            return Ok(());
        }
        if !self.use_sudo {
            warn!("no permission to write {}", dir.display());
            return Err(Error::IoError(format!(
                "permission denied writing {}",
                dir.display()
            )));
        }

        let spec = self
            .privileged("cp")
            .arg("--")
            .args(&denied)
            .arg(dir);
        self.run(spec, "cp")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_lines() {
        let out = "bar 2.0-1\nfoo-git r12.abcdef-1\n\n";
        let pkgs = parse_query_lines(out);
        assert_eq!(
            pkgs,
            vec![
                InstalledPackage::new("bar", "2.0-1"),
                InstalledPackage::new("foo-git", "r12.abcdef-1"),
            ]
        );
    }

    #[test]
    fn test_parse_depends_field_with_wrap() {
        let out = "\
Name            : foo
Version         : 1.0-1
Depends On      : glibc  bar>=2.0
                  baz
Optional Deps   : None
";
        assert_eq!(parse_depends_field(out), vec!["glibc", "bar>=2.0", "baz"]);
    }

    #[test]
    fn test_parse_depends_field_none() {
        let out = "Name            : foo\nDepends On      : None\n";
        assert!(parse_depends_field(out).is_empty());
    }

    #[test]
    fn test_parse_cache_dirs() {
        let conf = "\
[options]
# CacheDir = /commented/out/
CacheDir = /var/cache/pacman/pkg/ /mnt/pkg cache/
HoldPkg = pacman glibc

[core]
CacheDir = /ignored/
";
        assert_eq!(
            parse_cache_dirs(conf),
            vec![
                PathBuf::from("/var/cache/pacman/pkg/"),
                PathBuf::from("/mnt/pkg"),
                PathBuf::from("cache/"),
            ]
        );
    }

    #[test]
    fn test_parse_cache_dirs_default() {
        assert_eq!(
            parse_cache_dirs("[options]\n"),
            vec![PathBuf::from(DEFAULT_CACHE_DIR)]
        );
    }
}
