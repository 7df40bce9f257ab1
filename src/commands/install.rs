// src/commands/install.rs
//! Installing commands: install, upgrade and deps

use super::Session;
use anyhow::Result;
use auric::SyncSummary;
use tracing::info;

/// Install packages from the AUR
pub fn cmd_install(session: &Session, targets: &[String]) -> Result<bool> {
    info!("Installing: {}", targets.join(" "));
    finish(session.sync.install(targets)?)
}

/// Upgrade installed AUR packages
pub fn cmd_upgrade(session: &Session, targets: &[String]) -> Result<bool> {
    let refresh = session.sync.options().refresh;
    if targets.is_empty() {
        info!("Upgrading all AUR packages (refresh level {})", refresh);
    } else {
        info!("Upgrading: {} (refresh level {})", targets.join(" "), refresh);
    }
    finish(session.sync.upgrade(targets)?)
}

/// Install each target with its dependency chain
pub fn cmd_deps(session: &Session, targets: &[String]) -> Result<bool> {
    info!("Installing with dependency chains: {}", targets.join(" "));
    finish(session.sync.deps(targets)?)
}

fn finish(summary: SyncSummary) -> Result<bool> {
    info!(
        "{} built, {} up-to-date, {} skipped, {} failed",
        summary.built.len(),
        summary.up_to_date.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary.is_success())
}
