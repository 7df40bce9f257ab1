// src/commands/remove.rs
//! Package removal command

use super::Session;
use anyhow::Result;
use tracing::info;

/// Remove installed AUR packages through pacman
pub fn cmd_remove(session: &Session, targets: &[String]) -> Result<()> {
    info!("Removing: {}", targets.join(" "));
    session.sync.remove(targets)?;
    Ok(())
}
