// src/commands/query.rs
//! Read-only commands: query, gone and search

use super::Session;
use anyhow::Result;
use tracing::debug;

/// List installed AUR packages
pub fn cmd_query(session: &Session, targets: &[String], gone: bool) -> Result<()> {
    let listed = session.sync.query(targets, gone)?;
    debug!("listed {} package(s)", listed);
    Ok(())
}

/// Search the AUR
pub fn cmd_search(session: &Session, targets: &[String]) -> Result<()> {
    let found = session.sync.search(targets)?;
    debug!("search returned {} result(s)", found);
    Ok(())
}
