// src/commands/clean.rs
//! Cache clearing command

use super::Session;
use anyhow::Result;
use tracing::{info, warn};

/// Clear cache files and build directories
pub fn cmd_clean(session: &Session) -> Result<()> {
    info!("Cleaning {}", session.cache.dir().display());
    let report = session.sync.clean()?;
    info!(
        "removed {} file(s) and {} director(ies)",
        report.files_removed.len(),
        report.dirs_removed.len()
    );
    if !report.failed.is_empty() {
        warn!("{} director(ies) could not be removed", report.failed.len());
    }
    Ok(())
}
