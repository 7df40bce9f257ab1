// src/sync/listing.rs

//! Read-only verbs: query, gone and search

use super::SyncOrchestrator;
use crate::aur::{MIN_SEARCH_LEN, SummaryRecord, is_vcs};
use crate::error::{Error, Result};
use tracing::debug;

impl SyncOrchestrator {
    /// `-Q`: list installed AUR packages; with `gone`, only those the AUR
    /// no longer knows
    ///
    /// Returns the number of packages listed.
    pub fn query(&self, targets: &[String], gone: bool) -> Result<usize> {
        let mut matched = 0;
        for pkg in self.query_packages(targets)? {
            if gone && self.client.search_exact(&pkg.name)?.is_some() {
                continue;
            }
            if self.options.quiet {
                self.reporter.print(&pkg.name);
            } else {
                self.reporter.print(&format!("{} {}", pkg.name, pkg.version));
            }
            matched += 1;
        }

        if matched == 0 && !self.options.quiet {
            self.reporter.output("no packages found");
        }
        Ok(matched)
    }

    /// `-Ss`: search the AUR for exactly one term
    ///
    /// Returns the number of results listed.
    pub fn search(&self, targets: &[String]) -> Result<usize> {
        let [term] = targets else {
            self.reporter.error("please provide ONE target for search");
            return Err(Error::UserInputError(
                "search takes exactly one target".to_string(),
            ));
        };
        if term.chars().count() < MIN_SEARCH_LEN {
            debug!("target name too short");
            self.reporter.error(&format!(
                "search term must be at least {} characters: {}",
                MIN_SEARCH_LEN, term
            ));
            return Err(Error::UserInputError(format!("search term too short: {}", term)));
        }

        let exact = self.options.info >= 2;
        let records = if exact {
            self.client.info_summaries(term)?
        } else {
            self.client.search_fuzzy(term, self.options.search_field)?
        };

        if records.is_empty() {
            if exact {
                self.reporter.output(&format!("no exact matches for {}", term));
            } else if !self.options.quiet {
                self.reporter.output("no packages found");
            }
            return Ok(0);
        }

        for record in &records {
            if record.name.is_empty() || record.version.is_empty() {
                debug!("unable to read this package: {:?}", record.fields);
            }
            if self.options.quiet {
                self.reporter.print(&record.name);
            } else if self.options.info > 0 {
                for line in info_lines(record) {
                    self.reporter.print(&line);
                }
                self.reporter.print("");
            } else {
                self.print_summary(record)?;
            }
        }
        Ok(records.len())
    }

    fn print_summary(&self, record: &SummaryRecord) -> Result<()> {
        let mut tags = String::new();
        if self.localdb.installed_version(&record.name)?.is_some() {
            tags.push_str(" [installed]");
        }
        if is_vcs(&record.name) {
            tags.push_str(" [vcs]");
        }
        self.reporter
            .print(&format!("aur/{} {}{}", record.name, record.version, tags));

        let description = if record.description.is_empty() {
            "no description"
        } else {
            &record.description
        };
        self.reporter.print(&format!("    {}", description));
        Ok(())
    }
}

/// `Key : value` lines for every field, keys padded to a common width
pub fn info_lines(record: &SummaryRecord) -> Vec<String> {
    let width = record
        .fields
        .iter()
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0)
        + 1;
    record
        .fields
        .iter()
        .map(|(key, value)| format!("{:<width$}: {}", key, value, width = width))
        .collect()
}
