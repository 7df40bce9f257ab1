// src/cache/ignore.rs

//! Time-window ignore records
//!
//! - `vcs.cache`: one float UNIX timestamp, the last time VCS packages were
//!   considered for upgrade. Acts as a global cooldown.
//! - `ignoring.cache`: JSON object mapping package name to the timestamp
//!   string of the start of its ignore window.

use super::CacheManager;
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fs;
use tracing::{debug, trace, warn};

pub const VCS_RECORD: &str = "vcs";
pub const IGNORE_RECORD: &str = "ignoring";

/// Seconds since the epoch as the string stored in records
pub fn timestamp_string(now: DateTime<Utc>) -> String {
    format!("{:.6}", now.timestamp_micros() as f64 / 1_000_000.0)
}

/// Hours elapsed between a stored timestamp and `now`
pub fn hours_since(stamp: &str, now: DateTime<Utc>) -> Option<f64> {
    let then: f64 = stamp.trim().parse().ok()?;
    let now = now.timestamp_micros() as f64 / 1_000_000.0;
    Some((now - then) / 3600.0)
}

/// A parsed `name=hours` rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreRule {
    pub name: String,
    pub hours: u64,
}

impl IgnoreRule {
    /// Parse `name=hours`; `None` for anything malformed or under one hour
    pub fn parse(spec: &str) -> Option<Self> {
        let (name, hours) = spec.split_once('=')?;
        if hours.contains('=') || name.is_empty() {
            return None;
        }
        let hours: u64 = hours.trim().parse().ok()?;
        if hours < 1 {
            return None;
        }
        Some(Self {
            name: name.trim().to_string(),
            hours,
        })
    }
}

impl CacheManager {
    /// Should VCS packages be skipped this run?
    ///
    /// Returns true only when the stored record is younger than
    /// `threshold_hours`. Otherwise the record is rewritten with `now` and
    /// the answer is false. Caller must hold the instance lock.
    pub fn check_vcs_ignore(&self, threshold_hours: u64, now: DateTime<Utc>) -> Result<bool> {
        debug!("checking vcs ignore cache");
        let record = self.cache_file(VCS_RECORD)?;

        if let Ok(text) = fs::read_to_string(&record) {
            match hours_since(&text, now) {
                Some(hours) if hours < threshold_hours as f64 => {
                    trace!("vcs ignore threshold met ({:.2}h < {}h)", hours, threshold_hours);
                    return Ok(true);
                }
                Some(_) => {}
                None => warn!("unreadable vcs cache record, resetting"),
            }
        }

        self.reporter().output("updating vcs last cache time");
        fs::write(&record, timestamp_string(now))?;
        Ok(false)
    }

    /// Apply `name=hours` ignore windows
    ///
    /// Packages inside their window are appended to `ignored`; every other
    /// named package gets a fresh window starting `now`. Malformed rules are
    /// warned about and skipped. Caller must hold the instance lock.
    pub fn check_ignore_for(
        &self,
        specs: &[String],
        ignored: &mut Vec<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        debug!("checking ignored packages");
        let record = self.cache_file(IGNORE_RECORD)?;

        let mut windows: BTreeMap<String, String> = match fs::read_to_string(&record) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("unreadable ignore cache record, resetting: {}", e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        for spec in specs {
            let Some(rule) = IgnoreRule::parse(spec) else {
                warn!("invalid ignore definition {}", spec);
                self.reporter().warn(&format!("invalid ignore definition {}", spec));
                continue;
            };

            let within = windows
                .get(&rule.name)
                .and_then(|stamp| hours_since(stamp, now))
                .is_some_and(|hours| hours < rule.hours as f64);

            if within {
                if !ignored.contains(&rule.name) {
                    ignored.push(rule.name);
                }
            } else {
                windows.insert(rule.name, timestamp_string(now));
            }
        }

        debug!("writing ignore definitions");
        fs::write(&record, serde_json::to_string(&windows)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemoryReporter;
    use chrono::Duration;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn manager(dir: &TempDir) -> CacheManager {
        CacheManager::new(dir.path(), Arc::new(MemoryReporter::new()))
    }

    #[test]
    fn test_ignore_rule_parse() {
        assert_eq!(
            IgnoreRule::parse("foo=24"),
            Some(IgnoreRule {
                name: "foo".to_string(),
                hours: 24
            })
        );
        assert_eq!(IgnoreRule::parse("foo"), None);
        assert_eq!(IgnoreRule::parse("foo=1=2"), None);
        assert_eq!(IgnoreRule::parse("foo=abc"), None);
        assert_eq!(IgnoreRule::parse("foo=0"), None);
        assert_eq!(IgnoreRule::parse("=5"), None);
    }

    #[test]
    fn test_vcs_ignore_twice_within_threshold() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);
        let first = Utc::now();

        assert!(!cache.check_vcs_ignore(1, first).unwrap());
        let written = fs::read_to_string(cache.cache_file(VCS_RECORD).unwrap()).unwrap();

        let second = first + Duration::minutes(10);
        assert!(cache.check_vcs_ignore(1, second).unwrap());
        let after = fs::read_to_string(cache.cache_file(VCS_RECORD).unwrap()).unwrap();
        assert_eq!(written, after);
    }

    #[test]
    fn test_vcs_ignore_expired_rewrites() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);
        let then = Utc::now() - Duration::hours(30);
        fs::write(cache.cache_file(VCS_RECORD).unwrap(), timestamp_string(then)).unwrap();

        let now = Utc::now();
        assert!(!cache.check_vcs_ignore(24, now).unwrap());
        let stored = fs::read_to_string(cache.cache_file(VCS_RECORD).unwrap()).unwrap();
        assert_eq!(stored, timestamp_string(now));
    }

    #[test]
    fn test_ignore_for_windows() {
        let dir = TempDir::new().unwrap();
        let cache = manager(&dir);
        let start = Utc::now();
        let specs = vec![
            "foo=2".to_string(),
            "bar=1".to_string(),
            "broken".to_string(),
        ];

        let mut ignored = Vec::new();
        cache.check_ignore_for(&specs, &mut ignored, start).unwrap();
        // first sighting opens the windows
        assert!(ignored.is_empty());

        let later = start + Duration::minutes(90);
        cache.check_ignore_for(&specs, &mut ignored, later).unwrap();
        // foo still inside its 2h window, bar's 1h window expired and restarted
        assert_eq!(ignored, vec!["foo"]);

        let text = fs::read_to_string(cache.cache_file(IGNORE_RECORD).unwrap()).unwrap();
        let stored: BTreeMap<String, String> = serde_json::from_str(&text).unwrap();
        assert_eq!(stored["foo"], timestamp_string(start));
        assert_eq!(stored["bar"], timestamp_string(later));
        assert!(!stored.contains_key("broken"));
    }
}
