// src/resolver/spec.rs

//! Dependency strings such as `bar>=1.2-3`

use crate::version::DepOp;
use std::fmt;

/// A parsed dependency string
///
/// Operator and version are either both present or both absent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DependencySpec {
    pub name: String,
    pub constraint: Option<(DepOp, String)>,
}

impl DependencySpec {
    /// Parse `name[<op><version>]`
    ///
    /// The name ends at the first `<`, `>` or `=`. An operator with nothing
    /// after it is ignored and the whole string is taken as a bare name.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        let Some(split) = raw.find(['<', '>', '=']) else {
            return Self::bare(raw);
        };

        let (name, rest) = raw.split_at(split);
        let op_len = if rest.starts_with(">=") || rest.starts_with("<=") {
            2
        } else {
            1
        };
        let (op, version) = rest.split_at(op_len);

        match DepOp::parse(op) {
            Some(op) if !version.is_empty() && !name.is_empty() => Self {
                name: name.to_string(),
                constraint: Some((op, version.to_string())),
            },
            _ => Self::bare(raw),
        }
    }

    fn bare(name: &str) -> Self {
        Self {
            name: name.to_string(),
            constraint: None,
        }
    }

    pub fn op(&self) -> Option<DepOp> {
        self.constraint.as_ref().map(|(op, _)| *op)
    }

    pub fn version(&self) -> Option<&str> {
        self.constraint.as_ref().map(|(_, v)| v.as_str())
    }

    /// Does an installed `version` meet this constraint?
    pub fn satisfied_by(&self, version: &str) -> bool {
        match &self.constraint {
            Some((op, wanted)) => op.satisfied_by(version, wanted),
            None => true,
        }
    }

    /// ` (>=1.0)` suffix for messages; empty without a constraint
    pub fn constraint_suffix(&self) -> String {
        match &self.constraint {
            Some((op, version)) => format!(" ({}{})", op, version),
            None => String::new(),
        }
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.constraint {
            Some((op, version)) => write!(f, "{}{}{}", self.name, op, version),
            None => f.write_str(&self.name),
        }
    }
}
