// src/build/pkgbuild.rs

//! PKGBUILD `pkgname` declaration parsing and split handling
//!
//! Only the `pkgname` declaration is understood. Supported forms:
//!
//! ```bash
//! pkgname=foo
//! pkgname="foo"
//! pkgname=('foo' "foo-docs" foo-utils)   # comment
//! pkgname=(
//!     'foo'
//!     'foo-docs'
//! )
//! ```
//!
//! The declaration must start at column 0 so `pkgname=` assignments inside
//! functions are not picked up. Names may contain ASCII alphanumerics and
//! `@ . _ + -`; anything else (variables, brace expansion) is a parse error.

use crate::config::SplitPolicy;
use crate::error::{Error, Result};
use crate::report::Reporter;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

const DECLARATION: &str = "pkgname=";

/// Extra characters allowed in package names
const NAME_CHARS: &[char] = &['@', '.', '_', '+', '-'];

/// A parsed `pkgname` declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkgnameDecl {
    pub names: Vec<String>,
    /// First line of the declaration (0-based)
    pub start_line: usize,
    /// Last line of the declaration, inclusive
    pub end_line: usize,
}

impl PkgnameDecl {
    pub fn is_split(&self) -> bool {
        self.names.len() > 1
    }
}

/// What a split check did to the recipe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitOutcome {
    /// Single output, or split handling disabled
    NotSplit,
    /// Split recipe skipped by policy; counts as success without a build
    Skipped,
    /// Recipe rewritten to build only the target
    Rewritten,
}

/// Parse the `pkgname` declaration of a PKGBUILD
pub fn parse_pkgname(text: &str) -> Result<PkgnameDecl> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.starts_with(DECLARATION))
        .ok_or_else(|| Error::PkgbuildParseError("no pkgname declaration".to_string()))?;

    let value = lines[start][DECLARATION.len()..].trim_start();
    let (names, end) = if let Some(list) = value.strip_prefix('(') {
        parse_list(&lines, start, list)?
    } else {
        (vec![parse_scalar(value)?], start)
    };

    if names.is_empty() {
        return Err(Error::PkgbuildParseError("empty pkgname list".to_string()));
    }
    for name in &names {
        validate_name(name)?;
    }

    trace!("pkgname lines {}..={}: {:?}", start, end, names);
    Ok(PkgnameDecl {
        names,
        start_line: start,
        end_line: end,
    })
}

fn parse_scalar(value: &str) -> Result<String> {
    let mut chars = value.chars();
    let name = match chars.next() {
        Some(q @ ('\'' | '"')) => {
            let rest = chars.as_str();
            let close = rest.find(q).ok_or_else(|| {
                Error::PkgbuildParseError("unterminated quoted pkgname".to_string())
            })?;
            rest[..close].to_string()
        }
        _ => value
            .split(|c: char| c.is_whitespace() || c == ';')
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    if name.is_empty() {
        return Err(Error::PkgbuildParseError("empty pkgname".to_string()));
    }
    Ok(name)
}

/// Items of a parenthesized list, plus the line holding the closing `)`
fn parse_list(lines: &[&str], start: usize, first: &str) -> Result<(Vec<String>, usize)> {
    let mut lexer = ListLexer::default();
    let mut line_no = start;
    let mut rest = first;

    loop {
        if lexer.feed(rest) {
            return Ok((lexer.items, line_no));
        }
        line_no += 1;
        match lines.get(line_no) {
            Some(line) => rest = line,
            None => {
                return Err(Error::PkgbuildParseError(
                    "unterminated pkgname list".to_string(),
                ));
            }
        }
    }
}

#[derive(Default)]
struct ListLexer {
    items: Vec<String>,
    current: String,
    /// An item is open (a quote counts even if it ends up empty)
    open: bool,
    quote: Option<char>,
}

impl ListLexer {
    /// Consume one line; true once the closing `)` is seen
    fn feed(&mut self, line: &str) -> bool {
        for c in line.chars() {
            if let Some(q) = self.quote {
                if c == q {
                    self.quote = None;
                } else {
                    self.current.push(c);
                }
                continue;
            }

            match c {
                '\'' | '"' => {
                    self.quote = Some(c);
                    self.open = true;
                }
                '#' if !self.open => break,
                ')' => {
                    self.finish();
                    return true;
                }
                c if c.is_whitespace() => self.finish(),
                c => {
                    self.current.push(c);
                    self.open = true;
                }
            }
        }

        if self.quote.is_some() {
            self.current.push('\n');
        } else {
            self.finish();
        }
        false
    }

    fn finish(&mut self) {
        if self.open {
            self.items.push(std::mem::take(&mut self.current));
            self.open = false;
        }
    }
}

fn validate_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || NAME_CHARS.contains(&c));
    if valid {
        Ok(())
    } else {
        Err(Error::PkgbuildParseError(format!(
            "unsupported package name '{}'",
            name
        )))
    }
}

/// Replace the declaration with `pkgname=<target>`, keeping every other line
pub fn rewrite_pkgname(text: &str, decl: &PkgnameDecl, target: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for (i, line) in text.lines().enumerate() {
        if i == decl.start_line {
            out.push_str(DECLARATION);
            out.push_str(target);
            out.push('\n');
        } else if i < decl.start_line || i > decl.end_line {
            out.push_str(line);
            out.push('\n');
        }
    }
    if !text.ends_with('\n') {
        out.pop();
    }
    out
}

/// Apply the split policy to the PKGBUILD at `path`
///
/// A target missing from a split recipe, or a split recipe under the
/// `error` policy, fails with [`Error::SplitPolicyError`].
pub fn apply_split_policy(
    path: &Path,
    target: &str,
    policy: SplitPolicy,
    reporter: &dyn Reporter,
) -> Result<SplitOutcome> {
    if policy == SplitPolicy::Nothing {
        return Ok(SplitOutcome::NotSplit);
    }

    debug!("handling split packages");
    let text = fs::read_to_string(path).map_err(|e| {
        Error::PkgbuildParseError(format!("unable to read {}: {}", path.display(), e))
    })?;
    let decl = parse_pkgname(&text)?;

    if !decl.is_split() {
        debug!("not a split package");
        return Ok(SplitOutcome::NotSplit);
    }

    if !decl.names.iter().any(|n| n == target) {
        let message = format!("unable to find {} in split package", target);
        reporter.error(&message);
        return Err(Error::SplitPolicyError(message));
    }

    match policy {
        SplitPolicy::Error => {
            let message = "split package detected but disabled".to_string();
            reporter.error(&message);
            Err(Error::SplitPolicyError(message))
        }
        SplitPolicy::Skip => {
            reporter.output("skipping (split package)");
            Ok(SplitOutcome::Skipped)
        }
        SplitPolicy::Split => {
            reporter.output("splitting package");
            fs::write(path, rewrite_pkgname(&text, &decl, target))?;
            Ok(SplitOutcome::Rewritten)
        }
        SplitPolicy::Nothing => Ok(SplitOutcome::NotSplit),
    }
}
