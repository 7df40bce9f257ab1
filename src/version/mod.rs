// src/version/mod.rs

//! Version handling and constraint satisfaction for pacman-style versions
//!
//! Versions have the shape `[epoch:]pkgver[-pkgrel]` and are compared with
//! the same segment algorithm pacman's `vercmp` uses. They are never treated
//! as semver: `1.0rc1 < 1.0` and `1.0a < 1.0.1` both hold here.

use std::cmp::Ordering;
use std::fmt;

/// A parsed pacman version with epoch, pkgver and pkgrel components
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PkgVersion {
    pub epoch: u64,
    pub pkgver: String,
    pub pkgrel: Option<String>,
}

impl PkgVersion {
    /// Parse a version string
    ///
    /// Format: [epoch:]pkgver[-pkgrel]
    /// - "1.2.3" → epoch=0, pkgver="1.2.3", pkgrel=None
    /// - "2:1.2.3-4" → epoch=2, pkgver="1.2.3", pkgrel=Some("4")
    ///
    /// Parsing never fails; a non-numeric epoch is folded into pkgver the way
    /// pacman does when the prefix before ':' is not a number.
    pub fn parse(s: &str) -> Self {
        let (epoch, rest) = match s.split_once(':') {
            Some((e, r)) if e.is_empty() => (0, r),
            Some((e, r)) => match e.parse::<u64>() {
                Ok(n) => (n, r),
                Err(_) => (0, s),
            },
            None => (0, s),
        };

        let (pkgver, pkgrel) = match rest.rsplit_once('-') {
            Some((v, r)) => (v.to_string(), Some(r.to_string())),
            None => (rest.to_string(), None),
        };

        Self {
            epoch,
            pkgver,
            pkgrel,
        }
    }

    /// Compare two versions the way `vercmp` does
    ///
    /// A missing pkgrel on either side compares equal to any pkgrel, so
    /// `1.0` satisfies `=1.0-3`.
    pub fn compare(&self, other: &PkgVersion) -> Ordering {
        match self.epoch.cmp(&other.epoch) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match compare_segments(&self.pkgver, &other.pkgver) {
            Ordering::Equal => {}
            ord => return ord,
        }

        match (&self.pkgrel, &other.pkgrel) {
            (Some(a), Some(b)) => compare_segments(a, b),
            _ => Ordering::Equal,
        }
    }
}

impl fmt::Display for PkgVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.epoch > 0 {
            write!(f, "{}:", self.epoch)?;
        }
        write!(f, "{}", self.pkgver)?;
        if let Some(ref rel) = self.pkgrel {
            write!(f, "-{}", rel)?;
        }
        Ok(())
    }
}

/// Compare two raw version strings
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    PkgVersion::parse(a).compare(&PkgVersion::parse(b))
}

/// rpmvercmp: alternating runs of digits and letters, separated by any
/// other characters
fn compare_segments(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }

    let a = a.as_bytes();
    let b = b.as_bytes();
    let (mut i, mut j) = (0usize, 0usize);

    loop {
        let sep_start_a = i;
        let sep_start_b = j;
        while i < a.len() && !a[i].is_ascii_alphanumeric() {
            i += 1;
        }
        while j < b.len() && !b[j].is_ascii_alphanumeric() {
            j += 1;
        }

        if i >= a.len() || j >= b.len() {
            break;
        }

        // Differing separator lengths: the longer separator wins
        let sep_a = i - sep_start_a;
        let sep_b = j - sep_start_b;
        if sep_a != sep_b {
            return sep_a.cmp(&sep_b);
        }

        let numeric = a[i].is_ascii_digit();
        let seg_end = |s: &[u8], mut k: usize| {
            while k < s.len()
                && (if numeric {
                    s[k].is_ascii_digit()
                } else {
                    s[k].is_ascii_alphabetic()
                })
            {
                k += 1;
            }
            k
        };
        let end_a = seg_end(a, i);
        let end_b = seg_end(b, j);

        let seg_a = &a[i..end_a];
        let seg_b = &b[j..end_b];

        if seg_b.is_empty() {
            // numeric segments are always newer than alpha segments
            return if numeric {
                Ordering::Greater
            } else {
                Ordering::Less
            };
        }

        if numeric {
            let trim = |s: &[u8]| -> usize { s.iter().take_while(|c| **c == b'0').count() };
            let seg_a = &seg_a[trim(seg_a)..];
            let seg_b = &seg_b[trim(seg_b)..];
            match seg_a.len().cmp(&seg_b.len()) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }

        match seg_a.cmp(seg_b) {
            Ordering::Equal => {}
            ord => return ord,
        }

        i = end_a;
        j = end_b;
    }

    let a_done = i >= a.len();
    let b_done = j >= b.len();
    match (a_done, b_done) {
        (true, true) => Ordering::Equal,
        // "1.0" vs "1.0a": the alpha suffix is older, a numeric suffix newer
        (true, false) => {
            if b[j].is_ascii_alphabetic() {
                Ordering::Greater
            } else {
                Ordering::Less
            }
        }
        (false, true) => {
            if a[i].is_ascii_alphabetic() {
                Ordering::Less
            } else {
                Ordering::Greater
            }
        }
        (false, false) => Ordering::Equal,
    }
}

/// Comparison operators allowed in dependency strings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

impl DepOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ge => ">=",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Eq => "=",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            "=" => Some(Self::Eq),
            _ => None,
        }
    }

    /// Does `installed` satisfy `installed <op> wanted`?
    pub fn satisfied_by(&self, installed: &str, wanted: &str) -> bool {
        let ord = vercmp(installed, wanted);
        match self {
            Self::Ge => ord != Ordering::Less,
            Self::Le => ord != Ordering::Greater,
            Self::Gt => ord == Ordering::Greater,
            Self::Lt => ord == Ordering::Less,
            Self::Eq => ord == Ordering::Equal,
        }
    }
}

impl fmt::Display for DepOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
