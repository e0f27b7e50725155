//! Semantic version utilities.
//!
//! Extensions declare their own version and version requirements on
//! their dependencies. This module provides both halves: a `Version`
//! following semantic versioning, and a `VersionReq` constraint
//! (`>=1.0.0`, `^1.2`, `~0.3.1`, `=2.0.0`) matched against versions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Error parsing a version or requirement string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionParseError {
    /// The invalid input.
    pub input: String,
    /// The reason for the error.
    pub reason: String,
}

impl fmt::Display for VersionParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid version '{}': {}", self.input, self.reason)
    }
}

impl std::error::Error for VersionParseError {}

fn parse_error(input: &str, reason: &str) -> VersionParseError {
    VersionParseError {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// A semantic version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Major version number.
    pub major: u32,
    /// Minor version number.
    pub minor: u32,
    /// Patch version number.
    pub patch: u32,
    /// Prerelease identifiers, compared lexicographically per part.
    pub prerelease: Option<String>,
}

impl Version {
    /// Create a new release version.
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
        }
    }

    /// Add prerelease identifiers to this version.
    pub fn with_prerelease(mut self, prerelease: impl Into<String>) -> Self {
        self.prerelease = Some(prerelease.into());
        self
    }

    /// Check whether this version is caret-compatible with `other`:
    /// same major (same minor too while major is 0) and not older.
    pub fn is_compatible_with(&self, other: &Version) -> bool {
        if self.major == 0 {
            self.major == other.major && self.minor == other.minor && self <= other
        } else {
            self.major == other.major && self <= other
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                // A prerelease sorts before the release it precedes.
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.split('.').cmp(b.split('.')),
            })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(pre) = &self.prerelease {
            write!(f, "-{}", pre)?;
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (numbers, prerelease) = match s.split_once('-') {
            Some((n, p)) if !p.is_empty() => (n, Some(p.to_string())),
            Some(_) => return Err(parse_error(s, "empty prerelease")),
            None => (s, None),
        };

        let mut parts = numbers.splitn(3, '.');
        let mut next = |what: &str| -> Result<u32, VersionParseError> {
            parts
                .next()
                .ok_or_else(|| parse_error(s, &format!("missing {} version", what)))?
                .parse()
                .map_err(|_| parse_error(s, &format!("invalid {} version", what)))
        };

        let major = next("major")?;
        let minor = next("minor")?;
        let patch = next("patch")?;

        if let Some(pre) = &prerelease {
            let valid = pre
                .split('.')
                .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric() || c == '-'));
            if !valid {
                return Err(parse_error(s, "invalid prerelease identifier"));
            }
        }

        Ok(Self {
            major,
            minor,
            patch,
            prerelease,
        })
    }
}

/// Comparison operator of a version requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparator {
    /// Exactly the given version.
    Exact,
    /// At least the given version.
    GreaterEq,
    /// Strictly newer than the given version.
    Greater,
    /// At most the given version.
    LessEq,
    /// Strictly older than the given version.
    Less,
    /// Same major (and minor while major is 0), not older.
    Caret,
    /// Same major and minor, not older.
    Tilde,
}

/// A version requirement such as `>=1.0.0` or `^1.2.0`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReq {
    /// The comparison operator.
    pub comparator: Comparator,
    /// The reference version.
    pub version: Version,
}

impl VersionReq {
    /// A requirement matching exactly one version.
    pub fn exact(version: Version) -> Self {
        Self {
            comparator: Comparator::Exact,
            version,
        }
    }

    /// Check whether `candidate` satisfies this requirement.
    pub fn matches(&self, candidate: &Version) -> bool {
        match self.comparator {
            Comparator::Exact => candidate == &self.version,
            Comparator::GreaterEq => candidate >= &self.version,
            Comparator::Greater => candidate > &self.version,
            Comparator::LessEq => candidate <= &self.version,
            Comparator::Less => candidate < &self.version,
            Comparator::Caret => self.version.is_compatible_with(candidate),
            Comparator::Tilde => {
                candidate.major == self.version.major
                    && candidate.minor == self.version.minor
                    && candidate >= &self.version
            }
        }
    }
}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self.comparator {
            Comparator::Exact => "=",
            Comparator::GreaterEq => ">=",
            Comparator::Greater => ">",
            Comparator::LessEq => "<=",
            Comparator::Less => "<",
            Comparator::Caret => "^",
            Comparator::Tilde => "~",
        };
        write!(f, "{}{}", op, self.version)
    }
}

impl FromStr for VersionReq {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (comparator, rest) = if let Some(rest) = s.strip_prefix(">=") {
            (Comparator::GreaterEq, rest)
        } else if let Some(rest) = s.strip_prefix("<=") {
            (Comparator::LessEq, rest)
        } else if let Some(rest) = s.strip_prefix('>') {
            (Comparator::Greater, rest)
        } else if let Some(rest) = s.strip_prefix('<') {
            (Comparator::Less, rest)
        } else if let Some(rest) = s.strip_prefix('^') {
            (Comparator::Caret, rest)
        } else if let Some(rest) = s.strip_prefix('~') {
            (Comparator::Tilde, rest)
        } else if let Some(rest) = s.strip_prefix('=') {
            (Comparator::Exact, rest)
        } else {
            // A bare version requires that exact version.
            (Comparator::Exact, s)
        };

        let version = Version::from_str(rest.trim())?;
        Ok(Self {
            comparator,
            version,
        })
    }
}
