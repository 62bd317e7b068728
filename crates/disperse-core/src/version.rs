//! Release version model
//!
//! A [`Version`] is a dotted tuple of non-negative integers with an
//! optional trailing suffix (`1.2.3`, `0.4`, `2.0.0rc1`, `1.0.0-beta.2`).
//! Suffixed versions sort before the same tuple without a suffix.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VersionError;

static VERSION_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(0|[1-9][0-9]*)((?:\.(?:0|[1-9][0-9]*))*)(\.?[A-Za-z+\-_~][A-Za-z0-9.+\-_~]*)?$",
    )
    .expect("Invalid regex")
});

/// A release version
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version {
    components: Vec<u64>,
    suffix: Option<String>,
}

/// Which component to bump
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    Major,
    Minor,
    Patch,
}

impl BumpLevel {
    fn index(self) -> usize {
        match self {
            BumpLevel::Major => 0,
            BumpLevel::Minor => 1,
            BumpLevel::Patch => 2,
        }
    }
}

impl FromStr for BumpLevel {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "major" => Ok(BumpLevel::Major),
            "minor" => Ok(BumpLevel::Minor),
            "patch" | "micro" => Ok(BumpLevel::Patch),
            other => Err(VersionError::InvalidBumpLevel(other.to_string())),
        }
    }
}

impl fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BumpLevel::Major => write!(f, "major"),
            BumpLevel::Minor => write!(f, "minor"),
            BumpLevel::Patch => write!(f, "patch"),
        }
    }
}

/// Release status recorded in `$STATUS_TUPLED_VERSION`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Final,
    Dev,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Final => "final",
            Status::Dev => "dev",
        }
    }
}

impl Version {
    /// Build a version from its numeric components
    pub fn new(components: impl Into<Vec<u64>>) -> Self {
        let mut components = components.into();
        if components.is_empty() {
            components.push(0);
        }
        Self {
            components,
            suffix: None,
        }
    }

    /// Attach a pre-release suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        let suffix = suffix.into();
        self.suffix = if suffix.is_empty() { None } else { Some(suffix) };
        self
    }

    pub fn components(&self) -> &[u64] {
        &self.components
    }

    pub fn suffix(&self) -> Option<&str> {
        self.suffix.as_deref()
    }

    pub fn is_prerelease(&self) -> bool {
        self.suffix.is_some()
    }

    fn component(&self, idx: usize) -> u64 {
        self.components.get(idx).copied().unwrap_or(0)
    }

    pub fn major(&self) -> u64 {
        self.component(0)
    }

    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    pub fn micro(&self) -> u64 {
        self.component(2)
    }

    /// Return the next version at `level`.
    ///
    /// Lower components are reset to zero and any suffix is dropped, so the
    /// result is always strictly greater than `self`.
    pub fn increase(&self, level: BumpLevel) -> Result<Version, VersionError> {
        let idx = level.index();
        let mut components = self.components.clone();
        if components.len() <= idx {
            components.resize(idx + 1, 0);
        }
        components[idx] = components[idx]
            .checked_add(1)
            .ok_or_else(|| VersionError::Overflow(self.to_string()))?;
        for c in components.iter_mut().skip(idx + 1) {
            *c = 0;
        }
        Ok(Version {
            components,
            suffix: None,
        })
    }

    /// `(1, 2, 3)`
    pub fn tupled(&self) -> String {
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        format!("({})", parts.join(", "))
    }

    /// `(1, 2, 3, "final", 0)`
    pub fn status_tupled(&self, status: Status) -> String {
        format!(
            "({}, {}, {}, \"{}\", 0)",
            self.major(),
            self.minor(),
            self.micro(),
            status.as_str()
        )
    }

    /// Parse the `(1, 2, 3)` or `(1, 2, 3, "final", 0)` forms
    pub fn from_tupled(s: &str) -> Result<(Version, Option<Status>), VersionError> {
        let inner = s
            .trim()
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| VersionError::ParseFailed(s.to_string(), "not a tuple".into()))?;
        let mut components = Vec::new();
        let mut status = None;
        for part in inner.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if let Some(name) = part.strip_prefix('"').and_then(|p| p.strip_suffix('"')) {
                status = Some(match name {
                    "final" => Status::Final,
                    _ => Status::Dev,
                });
                break;
            }
            let n = part
                .parse::<u64>()
                .map_err(|e| VersionError::ParseFailed(s.to_string(), e.to_string()))?;
            components.push(n);
        }
        if components.is_empty() {
            return Err(VersionError::ParseFailed(s.to_string(), "empty tuple".into()));
        }
        Ok((Version::new(components), status))
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = VERSION_REGEX
            .captures(s)
            .ok_or_else(|| VersionError::ParseFailed(s.to_string(), "not a dotted version".into()))?;
        let mut components = Vec::new();
        let head = std::iter::once(&caps[1]).chain(caps[2].split('.').filter(|p| !p.is_empty()));
        for part in head {
            let n = part
                .parse::<u64>()
                .map_err(|e| VersionError::ParseFailed(s.to_string(), e.to_string()))?;
            components.push(n);
        }
        Ok(Version {
            components,
            suffix: caps.get(3).map(|m| m.as_str().to_string()),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.components.iter().map(|c| c.to_string()).collect();
        write!(f, "{}", parts.join("."))?;
        if let Some(suffix) = &self.suffix {
            write!(f, "{suffix}")?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.components
            .cmp(&other.components)
            .then_with(|| match (&self.suffix, &other.suffix) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => compare_suffix(a, b),
            })
    }
}

/// Runs of digits and non-digits, e.g. `rc10` gives `rc` and `10`
fn suffix_runs(suffix: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut prev_digit = None;
    for (i, c) in suffix.char_indices() {
        let digit = c.is_ascii_digit();
        if prev_digit.is_some_and(|prev| prev != digit) {
            runs.push(&suffix[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }
    if start < suffix.len() {
        runs.push(&suffix[start..]);
    }
    runs
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.trim_start_matches('0'), b.trim_start_matches('0'));
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Numeric runs compare as integers, so `rc2 < rc10`. Suffixes that only
/// differ in leading zeros fall back to plain text order to stay total.
fn compare_suffix(a: &str, b: &str) -> Ordering {
    let (runs_a, runs_b) = (suffix_runs(a), suffix_runs(b));
    for (x, y) in runs_a.iter().zip(&runs_b) {
        let numeric = |run: &str| run.starts_with(|c: char| c.is_ascii_digit());
        let ord = if numeric(x) && numeric(y) {
            compare_numeric(x, y)
        } else {
            x.cmp(y)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    runs_a
        .len()
        .cmp(&runs_b.len())
        .then_with(|| a.cmp(b))
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
