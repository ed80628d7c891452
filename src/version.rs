//! Version types used throughout resolution
//!
//! [`Version`] wraps [`semver::Version`] but orders and compares on
//! `(major, minor, patch, prerelease)` only: build metadata is carried for
//! display and never participates in ordering, equality or hashing.
//!
//! [`UnityVersion`] is the `major.minor` pair a package declares as its
//! minimum editor, and [`DependencyRange`] is the requirement attached to a
//! `vpmDependencies` entry.
//!
//! # Examples
//!
//! ```
//! use unitypm::Version;
//!
//! let beta = Version::parse("1.2.0-beta.1").unwrap();
//! let release = Version::parse("1.2.0").unwrap();
//! let patch = Version::parse("1.2.1").unwrap();
//! assert!(beta < release && release < patch);
//! ```

use crate::{Error, Result};
use semver::{Comparator, Op, VersionReq};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A package version
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Version {
    inner: semver::Version,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            inner: semver::Version::new(major, minor, patch),
        }
    }

    /// Parse a version string
    ///
    /// Two-component versions (`"1.2"`) are normalized to `"1.2.0"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidVersion(s.to_string()));
        }

        let core_end = s.find(['-', '+']).unwrap_or(s.len());
        let normalized = if s[..core_end].matches('.').count() == 1 {
            format!("{}.0{}", &s[..core_end], &s[core_end..])
        } else {
            s.to_string()
        };

        Ok(Self {
            inner: semver::Version::parse(&normalized)?,
        })
    }

    pub fn major(&self) -> u64 {
        self.inner.major
    }

    pub fn minor(&self) -> u64 {
        self.inner.minor
    }

    pub fn patch(&self) -> u64 {
        self.inner.patch
    }

    /// Prerelease identifiers joined with `.`, empty for a release
    pub fn prerelease(&self) -> &str {
        self.inner.pre.as_str()
    }

    pub fn build(&self) -> &str {
        self.inner.build.as_str()
    }

    pub fn is_prerelease(&self) -> bool {
        !self.inner.pre.is_empty()
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.inner
    }
}

/// Compare two prerelease strings
///
/// An empty prerelease sorts above any non-empty one. Identifiers compare
/// numerically when both are numeric and lexically when both are not; a
/// numeric identifier always sorts below an alphanumeric one. A shorter list
/// sorts first when it is a prefix of the longer one.
pub fn compare_prerelease(left: &str, right: &str) -> Ordering {
    match (left.is_empty(), right.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }

    let mut left = left.split('.');
    let mut right = right.split('.');
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    (Ok(_), Err(_)) => Ordering::Less,
                    (Err(_), Ok(_)) => Ordering::Greater,
                    (Err(_), Err(_)) => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major()
            .cmp(&other.major())
            .then(self.minor().cmp(&other.minor()))
            .then(self.patch().cmp(&other.patch()))
            .then_with(|| compare_prerelease(self.prerelease(), other.prerelease()))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.major().hash(state);
        self.minor().hash(state);
        self.patch().hash(state);
        self.prerelease().hash(state);
    }
}

impl Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Version {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Version> for String {
    fn from(value: Version) -> Self {
        value.to_string()
    }
}

/// Unity editor version, `major.minor` only (e.g. `2022.3`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UnityVersion {
    major: u16,
    minor: u8,
}

impl UnityVersion {
    pub const fn new(major: u16, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Parse `2022.3`, `2022.3.6f1` or `2019.4.31f1`; anything after the
    /// minor component is ignored.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion(s.to_string());
        let mut parts = s.trim().split('.');

        let major = parts
            .next()
            .and_then(|p| p.parse::<u16>().ok())
            .ok_or_else(invalid)?;
        let minor = parts
            .next()
            .map(|p| {
                let digits: String = p.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse::<u8>()
            })
            .unwrap_or(Ok(0))
            .map_err(|_| invalid())?;

        Ok(Self { major, minor })
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    pub fn minor(&self) -> u8 {
        self.minor
    }
}

impl Display for UnityVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for UnityVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for UnityVersion {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<UnityVersion> for String {
    fn from(value: UnityVersion) -> Self {
        value.to_string()
    }
}

/// Requirement on a dependency version
///
/// A bare version (`"1.2.0"`) means "at least this version", matching the
/// VPM manifest convention. Anything else is parsed as a semver requirement
/// (`">=1.0.0, <2.0.0"`, `"^3.5"`, `"*"`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DependencyRange {
    text: String,
    req: VersionReq,
}

impl DependencyRange {
    /// Accepts any version
    pub fn any() -> Self {
        Self {
            text: "*".to_string(),
            req: VersionReq::STAR,
        }
    }

    /// `>= version`
    pub fn at_least(version: &Version) -> Self {
        let v = version.as_semver();
        let req = VersionReq {
            comparators: vec![Comparator {
                op: Op::GreaterEq,
                major: v.major,
                minor: Some(v.minor),
                patch: Some(v.patch),
                pre: v.pre.clone(),
            }],
        };
        Self {
            text: version.to_string(),
            req,
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() || trimmed == "*" {
            return Ok(Self::any());
        }

        if let Ok(version) = Version::parse(trimmed) {
            return Ok(Self::at_least(&version));
        }

        let req = VersionReq::parse(trimmed)?;
        Ok(Self {
            text: trimmed.to_string(),
            req,
        })
    }

    /// Whether `version` satisfies the range
    ///
    /// Prerelease versions only match comparators that name the same
    /// `major.minor.patch` with a prerelease of their own; use
    /// [`DependencyRange::matches_pre`] to lift that restriction.
    pub fn matches(&self, version: &Version) -> bool {
        self.req.matches(version.as_semver())
    }

    /// Like [`DependencyRange::matches`], but with `allow_prerelease` a
    /// prerelease version is judged by plain version ordering
    pub fn matches_pre(&self, version: &Version, allow_prerelease: bool) -> bool {
        if !allow_prerelease || !version.is_prerelease() {
            return self.matches(version);
        }

        // `>= version` always holds and opens semver's prerelease gate
        let v = version.as_semver();
        let mut req = self.req.clone();
        req.comparators.push(Comparator {
            op: Op::GreaterEq,
            major: v.major,
            minor: Some(v.minor),
            patch: Some(v.patch),
            pre: v.pre.clone(),
        });
        req.matches(v)
    }
}

impl Display for DependencyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl PartialEq for DependencyRange {
    fn eq(&self, other: &Self) -> bool {
        self.req == other.req
    }
}

impl Eq for DependencyRange {}

impl TryFrom<String> for DependencyRange {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<DependencyRange> for String {
    fn from(value: DependencyRange) -> Self {
        value.text
    }
}
