//! Version string parsing and ordering
//!
//! Devbox packages come from nixpkgs, where version strings are anything but
//! uniform. Parsing therefore cascades through progressively looser shapes:
//! - Semantic version: `1`, `1.2`, `1.2.3`, `1.2.3-rc.1+build.5`
//! - Date: `2024.01.15`, `2024-01-15`
//! - Bare integer: `42`
//! - Digit extraction: `unstable-2023-10-01`, `r8`
//! - Opaque string: `latest`

use crate::error::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static SEMVER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+)(?:\.(\d+))?(?:\.(\d+))?(?:-([0-9A-Za-z.-]+))?(?:\+([0-9A-Za-z.-]+))?$")
        .unwrap()
});
static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})[.-](\d{2})[.-](\d{2})$").unwrap());
static INTEGER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)$").unwrap());
static DIGITS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// A version string broken into comparable components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedVersion {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub prerelease: Option<String>,
    pub build: Option<String>,
    /// The string this was parsed from, untrimmed
    pub original: String,
}

impl ParsedVersion {
    fn numeric(original: &str, major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            prerelease: None,
            build: None,
            original: original.to_string(),
        }
    }

    /// Returns true if this version carries a prerelease tag
    pub fn is_prerelease(&self) -> bool {
        self.prerelease.is_some()
    }
}

/// Digit runs too large for u64 saturate instead of failing the parse.
fn number(s: Option<regex::Match<'_>>) -> u64 {
    s.map(|m| m.as_str().parse().unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Parse a version string.
///
/// Fails only on empty or whitespace-only input; every other string yields
/// some `ParsedVersion`.
pub fn parse_version(version: &str) -> Result<ParsedVersion, ValidationError> {
    let trimmed = version.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyVersion);
    }

    if let Some(caps) = SEMVER_RE.captures(trimmed) {
        return Ok(ParsedVersion {
            major: number(caps.get(1)),
            minor: number(caps.get(2)),
            patch: number(caps.get(3)),
            prerelease: caps.get(4).map(|m| m.as_str().to_string()),
            build: caps.get(5).map(|m| m.as_str().to_string()),
            original: version.to_string(),
        });
    }

    if let Some(caps) = DATE_RE.captures(trimmed) {
        return Ok(ParsedVersion::numeric(
            version,
            number(caps.get(1)),
            number(caps.get(2)),
            number(caps.get(3)),
        ));
    }

    if let Some(caps) = INTEGER_RE.captures(trimmed) {
        return Ok(ParsedVersion::numeric(version, number(caps.get(1)), 0, 0));
    }

    let digits: Vec<u64> = DIGITS_RE
        .find_iter(trimmed)
        .map(|m| m.as_str().parse().unwrap_or(u64::MAX))
        .collect();

    if digits.is_empty() {
        return Ok(ParsedVersion {
            major: 0,
            minor: 0,
            patch: 0,
            prerelease: Some(version.to_string()),
            build: None,
            original: version.to_string(),
        });
    }

    let prerelease = trimmed
        .split_once('-')
        .map(|(_, rest)| rest.to_string());

    Ok(ParsedVersion {
        major: digits[0],
        minor: digits.get(1).copied().unwrap_or(0),
        patch: digits.get(2).copied().unwrap_or(0),
        prerelease,
        build: None,
        original: version.to_string(),
    })
}

impl Ord for ParsedVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (&self.prerelease, &other.prerelease) {
                (None, None) => Ordering::Equal,
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some(a), Some(b)) => a.cmp(b),
            })
            // Stable tie-break only; equal rank does not imply equal release.
            .then_with(|| self.original.cmp(&other.original))
    }
}

impl PartialOrd for ParsedVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ParsedVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ParsedVersion {}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.original)
    }
}

/// Compare two version strings
pub fn compare_versions(a: &str, b: &str) -> Result<Ordering, ValidationError> {
    Ok(parse_version(a)?.cmp(&parse_version(b)?))
}

/// Find the highest version in a list
pub fn find_latest_version<S: AsRef<str>>(versions: &[S]) -> Result<String, ValidationError> {
    let mut latest: Option<ParsedVersion> = None;
    for version in versions {
        let parsed = parse_version(version.as_ref())?;
        latest = match latest {
            Some(current) if current >= parsed => Some(current),
            _ => Some(parsed),
        };
    }
    latest
        .map(|v| v.original)
        .ok_or(ValidationError::EmptyVersionList)
}

/// Size of the step between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateType {
    Major,
    Minor,
    Patch,
    Other,
}

impl UpdateType {
    /// Classify the move from `current` to `latest`.
    ///
    /// Anything that is not a strict bump of a numeric component, including
    /// `latest` refreshes and unknown current versions, lands in `Other`.
    pub fn between(current: &str, latest: &str) -> Self {
        let (Ok(from), Ok(to)) = (parse_version(current), parse_version(latest)) else {
            return UpdateType::Other;
        };
        if from.prerelease.as_deref() == Some(from.original.as_str()) {
            // No digits at all in the current version ("latest", "unknown")
            return UpdateType::Other;
        }
        if to.major > from.major {
            UpdateType::Major
        } else if to.minor > from.minor {
            UpdateType::Minor
        } else if to.patch > from.patch {
            UpdateType::Patch
        } else {
            UpdateType::Other
        }
    }

    /// Section heading used when grouping updates
    pub fn heading(&self) -> &'static str {
        match self {
            UpdateType::Major => "Major Updates",
            UpdateType::Minor => "Minor Updates",
            UpdateType::Patch => "Patch Updates",
            UpdateType::Other => "Other Updates",
        }
    }

    /// All types in display order
    pub fn all() -> &'static [UpdateType] {
        &[
            UpdateType::Major,
            UpdateType::Minor,
            UpdateType::Patch,
            UpdateType::Other,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(a: &str, b: &str) -> Ordering {
        compare_versions(a, b).unwrap()
    }

    #[test]
    fn test_parse_full_semver() {
        let v = parse_version("1.2.3-rc.1+build.5").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (1, 2, 3));
        assert_eq!(v.prerelease.as_deref(), Some("rc.1"));
        assert_eq!(v.build.as_deref(), Some("build.5"));
        assert_eq!(v.original, "1.2.3-rc.1+build.5");
    }

    #[test]
    fn test_parse_partial_semver_defaults_to_zero() {
        let v = parse_version("3.11").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (3, 11, 0));
        assert!(v.prerelease.is_none());
    }

    #[test]
    fn test_parse_bare_integer() {
        let v = parse_version("42").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (42, 0, 0));
    }

    #[test]
    fn test_parse_dotted_date() {
        let v = parse_version("2024.01.15").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2024, 1, 15));
    }

    #[test]
    fn test_parse_digit_extraction() {
        let v = parse_version("unstable-2023-10-01").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (2023, 10, 1));
        assert_eq!(v.prerelease.as_deref(), Some("2023-10-01"));
    }

    #[test]
    fn test_parse_digit_extraction_without_dash() {
        let v = parse_version("r8p2").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (8, 2, 0));
        assert!(v.prerelease.is_none());
    }

    #[test]
    fn test_parse_opaque_string() {
        let v = parse_version("latest").unwrap();
        assert_eq!((v.major, v.minor, v.patch), (0, 0, 0));
        assert_eq!(v.prerelease.as_deref(), Some("latest"));
    }

    #[test]
    fn test_parse_empty_fails() {
        assert!(matches!(parse_version(""), Err(ValidationError::EmptyVersion)));
        assert!(matches!(parse_version("   "), Err(ValidationError::EmptyVersion)));
    }

    #[test]
    fn test_compare_basic() {
        assert_eq!(cmp("1.0.0", "2.0.0"), Ordering::Less);
        assert_eq!(cmp("2.0.0", "1.0.0"), Ordering::Greater);
        assert_eq!(cmp("1.2.0", "1.10.0"), Ordering::Less);
        assert_eq!(cmp("1.0.0", "1.0.0"), Ordering::Equal);
    }

    #[test]
    fn test_compare_prerelease_is_lower() {
        assert_eq!(cmp("1.0.0-alpha", "1.0.0"), Ordering::Less);
        assert_eq!(cmp("1.0.0-alpha", "1.0.0-beta"), Ordering::Less);
    }

    #[test]
    fn test_compare_tie_break_on_original() {
        // Same rank, different spelling
        assert_eq!(cmp("1.0", "1.0.0"), Ordering::Less);
        assert_eq!(cmp("1.0.0", "1.0"), Ordering::Greater);
    }

    #[test]
    fn test_compare_antisymmetric() {
        let samples = [
            "1.0.0",
            "1.0",
            "1.0.0-alpha",
            "1.0.0-beta",
            "2024.01.15",
            "42",
            "latest",
            "unstable-2023-10-01",
            "0.9.9+build",
        ];
        for a in samples {
            assert_eq!(cmp(a, a), Ordering::Equal, "{a} vs itself");
            for b in samples {
                assert_eq!(cmp(a, b), cmp(b, a).reverse(), "{a} vs {b}");
            }
        }
    }

    #[test]
    fn test_find_latest_version() {
        let latest = find_latest_version(&["1.0.0", "2.1.0", "1.5.0", "2.0.0"]).unwrap();
        assert_eq!(latest, "2.1.0");
    }

    #[test]
    fn test_find_latest_version_empty() {
        let empty: [&str; 0] = [];
        assert!(matches!(
            find_latest_version(&empty),
            Err(ValidationError::EmptyVersionList)
        ));
    }

    #[test]
    fn test_update_type_between() {
        assert_eq!(UpdateType::between("18.0.0", "20.10.0"), UpdateType::Major);
        assert_eq!(UpdateType::between("1.2.0", "1.3.0"), UpdateType::Minor);
        assert_eq!(UpdateType::between("1.2.3", "1.2.4"), UpdateType::Patch);
        assert_eq!(UpdateType::between("1.2.3-rc1", "1.2.3"), UpdateType::Other);
        assert_eq!(UpdateType::between("latest", "2.0.0"), UpdateType::Other);
        assert_eq!(UpdateType::between("unknown", "2.0.0"), UpdateType::Other);
    }

    #[test]
    fn test_update_type_heading() {
        assert_eq!(UpdateType::Major.heading(), "Major Updates");
        assert_eq!(UpdateType::all().len(), 4);
    }
}
