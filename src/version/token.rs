//! Extraction of comparable version tokens from free-form vendor text
//!
//! Vendor pages publish versions in many shapes: `"4.2"`, `"11.1.1.42 MR1"`,
//! `"UserGate NGFW 7.1 build 7.1.0.1400 (stable)"`. A [`VersionToken`] keeps the
//! numeric vector used for ordering and the leftover annotation for display.

use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::version::error::VersionError;

static DOTTED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+(?:\.\d+)*").expect("dotted version pattern"));

// `build` may touch the preceding digits when markup is flattened
// ("NGFW 7.1build 7.1.0.1400"), so only a preceding letter disqualifies it.
static BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:^|[^\p{L}])build\s+(\d+(?:\.\d+)*)").expect("build pattern")
});

/// Dotted numeric vector compared with zero padding: `2.3 == 2.3.0`.
#[derive(Debug, Clone)]
pub struct NumericVersion(Vec<u64>);

impl NumericVersion {
    pub fn components(&self) -> &[u64] {
        &self.0
    }

    fn parse(digits: &str, raw: &str) -> Result<Self, VersionError> {
        digits
            .split('.')
            .map(|part| part.parse::<u64>())
            .collect::<Result<Vec<_>, _>>()
            .map(NumericVersion)
            .map_err(|_| VersionError::MalformedVersion(raw.to_string()))
    }
}

impl Ord for NumericVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.0.len().max(other.0.len());
        (0..len)
            .map(|i| {
                let a = self.0.get(i).copied().unwrap_or(0);
                let b = other.0.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for NumericVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for NumericVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for NumericVersion {}

impl fmt::Display for NumericVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(u64::to_string).collect();
        f.write_str(&parts.join("."))
    }
}

/// A raw version string split into its numeric vector and annotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionToken {
    pub numeric: NumericVersion,
    pub annotation: String,
}

impl VersionToken {
    /// Parse the first dotted-numeric run of `raw`.
    ///
    /// Examples:
    /// - `"2.10"` -> [2, 10], annotation `""`
    /// - `"11.1.1.42 MR1"` -> [11, 1, 1, 42], annotation `"MR1"`
    pub fn parse(raw: &str) -> Result<Self, VersionError> {
        let found = DOTTED_RE
            .find(raw)
            .ok_or_else(|| VersionError::MalformedVersion(raw.to_string()))?;

        Ok(Self {
            numeric: NumericVersion::parse(found.as_str(), raw)?,
            annotation: raw[found.end()..].trim().to_string(),
        })
    }

    /// Parse the numeric run following the `build` marker, falling back to
    /// [`VersionToken::parse`] when the marker is absent.
    ///
    /// `"NGFW 7.1 build 7.1.0.1400 stable"` -> [7, 1, 0, 1400], annotation `"stable"`
    pub fn parse_build(raw: &str) -> Result<Self, VersionError> {
        let Some(digits) = BUILD_RE.captures(raw).and_then(|caps| caps.get(1)) else {
            return Self::parse(raw);
        };

        Ok(Self {
            numeric: NumericVersion::parse(digits.as_str(), raw)?,
            annotation: raw[digits.end()..].trim().to_string(),
        })
    }
}
