//! Total ordering over raw vendor version strings

use std::cmp::Ordering;

use crate::version::error::VersionError;
use crate::version::token::VersionToken;

/// How a source's raw version text is turned into a [`VersionToken`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionScheme {
    /// First dotted-numeric run in the text
    Dotted,
    /// Numeric run after the `build` marker, else the first dotted-numeric run
    BuildNumber,
}

impl VersionScheme {
    pub fn parse(&self, raw: &str) -> Result<VersionToken, VersionError> {
        match self {
            VersionScheme::Dotted => VersionToken::parse(raw),
            VersionScheme::BuildNumber => VersionToken::parse_build(raw),
        }
    }

    /// Compare two raw versions by their numeric vectors.
    ///
    /// Annotations never take part in the ordering.
    pub fn compare(&self, a: &str, b: &str) -> Result<Ordering, VersionError> {
        let a = self.parse(a)?;
        let b = self.parse(b)?;
        Ok(a.numeric.cmp(&b.numeric))
    }

    /// Compare a candidate against a possibly missing baseline.
    ///
    /// A missing or blank baseline is older than any well-formed candidate.
    pub fn compare_optional(
        &self,
        candidate: &str,
        baseline: Option<&str>,
    ) -> Result<Ordering, VersionError> {
        let candidate = self.parse(candidate)?;
        match baseline.filter(|v| !v.trim().is_empty()) {
            None => Ok(Ordering::Greater),
            Some(baseline) => Ok(candidate.numeric.cmp(&self.parse(baseline)?.numeric)),
        }
    }

    /// Returns the highest well-formed version, ignoring malformed ones.
    pub fn highest<'a, I>(&self, versions: I) -> Option<&'a str>
    where
        I: IntoIterator<Item = &'a str>,
    {
        versions
            .into_iter()
            .filter_map(|v| self.parse(v).ok().map(|token| (v, token)))
            .max_by(|(_, a), (_, b)| a.numeric.cmp(&b.numeric))
            .map(|(v, _)| v)
    }
}

/// Compare two raw versions with the dotted scheme.
pub fn compare(a: &str, b: &str) -> Result<Ordering, VersionError> {
    VersionScheme::Dotted.compare(a, b)
}

/// How much a [`Comparison`] can be trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// Both sides parsed as dotted-numeric versions
    Exact,
    /// At least one side did not parse; raw text was compared lexicographically
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Comparison {
    pub ordering: Ordering,
    pub confidence: Confidence,
}

/// Compare numerically when possible, otherwise fall back to raw text order.
///
/// Only for reporting. The update pipeline never trusts a degraded result.
pub fn compare_lenient(scheme: VersionScheme, a: &str, b: &str) -> Comparison {
    match scheme.compare(a, b) {
        Ok(ordering) => Comparison {
            ordering,
            confidence: Confidence::Exact,
        },
        Err(_) => Comparison {
            ordering: a.trim().cmp(b.trim()),
            confidence: Confidence::Degraded,
        },
    }
}
