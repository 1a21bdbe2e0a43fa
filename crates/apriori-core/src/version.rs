//! Go-flavoured semantic versions.
//!
//! Go module versions are canonical semver strings with a mandatory leading
//! `v` (`v1.2.3`, `v0.4.0-beta.1`). Ordering follows semver precedence, so
//! `v1.10.0` sorts above `v1.9.0` even though it sorts below as a string.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors that can occur when parsing a module version.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    /// The version does not start with `v`.
    #[error("invalid semver {0}")]
    MissingPrefix(String),

    /// The part after `v` is not valid semver syntax.
    #[error("invalid semver {literal}")]
    Syntax { literal: String, reason: String },
}

/// A Go module version: a `v`-prefixed canonical semver string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    inner: semver::Version,
}

impl Version {
    /// Parse a `v`-prefixed semver string.
    ///
    /// # Errors
    ///
    /// Returns an error if the `v` prefix is missing or the remainder is not
    /// valid semver.
    pub fn parse(literal: &str) -> Result<Self, VersionError> {
        let rest = literal
            .strip_prefix('v')
            .ok_or_else(|| VersionError::MissingPrefix(literal.to_string()))?;
        let inner = semver::Version::parse(rest).map_err(|e| VersionError::Syntax {
            literal: literal.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { inner })
    }

    /// Check whether a string is a valid module version.
    #[must_use]
    pub fn is_valid(literal: &str) -> bool {
        Self::parse(literal).is_ok()
    }
}

impl FromStr for Version {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let v = Version::parse("v1.2.3").unwrap();
        assert_eq!(v.to_string(), "v1.2.3");
    }

    #[test]
    fn test_parse_prerelease() {
        let v = Version::parse("v0.4.0-beta.1").unwrap();
        assert_eq!(v.to_string(), "v0.4.0-beta.1");
    }

    #[test]
    fn test_parse_requires_v_prefix() {
        assert!(matches!(
            Version::parse("1.2.3"),
            Err(VersionError::MissingPrefix(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Version::parse("vgarbage").is_err());
        assert!(Version::parse("v1.2").is_err());
        assert!(Version::parse("").is_err());
    }

    #[test]
    fn test_is_valid() {
        assert!(Version::is_valid("v1.0.0"));
        assert!(!Version::is_valid("banana"));
    }

    #[test]
    fn test_semver_ordering_not_lexicographic() {
        // "v1.10.0" < "v1.9.0" as strings, but 1.10.0 > 1.9.0 as versions.
        let older = Version::parse("v1.9.0").unwrap();
        let newer = Version::parse("v1.10.0").unwrap();
        assert!(newer > older);
    }

    #[test]
    fn test_prerelease_sorts_below_release() {
        let pre = Version::parse("v1.0.0-rc.1").unwrap();
        let rel = Version::parse("v1.0.0").unwrap();
        assert!(pre < rel);
    }
}
