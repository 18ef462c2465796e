//! Language version of a schema source.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Schema language version, selected by the `yang-version` statement
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum YangVersion {
    /// Version 1 (the default when no version statement is present)
    #[default]
    #[serde(rename = "1")]
    V1,
    /// Version 1.1
    #[serde(rename = "1.1")]
    V1_1,
}

impl YangVersion {
    /// All known versions, oldest first
    pub const ALL: [YangVersion; 2] = [YangVersion::V1, YangVersion::V1_1];

    /// Parse from the argument of a version statement
    ///
    /// # Errors
    ///
    /// Returns error if the version is unknown
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "1" => Ok(Self::V1),
            "1.1" => Ok(Self::V1_1),
            other => Err(CoreError::InvalidVersion {
                value: other.to_string(),
            }),
        }
    }

    /// Canonical string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::V1 => "1",
            Self::V1_1 => "1.1",
        }
    }
}

impl fmt::Display for YangVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for YangVersion {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!(YangVersion::parse("1").unwrap(), YangVersion::V1);
        assert_eq!(YangVersion::parse("1.1").unwrap(), YangVersion::V1_1);
    }

    #[test]
    fn test_version_display() {
        assert_eq!(format!("{}", YangVersion::V1_1), "1.1");
    }

    #[test]
    fn test_version_ord() {
        assert!(YangVersion::V1 < YangVersion::V1_1);
    }

    #[test]
    fn test_version_parse_error() {
        let result = YangVersion::parse("2");
        assert!(matches!(result, Err(CoreError::InvalidVersion { .. })));
    }

    #[test]
    fn test_version_default() {
        assert_eq!(YangVersion::default(), YangVersion::V1);
    }
}
