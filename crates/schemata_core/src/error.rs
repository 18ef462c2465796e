//! Core error types for Schemata.

use std::fmt;

/// Core result type
pub type CoreResult<T> = Result<T, CoreError>;

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Revision is not a valid `YYYY-MM-DD` date
    InvalidRevision { value: String },

    /// Language version is not one of the supported versions
    InvalidVersion { value: String },

    /// Namespace URI is empty or malformed
    InvalidNamespace { value: String },

    /// Identifier does not follow the identifier grammar
    InvalidIdentifier { value: String },

    /// Prefixed name could not be split into prefix and local name
    InvalidPrefixedName { value: String },
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidRevision { value } => {
                write!(f, "Invalid revision '{}': expected YYYY-MM-DD", value)
            }
            Self::InvalidVersion { value } => write!(f, "Unsupported language version '{}'", value),
            Self::InvalidNamespace { value } => write!(f, "Invalid namespace '{}'", value),
            Self::InvalidIdentifier { value } => write!(f, "Invalid identifier '{}'", value),
            Self::InvalidPrefixedName { value } => {
                write!(f, "Invalid prefixed name '{}'", value)
            }
        }
    }
}

impl std::error::Error for CoreError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::InvalidRevision {
            value: "2020-13-01".to_string(),
        };
        assert_eq!(
            format!("{}", err),
            "Invalid revision '2020-13-01': expected YYYY-MM-DD"
        );

        let err = CoreError::InvalidVersion {
            value: "2".to_string(),
        };
        assert_eq!(format!("{}", err), "Unsupported language version '2'");
    }

    #[test]
    fn test_error_equality() {
        let err1 = CoreError::InvalidIdentifier {
            value: "1abc".to_string(),
        };
        let err2 = CoreError::InvalidIdentifier {
            value: "1abc".to_string(),
        };
        assert_eq!(err1, err2);

        let err3 = CoreError::InvalidNamespace {
            value: String::new(),
        };
        assert_ne!(err1, err3);
    }
}
