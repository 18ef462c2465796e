//! Source identity and statement positions.

use crate::qname::intern;
use crate::revision::Revision;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

/// Identity of one schema source: name plus optional revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceIdentifier {
    name: Arc<str>,
    revision: Option<Revision>,
}

impl SourceIdentifier {
    /// Create an identifier without a revision
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: intern(name),
            revision: None,
        }
    }

    /// Create an identifier with an optional revision
    #[must_use]
    pub fn with_revision(name: &str, revision: Option<Revision>) -> Self {
        Self {
            name: intern(name),
            revision,
        }
    }

    /// Source name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source revision, if specified
    #[must_use]
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }
}

impl fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(rev) => write!(f, "{}@{}", self.name, rev),
            None => f.write_str(&self.name),
        }
    }
}

impl Serialize for SourceIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SourceIdentifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.split_once('@') {
            Some((name, rev)) => Ok(Self::with_revision(
                name,
                Some(Revision::parse(rev).map_err(serde::de::Error::custom)?),
            )),
            None => Ok(Self::new(&s)),
        }
    }
}

/// Position of a statement in its source document
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatementSourceReference {
    /// Name of the source document
    pub source: String,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl StatementSourceReference {
    /// Create a reference
    #[must_use]
    pub fn new(source: impl Into<String>, line: u32, column: u32) -> Self {
        Self {
            source: source.into(),
            line,
            column,
        }
    }
}

impl fmt::Display for StatementSourceReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_identifier_display() {
        let id = SourceIdentifier::new("foo");
        assert_eq!(id.to_string(), "foo");

        let rev = Revision::parse("2020-01-01").unwrap();
        let id = SourceIdentifier::with_revision("foo", Some(rev));
        assert_eq!(id.to_string(), "foo@2020-01-01");
        assert_eq!(id.revision(), Some(rev));
    }

    #[test]
    fn test_source_identifier_equality() {
        let rev = Revision::parse("2020-01-01").unwrap();
        assert_eq!(
            SourceIdentifier::with_revision("foo", Some(rev)),
            SourceIdentifier::with_revision("foo", Some(rev))
        );
        assert_ne!(
            SourceIdentifier::new("foo"),
            SourceIdentifier::with_revision("foo", Some(rev))
        );
    }

    #[test]
    fn test_source_identifier_serde() {
        let revision = Revision::parse("2021-06-01").unwrap();
        let id = SourceIdentifier::with_revision("bar", Some(revision));
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"bar@2021-06-01\"");
        let back: SourceIdentifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn test_reference_display() {
        let r = StatementSourceReference::new("foo.yang", 3, 5);
        assert_eq!(r.to_string(), "foo.yang:3:5");
    }
}
