//! Qualified names.
//!
//! A [`QName`] is the identity of a statement keyword or of a named schema
//! node: a module (namespace plus optional revision) and a local name.
//! Namespace URIs and local names are interned process-wide, so equal names
//! share their backing storage and cloning a `QName` only bumps refcounts.

use crate::error::{CoreError, CoreResult};
use crate::revision::Revision;
use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

static INTERNER: Lazy<Mutex<HashSet<Arc<str>>>> = Lazy::new(|| Mutex::new(HashSet::new()));

/// Intern a string, returning the canonical shared instance
pub fn intern(value: &str) -> Arc<str> {
    // A poisoned interner still holds valid strings
    let mut set = INTERNER.lock().unwrap_or_else(|e| e.into_inner());
    if let Some(existing) = set.get(value) {
        return Arc::clone(existing);
    }
    let shared: Arc<str> = Arc::from(value);
    set.insert(Arc::clone(&shared));
    shared
}

/// Check whether a string follows the identifier grammar
/// (`[A-Za-z_][A-Za-z0-9_.-]*`)
#[must_use]
pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Split `prefix:name` into its parts; an unprefixed name yields `None`
///
/// # Errors
///
/// Returns error if either part is not a valid identifier
pub fn split_prefixed(value: &str) -> CoreResult<(Option<&str>, &str)> {
    let (prefix, local) = match value.split_once(':') {
        Some((prefix, local)) => (Some(prefix), local),
        None => (None, value),
    };
    if !is_identifier(local) || prefix.is_some_and(|p| !is_identifier(p)) {
        return Err(CoreError::InvalidPrefixedName {
            value: value.to_string(),
        });
    }
    Ok((prefix, local))
}

/// Namespace URI of a module
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct XmlNamespace(Arc<str>);

impl XmlNamespace {
    /// Create an interned namespace
    ///
    /// # Errors
    ///
    /// Returns error if the namespace is empty or contains whitespace
    pub fn of(uri: &str) -> CoreResult<Self> {
        if uri.is_empty() || uri.chars().any(char::is_whitespace) {
            return Err(CoreError::InvalidNamespace {
                value: uri.to_string(),
            });
        }
        Ok(Self(intern(uri)))
    }

    /// Create a namespace from a compile-time constant without validation
    #[must_use]
    pub fn from_static(uri: &'static str) -> Self {
        Self(intern(uri))
    }

    /// Get as string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for XmlNamespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Module identity: namespace plus optional revision
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QNameModule {
    namespace: XmlNamespace,
    revision: Option<Revision>,
}

impl QNameModule {
    /// Create a module identity
    #[must_use]
    pub fn new(namespace: XmlNamespace, revision: Option<Revision>) -> Self {
        Self {
            namespace,
            revision,
        }
    }

    /// Module namespace
    #[must_use]
    pub fn namespace(&self) -> &XmlNamespace {
        &self.namespace
    }

    /// Module revision, if any
    #[must_use]
    pub fn revision(&self) -> Option<Revision> {
        self.revision
    }
}

impl fmt::Display for QNameModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.revision {
            Some(rev) => write!(f, "{}?revision={}", self.namespace, rev),
            None => write!(f, "{}", self.namespace),
        }
    }
}

impl Serialize for QNameModule {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QNameModule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        parse_module(&s).map_err(serde::de::Error::custom)
    }
}

fn parse_module(s: &str) -> CoreResult<QNameModule> {
    match s.split_once("?revision=") {
        Some((ns, rev)) => Ok(QNameModule::new(
            XmlNamespace::of(ns)?,
            Some(Revision::parse(rev)?),
        )),
        None => Ok(QNameModule::new(XmlNamespace::of(s)?, None)),
    }
}

/// Qualified name: module plus local name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QName {
    module: QNameModule,
    local_name: Arc<str>,
}

impl QName {
    /// Create a qualified name in the given module
    ///
    /// # Errors
    ///
    /// Returns error if the local name is not a valid identifier
    pub fn create(module: QNameModule, local_name: &str) -> CoreResult<Self> {
        if !is_identifier(local_name) {
            return Err(CoreError::InvalidIdentifier {
                value: local_name.to_string(),
            });
        }
        Ok(Self {
            module,
            local_name: intern(local_name),
        })
    }

    /// Create a name from a compile-time constant without validation
    #[must_use]
    pub fn from_static(module: QNameModule, local_name: &'static str) -> Self {
        Self {
            module,
            local_name: intern(local_name),
        }
    }

    /// Module this name belongs to
    #[must_use]
    pub fn module(&self) -> &QNameModule {
        &self.module
    }

    /// Namespace of the owning module
    #[must_use]
    pub fn namespace(&self) -> &XmlNamespace {
        self.module.namespace()
    }

    /// Revision of the owning module
    #[must_use]
    pub fn revision(&self) -> Option<Revision> {
        self.module.revision()
    }

    /// Local name
    #[must_use]
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// Re-bind this local name into another module
    #[must_use]
    pub fn bind_to(&self, module: QNameModule) -> Self {
        Self {
            module,
            local_name: Arc::clone(&self.local_name),
        }
    }
}

impl fmt::Display for QName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}){}", self.module, self.local_name)
    }
}

impl FromStr for QName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CoreError::InvalidPrefixedName {
            value: s.to_string(),
        };
        let rest = s.strip_prefix('(').ok_or_else(invalid)?;
        let (module, local) = rest.split_once(')').ok_or_else(invalid)?;
        Self::create(parse_module(module)?, local)
    }
}

impl Serialize for QName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for QName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(ns: &str, rev: Option<&str>) -> QNameModule {
        QNameModule::new(
            XmlNamespace::of(ns).unwrap(),
            rev.map(|r| Revision::parse(r).unwrap()),
        )
    }

    #[test]
    fn test_identifier_grammar() {
        assert!(is_identifier("foo"));
        assert!(is_identifier("_foo-bar.baz1"));
        assert!(!is_identifier("1foo"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("foo bar"));
    }

    #[test]
    fn test_split_prefixed() {
        assert_eq!(split_prefixed("br:ifEntry").unwrap(), (Some("br"), "ifEntry"));
        assert_eq!(split_prefixed("ifEntry").unwrap(), (None, "ifEntry"));
        assert!(split_prefixed("br:").is_err());
        assert!(split_prefixed(":x").is_err());
    }

    #[test]
    fn test_interned_names_share_storage() {
        let m = module("urn:foo", None);
        let a = QName::create(m.clone(), "interfaces").unwrap();
        let b = QName::create(m, "interfaces").unwrap();
        assert_eq!(a, b);
        assert!(Arc::ptr_eq(&a.local_name, &b.local_name));
    }

    #[test]
    fn test_qname_display_and_parse() {
        let q = QName::create(module("urn:foo", Some("2013-10-13")), "bar").unwrap();
        let s = q.to_string();
        assert_eq!(s, "(urn:foo?revision=2013-10-13)bar");
        assert_eq!(s.parse::<QName>().unwrap(), q);

        let q = QName::create(module("urn:foo", None), "bar").unwrap();
        assert_eq!(q.to_string().parse::<QName>().unwrap(), q);
    }

    #[test]
    fn test_qname_rejects_bad_local_name() {
        assert!(QName::create(module("urn:foo", None), "not valid").is_err());
    }

    #[test]
    fn test_from_static_matches_create() {
        let m = module("urn:foo", None);
        assert_eq!(
            QName::from_static(m.clone(), "leaf-list"),
            QName::create(m, "leaf-list").unwrap()
        );
    }

    #[test]
    fn test_bind_to() {
        let q = QName::create(module("urn:foo", None), "leaf1").unwrap();
        let rebound = q.bind_to(module("urn:bar", None));
        assert_eq!(rebound.local_name(), "leaf1");
        assert_eq!(rebound.namespace().as_str(), "urn:bar");
    }

    #[test]
    fn test_qname_serde() {
        let q = QName::create(module("urn:foo", Some("2020-01-01")), "x").unwrap();
        let json = serde_json::to_string(&q).unwrap();
        let back: QName = serde_json::from_str(&json).unwrap();
        assert_eq!(back, q);
    }
}
