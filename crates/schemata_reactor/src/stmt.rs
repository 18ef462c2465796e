//! Statement contexts.
//!
//! Every statement of every source lives in one arena owned by the build and
//! is addressed by a [`StmtId`]. Nodes are created once, while a source's
//! tree is loaded for PRE_LINKAGE, and are never removed.

use crate::namespace::NamespaceStorage;
use crate::support::StatementSupport;
use schemata_core::{
    ModelProcessingPhase, QName, QNameModule, Revision, StatementSourceReference, XmlNamespace,
    YangVersion,
};
use std::fmt;
use std::sync::Arc;

/// Namespace of the built-in keywords
pub const YANG_NAMESPACE: &str = "urn:ietf:params:xml:ns:yang:1";

/// Module owning the built-in keywords
#[must_use]
pub fn yang_module() -> QNameModule {
    QNameModule::new(XmlNamespace::from_static(YANG_NAMESPACE), None)
}

/// Handle of a statement in the build arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StmtId(pub(crate) u32);

impl StmtId {
    /// Arena index
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for StmtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle of a registered source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceKey(pub(crate) u32);

impl SourceKey {
    /// Registration index
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Parsed form of a statement argument
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ArgumentValue {
    /// Statement takes no argument
    #[default]
    None,
    /// Free text or identifier
    Text(Arc<str>),
    /// Revision date
    Revision(Revision),
    /// Language version
    Version(YangVersion),
    /// Namespace URI
    Namespace(XmlNamespace),
    /// Absolute schema node identifier, prefixes still unresolved
    Path(Vec<PrefixedName>),
}

impl ArgumentValue {
    /// Text form, if the argument is textual
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Revision, if the argument is a revision
    #[must_use]
    pub fn as_revision(&self) -> Option<Revision> {
        match self {
            Self::Revision(rev) => Some(*rev),
            _ => None,
        }
    }
}

/// `prefix:name` as written in a source
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PrefixedName {
    /// Prefix, if any
    pub prefix: Option<String>,
    /// Local name
    pub local: String,
}

impl fmt::Display for PrefixedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.prefix {
            Some(prefix) => write!(f, "{}:{}", prefix, self.local),
            None => f.write_str(&self.local),
        }
    }
}

/// How an effective statement came to be where it is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StatementOrigin {
    /// Written at this position
    #[default]
    Declared,
    /// Placed here by an augment
    AddedByAugmentation,
    /// Merged into a module from one of its submodules
    IncludedFromSubmodule,
}

/// One statement occurrence
pub(crate) struct StmtNode {
    pub(crate) raw_keyword: String,
    pub(crate) prefix: Option<String>,
    pub(crate) local: String,
    pub(crate) keyword: Option<QName>,
    pub(crate) definition: Option<Arc<StatementSupport>>,
    pub(crate) raw_argument: Option<String>,
    pub(crate) argument: ArgumentValue,
    pub(crate) parent: Option<StmtId>,
    pub(crate) children: Vec<StmtId>,
    pub(crate) source: SourceKey,
    pub(crate) reference: Option<StatementSourceReference>,
    /// Last phase whose hooks ran for this node
    pub(crate) hooked: Option<ModelProcessingPhase>,
    pub(crate) storage: NamespaceStorage,
    pub(crate) supported: bool,
    pub(crate) unknown: bool,
    pub(crate) additions: Vec<(StmtId, StatementOrigin)>,
}

impl StmtNode {
    pub(crate) fn new(
        raw_keyword: String,
        raw_argument: Option<String>,
        parent: Option<StmtId>,
        source: SourceKey,
        reference: Option<StatementSourceReference>,
    ) -> Self {
        let (prefix, local) = match raw_keyword.split_once(':') {
            Some((prefix, local)) => (Some(prefix.to_string()), local.to_string()),
            None => (None, raw_keyword.clone()),
        };
        Self {
            raw_keyword,
            prefix,
            local,
            keyword: None,
            definition: None,
            raw_argument,
            argument: ArgumentValue::None,
            parent,
            children: Vec::new(),
            source,
            reference,
            hooked: None,
            storage: NamespaceStorage::new(),
            supported: true,
            unknown: false,
            additions: Vec::new(),
        }
    }
}

impl fmt::Debug for StmtNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StmtNode")
            .field("keyword", &self.raw_keyword)
            .field("argument", &self.raw_argument)
            .field("children", &self.children.len())
            .field("hooked", &self.hooked)
            .finish()
    }
}
