//! Statement stream sources.
//!
//! A source hands the reactor one raw statement tree: keyword, raw argument,
//! ordered substatements and positions. Tokenizing text into such a tree is
//! the job of whoever implements [`StatementStreamSource`]; the reactor only
//! requires that the tree is fully materialized when asked for.

use crate::error::SourceResult;
use schemata_core::{SourceIdentifier, StatementSourceReference};

/// One raw statement as written in a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    /// Keyword, possibly `prefix:identifier` for extension instances
    pub keyword: String,
    /// Raw argument text
    pub argument: Option<String>,
    /// Substatements in source order
    pub substatements: Vec<RawStatement>,
    /// Position in the source
    pub reference: Option<StatementSourceReference>,
}

impl RawStatement {
    /// Create a statement with an argument
    #[must_use]
    pub fn new(keyword: &str, argument: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            argument: Some(argument.to_string()),
            substatements: Vec::new(),
            reference: None,
        }
    }

    /// Create a statement without an argument
    #[must_use]
    pub fn bare(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            argument: None,
            substatements: Vec::new(),
            reference: None,
        }
    }

    /// Append a substatement
    #[must_use]
    pub fn with(mut self, child: RawStatement) -> Self {
        self.substatements.push(child);
        self
    }

    /// Append several substatements
    #[must_use]
    pub fn with_all(mut self, children: impl IntoIterator<Item = RawStatement>) -> Self {
        self.substatements.extend(children);
        self
    }

    /// Set the position
    #[must_use]
    pub fn at(mut self, reference: StatementSourceReference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Number of statements in this subtree
    #[must_use]
    pub fn len(&self) -> usize {
        1 + self.substatements.iter().map(RawStatement::len).sum::<usize>()
    }

    /// A statement tree is never empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Producer of a raw statement tree
pub trait StatementStreamSource: Send {
    /// Identity used for error attribution before the tree is processed
    fn identifier(&self) -> SourceIdentifier;

    /// Emit the root statement
    ///
    /// # Errors
    ///
    /// Returns error if the source cannot produce a statement tree
    fn emit(&self) -> SourceResult<RawStatement>;
}

/// Source holding an already built statement tree
#[derive(Debug, Clone)]
pub struct InMemorySource {
    identifier: SourceIdentifier,
    root: RawStatement,
}

impl InMemorySource {
    /// Wrap a statement tree
    ///
    /// Statements without a position get one derived from their pre-order
    /// index (as line) and nesting depth (as column), which is what a
    /// pretty-printed rendering of the tree would show.
    #[must_use]
    pub fn new(name: &str, mut root: RawStatement) -> Self {
        let mut line = 0;
        annotate(&mut root, name, 0, &mut line);
        Self {
            identifier: SourceIdentifier::new(name),
            root,
        }
    }

    /// Override the declared identity
    #[must_use]
    pub fn with_identifier(mut self, identifier: SourceIdentifier) -> Self {
        self.identifier = identifier;
        self
    }

    /// Root statement
    #[must_use]
    pub fn root(&self) -> &RawStatement {
        &self.root
    }
}

fn annotate(stmt: &mut RawStatement, source: &str, depth: u32, line: &mut u32) {
    *line += 1;
    if stmt.reference.is_none() {
        stmt.reference = Some(StatementSourceReference::new(source, *line, depth * 2 + 1));
    }
    for child in &mut stmt.substatements {
        annotate(child, source, depth + 1, line);
    }
}

impl StatementStreamSource for InMemorySource {
    fn identifier(&self) -> SourceIdentifier {
        self.identifier.clone()
    }

    fn emit(&self) -> SourceResult<RawStatement> {
        Ok(self.root.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RawStatement {
        RawStatement::new("module", "foo")
            .with(RawStatement::new("namespace", "urn:foo"))
            .with(
                RawStatement::new("container", "c")
                    .with(RawStatement::new("leaf", "l").with(RawStatement::new("type", "string"))),
            )
    }

    #[test]
    fn test_raw_statement_len() {
        assert_eq!(sample().len(), 5);
        assert!(!sample().is_empty());
    }

    #[test]
    fn test_bare_statement() {
        let stmt = RawStatement::bare("input");
        assert!(stmt.argument.is_none());
    }

    #[test]
    fn test_in_memory_source_annotates_positions() {
        let source = InMemorySource::new("foo", sample());
        let root = source.emit().unwrap();
        assert_eq!(root.reference, Some(StatementSourceReference::new("foo", 1, 1)));
        let leaf = &root.substatements[1].substatements[0];
        assert_eq!(leaf.reference, Some(StatementSourceReference::new("foo", 4, 5)));
        assert_eq!(source.identifier(), SourceIdentifier::new("foo"));
    }

    #[test]
    fn test_explicit_position_is_kept() {
        let explicit = StatementSourceReference::new("foo.yang", 10, 2);
        let source = InMemorySource::new(
            "foo",
            RawStatement::new("module", "foo").at(explicit.clone()),
        );
        assert_eq!(source.root().reference, Some(explicit));
    }
}
