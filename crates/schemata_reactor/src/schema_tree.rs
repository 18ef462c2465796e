//! Schema tree lookup across sources.

use crate::error::SourceResult;
use crate::namespaces::SchemaTreeNamespace;
use crate::state::BuildState;
use crate::stmt::StmtId;
use schemata_core::QName;

/// Walk `path` from `root` through schema-tree namespaces
///
/// A step missing from the namespace may still match an extension instance
/// whose raw argument equals the step's local name; the walk continues from
/// that instance. Reaching an extension instance does not end the walk: the
/// remaining steps must resolve beneath it. Returns `None` if any step
/// matches neither way.
///
/// # Errors
///
/// Returns error if the schema-tree namespace is not available
pub fn find_node(state: &BuildState, root: StmtId, path: &[QName]) -> SourceResult<Option<StmtId>> {
    let mut current = root;
    for step in path {
        if let Some(next) = state.get::<SchemaTreeNamespace>(current, step)? {
            current = next;
            continue;
        }
        let fallback = state
            .stmt(current)
            .children()
            .find(|c| c.is_unknown() && c.raw_argument() == Some(step.local_name()));
        match fallback {
            Some(unknown) => current = unknown.id(),
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
