//! Helpers shared by the statement supports.

use crate::namespaces::SubmoduleOwner;
use schemata_core::{QName, QNameModule, Revision, SourceIdentifier};
use schemata_reactor::namespaces::{ModuleCtxToModuleQName, PrefixToModule};
use schemata_reactor::{SourceError, SourceResult, StmtContext, StmtContextMut, yang_module};

/// Keywords of statements that define schema nodes
pub const SCHEMA_NODES: [&str; 4] = ["container", "list", "leaf", "leaf-list"];

/// Identity of a built-in keyword
#[must_use]
pub fn keyword(name: &'static str) -> QName {
    QName::from_static(yang_module(), name)
}

/// Raw argument of the statement, or an empty string
pub(crate) fn argument(ctx: &StmtContextMut<'_>) -> String {
    ctx.view().raw_argument().unwrap_or_default().to_string()
}

/// Revision named by a `revision-date` substatement
pub(crate) fn revision_date(ctx: &StmtContext<'_>) -> SourceResult<Option<Revision>> {
    let Some(date) = ctx.first_child("revision-date") else {
        return Ok(None);
    };
    let raw = date.raw_argument().unwrap_or_default();
    Revision::parse(raw)
        .map(Some)
        .map_err(|err| SourceError::at(err.to_string(), date.reference()))
}

/// Identity a linkage statement asks for
pub(crate) fn linked_source(ctx: &StmtContext<'_>) -> SourceResult<SourceIdentifier> {
    let name = ctx.raw_argument().unwrap_or_default();
    Ok(SourceIdentifier::with_revision(name, revision_date(ctx)?))
}

/// Module identity the statement's names belong to
///
/// Statements of a submodule belong to the module the submodule is part of.
///
/// # Errors
///
/// Returns error if the identity has not been established yet
pub fn module_of(ctx: &StmtContext<'_>) -> SourceResult<QNameModule> {
    let root = ctx.root();
    let module = match root.raw_keyword() {
        "submodule" => ctx.state().get_global::<SubmoduleOwner>(&root.id())?,
        _ => ctx.state().get_global::<ModuleCtxToModuleQName>(&root.id())?,
    };
    module.ok_or_else(|| {
        SourceError::at(
            format!(
                "{} {} has no module identity",
                root.raw_keyword(),
                root.raw_argument().unwrap_or_default()
            ),
            root.reference(),
        )
    })
}

/// Resolve `prefix:local`, or `local` in the statement's own module
///
/// # Errors
///
/// Returns error if the prefix is not bound in the source
pub fn resolve_qname(
    ctx: &StmtContext<'_>,
    prefix: Option<&str>,
    local: &str,
) -> SourceResult<QName> {
    let module = match prefix {
        Some(prefix) => ctx.get::<PrefixToModule>(&prefix.to_string())?.ok_or_else(|| {
            SourceError::at(format!("Prefix {} is not bound", prefix), ctx.reference())
        })?,
        None => module_of(ctx)?,
    };
    Ok(QName::create(module, local)?)
}

/// Schema node name of a statement
pub(crate) fn node_name(ctx: &StmtContext<'_>) -> SourceResult<QName> {
    Ok(QName::create(module_of(ctx)?, ctx.raw_argument().unwrap_or_default())?)
}
