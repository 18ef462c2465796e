//! Linkage statements.
//!
//! `module` and `submodule` establish source identity in PRE_LINKAGE and
//! publish their roots in LINKAGE. `import`, `include` and `belongs-to`
//! record the sources they need in PRE_LINKAGE, which drives library
//! promotion, and bind to the published roots in LINKAGE.

use crate::common::{SCHEMA_NODES, argument, keyword, linked_source, module_of, revision_date};
use crate::namespaces::{
    IncludedSubmodule, LatestModuleNamespace, LatestSubmoduleNamespace, ModuleAugmentations,
    ModuleNamespace, ModuleRevisionsNamespace, NamespaceToModule, SubmoduleNamespace,
    SubmoduleOwner,
};
use schemata_core::{ModelProcessingPhase, QName, QNameModule, SourceIdentifier, XmlNamespace};
use schemata_reactor::namespaces::{ModuleCtxToModuleQName, PrefixToModule, SchemaTreeNamespace};
use schemata_reactor::support::{
    parse_identifier, parse_namespace, parse_revision, parse_text, parse_version,
};
use schemata_reactor::{
    EffectiveStatement, Facet, ModelAction, Requirement, SealableList, SourceError, SourceResult,
    StatementOrigin, StatementSupport, StmtContext, StmtContextMut, StmtId, SubstatementValidator,
};
use std::sync::Arc;
use tracing::trace;

/// Substatements shared by `module` and `submodule`
fn body(validator: SubstatementValidator) -> SubstatementValidator {
    validator
        .add_optional("yang-version")
        .add_optional("description")
        .add_any("revision")
        .add_any("import")
        .add_any("include")
        .add_any("extension")
        .add_any("feature")
        .add_any("container")
        .add_any("list")
        .add_any("leaf")
        .add_any("leaf-list")
        .add_any("augment")
}

fn module_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let name = view.raw_argument().unwrap_or_default().to_string();
    let revision = view.latest_revision();
    let Some(namespace) = view.first_child("namespace") else {
        return Err(SourceError::at(
            format!("Module {} has no namespace statement", name),
            view.reference(),
        ));
    };
    let namespace = XmlNamespace::of(namespace.raw_argument().unwrap_or_default())
        .map_err(|err| SourceError::at(err.to_string(), namespace.reference()))?;
    let prefix = view.first_child("prefix").and_then(|p| p.raw_argument()).map(str::to_string);

    let id = ctx.id();
    let module = QNameModule::new(namespace, revision);
    ctx.set_root_identifier(SourceIdentifier::with_revision(&name, revision));
    ctx.put::<ModuleCtxToModuleQName>(id, module.clone())?;
    if let Some(prefix) = prefix {
        ctx.put::<PrefixToModule>(prefix, module)?;
    }
    let log = Arc::new(SealableList::new());
    ctx.add_mutable(log.clone());
    ctx.put::<ModuleAugmentations>(id, log)
}

fn module_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let id = ctx.id();
    let identifier = SourceIdentifier::with_revision(&argument(ctx), ctx.view().latest_revision());
    let module = ctx
        .get::<ModuleCtxToModuleQName>(&id)?
        .ok_or_else(|| SourceError::internal(format!("Module {} lost its identity", identifier)))?;
    trace!(module = %identifier, "Linking module");
    ctx.put::<ModuleNamespace>(identifier, id)?;
    ctx.put::<NamespaceToModule>(module, id)
}

fn module_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    let module = module_of(ctx)?;
    let mut effective = effective.with_facet(Facet::Module(module));
    if let Some(log) = ctx.state().get_global::<ModuleAugmentations>(&ctx.id())? {
        effective = effective.with_facet(Facet::Augmentations(log));
    }
    Ok(effective)
}

fn submodule_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let identifier = SourceIdentifier::with_revision(&argument(ctx), ctx.view().latest_revision());
    ctx.set_root_identifier(identifier);
    Ok(())
}

fn submodule_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let id = ctx.id();
    let identifier = SourceIdentifier::with_revision(&argument(ctx), ctx.view().latest_revision());
    ctx.put::<SubmoduleNamespace>(identifier, id)
}

fn prefix_of(ctx: &StmtContext<'_>) -> SourceResult<String> {
    ctx.first_child("prefix")
        .and_then(|p| p.raw_argument())
        .map(str::to_string)
        .ok_or_else(|| {
            let name = ctx.raw_argument().unwrap_or_default();
            SourceError::at(
                format!("{} {} has no prefix", ctx.raw_keyword(), name),
                ctx.reference(),
            )
        })
}

/// Module identity of a resolved module root
fn identity_of(ctx: &StmtContextMut<'_>, root: StmtId) -> SourceResult<QNameModule> {
    ctx.get::<ModuleCtxToModuleQName>(&root)?
        .ok_or_else(|| SourceError::internal(format!("Module root {} has no identity", root)))
}

fn belongs_to_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let owner = SourceIdentifier::new(&argument(ctx));
    ctx.add_required_source(owner);
    Ok(())
}

fn belongs_to_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let owner = argument(ctx);
    let prefix = prefix_of(&ctx.view())?;
    let submodule = ctx.view().root().id();
    let action = ModelAction::new(
        ctx.id(),
        ModelProcessingPhase::Linkage,
        format!("Belongs-to {}", owner),
        move |ctx, resolved| {
            let module = identity_of(ctx, resolved[0])?;
            ctx.put::<PrefixToModule>(prefix, module.clone())?;
            ctx.put_at::<SubmoduleOwner>(submodule, submodule, module)
        },
    )
    .requires(Requirement::global::<LatestModuleNamespace>(owner));
    ctx.add_action(action);
    Ok(())
}

fn belongs_to_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    let prefix = prefix_of(ctx)?;
    let module = module_of(ctx)?;
    Ok(effective.with_facet(Facet::BelongsTo { prefix, module }))
}

fn import_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let required = linked_source(&ctx.view())?;
    ctx.add_required_source(required);
    Ok(())
}

fn import_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let wanted = linked_source(&view)?;
    let prefix = prefix_of(&view)?;
    let requirement = match wanted.revision() {
        Some(_) => Requirement::global::<ModuleNamespace>(wanted.clone()),
        None => Requirement::global::<LatestModuleNamespace>(wanted.name().to_string()),
    };
    let action = ModelAction::new(
        ctx.id(),
        ModelProcessingPhase::Linkage,
        format!("Import of {}", wanted),
        move |ctx, resolved| {
            let module = identity_of(ctx, resolved[0])?;
            ctx.put::<PrefixToModule>(prefix, module)
        },
    )
    .requires(requirement);
    ctx.add_action(action);
    Ok(())
}

/// Imports without a revision must be unambiguous under semantic versioning
fn import_statement_definition(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    if !ctx.config().semantic_versioning() {
        return Ok(());
    }
    let view = ctx.view();
    if revision_date(&view)?.is_some() {
        return Ok(());
    }
    let name = view.raw_argument().unwrap_or_default().to_string();
    let revisions = ctx.get::<ModuleRevisionsNamespace>(&name)?.unwrap_or_default();
    if revisions.len() > 1 {
        return Err(SourceError::at(
            format!(
                "Ambiguous import of {}: {} revisions are available and no revision-date is given",
                name,
                revisions.len()
            ),
            view.reference(),
        ));
    }
    Ok(())
}

fn import_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    let prefix = prefix_of(ctx)?;
    let module = ctx
        .get::<PrefixToModule>(&prefix)?
        .ok_or_else(|| {
            SourceError::at(format!("Prefix {} is not bound", prefix), ctx.reference())
        })?;
    Ok(effective.with_facet(Facet::Import { prefix, module }))
}

fn include_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let required = linked_source(&ctx.view())?;
    ctx.add_required_source(required);
    Ok(())
}

fn include_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let wanted = linked_source(&ctx.view())?;
    let requirement = match wanted.revision() {
        Some(_) => Requirement::global::<SubmoduleNamespace>(wanted.clone()),
        None => Requirement::global::<LatestSubmoduleNamespace>(wanted.name().to_string()),
    };
    let action = ModelAction::new(
        ctx.id(),
        ModelProcessingPhase::Linkage,
        format!("Include of {}", wanted),
        |ctx, resolved| ctx.put::<IncludedSubmodule>((), resolved[0]),
    )
    .requires(requirement);
    ctx.add_action(action);
    Ok(())
}

/// Make the submodule's schema nodes children of the including root
fn include_full_declaration(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let submodule = ctx
        .get::<IncludedSubmodule>(&())?
        .ok_or_else(|| SourceError::internal("Include finished linkage without a submodule"))?;
    let module = module_of(&view)?;
    let owner = module_of(&ctx.stmt(submodule))?;
    if owner != module {
        return Err(SourceError::at(
            format!(
                "Submodule {} belongs to {}, not {}",
                view.raw_argument().unwrap_or_default(),
                owner,
                module
            ),
            view.reference(),
        ));
    }
    let root = view.root().id();
    let nodes = ctx
        .stmt(submodule)
        .children()
        .filter(|c| SCHEMA_NODES.contains(&c.raw_keyword()))
        .map(|c| Ok((c.id(), QName::create(module.clone(), c.raw_argument().unwrap_or_default())?)))
        .collect::<SourceResult<Vec<_>>>()?;
    for (node, name) in nodes {
        ctx.put_at::<SchemaTreeNamespace>(root, name, node)?;
        ctx.add_effective_child(root, node, StatementOrigin::IncludedFromSubmodule);
    }
    Ok(())
}

fn include_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    Ok(effective.with_facet(Facet::Include(linked_source(ctx)?)))
}

/// Supports needed from PRE_LINKAGE on
#[must_use]
pub fn linkage_supports() -> Vec<StatementSupport> {
    vec![
        StatementSupport::builder(keyword("module"))
            .argument(parse_identifier)
            .validator(body(
                SubstatementValidator::new()
                    .add_mandatory("namespace")
                    .add_mandatory("prefix"),
            ))
            .on_phase(ModelProcessingPhase::PreLinkage, module_pre_linkage)
            .on_phase(ModelProcessingPhase::Linkage, module_linkage)
            .effective(module_effective)
            .build(),
        StatementSupport::builder(keyword("submodule"))
            .argument(parse_identifier)
            .validator(body(SubstatementValidator::new().add_mandatory("belongs-to")))
            .on_phase(ModelProcessingPhase::PreLinkage, submodule_pre_linkage)
            .on_phase(ModelProcessingPhase::Linkage, submodule_linkage)
            .build(),
        StatementSupport::builder(keyword("belongs-to"))
            .argument(parse_identifier)
            .validator(SubstatementValidator::new().add_mandatory("prefix"))
            .on_phase(ModelProcessingPhase::PreLinkage, belongs_to_pre_linkage)
            .on_phase(ModelProcessingPhase::Linkage, belongs_to_linkage)
            .effective(belongs_to_effective)
            .build(),
        StatementSupport::builder(keyword("import"))
            .argument(parse_identifier)
            .validator(
                SubstatementValidator::new()
                    .add_mandatory("prefix")
                    .add_optional("revision-date")
                    .add_optional("description"),
            )
            .on_phase(ModelProcessingPhase::PreLinkage, import_pre_linkage)
            .on_phase(ModelProcessingPhase::Linkage, import_linkage)
            .on_phase(ModelProcessingPhase::StatementDefinition, import_statement_definition)
            .effective(import_effective)
            .build(),
        StatementSupport::builder(keyword("include"))
            .argument(parse_identifier)
            .validator(
                SubstatementValidator::new()
                    .add_optional("revision-date")
                    .add_optional("description"),
            )
            .on_phase(ModelProcessingPhase::PreLinkage, include_pre_linkage)
            .on_phase(ModelProcessingPhase::Linkage, include_linkage)
            .on_phase(ModelProcessingPhase::FullDeclaration, include_full_declaration)
            .effective(include_effective)
            .build(),
        StatementSupport::builder(keyword("namespace"))
            .argument(parse_namespace)
            .build(),
        StatementSupport::builder(keyword("prefix"))
            .argument(parse_identifier)
            .build(),
        StatementSupport::builder(keyword("revision"))
            .argument(parse_revision)
            .validator(SubstatementValidator::new().add_optional("description"))
            .build(),
        StatementSupport::builder(keyword("revision-date"))
            .argument(parse_revision)
            .build(),
        StatementSupport::builder(keyword("yang-version"))
            .argument(parse_version)
            .build(),
        StatementSupport::builder(keyword("description"))
            .argument(parse_text)
            .build(),
    ]
}
