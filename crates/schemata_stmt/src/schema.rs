//! Schema nodes, augments and feature conditions.
//!
//! Schema nodes register themselves in their parent's schema tree during
//! FULL_DECLARATION. An `augment` resolves its target path against the
//! target module's tree, which may only become complete after other
//! augments, possibly from other sources, have been applied. Targets are
//! therefore awaited through a requirement that re-polls whenever a schema
//! tree or the module index changes.

use crate::common::{SCHEMA_NODES, keyword, module_of, node_name, resolve_qname};
use crate::definition::feature_supported;
use crate::namespaces::{
    AugmentTarget, AugmentTargetNamespace, FeatureNamespace, ModuleAugmentations, NamespaceToModule,
};
use schemata_core::{ModelProcessingPhase, QName, split_prefixed};
use schemata_reactor::namespace::NamespaceId;
use schemata_reactor::namespaces::SchemaTreeNamespace;
use schemata_reactor::schema_tree;
use schemata_reactor::support::{parse_identifier, parse_schema_path, parse_text};
use schemata_reactor::{
    ArgumentValue, AugmentationRecord, EffectiveStatement, Facet, ModelAction, Requirement,
    SourceError, SourceResult, StatementOrigin, StatementSupport, StmtContext, StmtContextMut,
    StmtId, SubstatementValidator,
};
use tracing::{debug, trace};

fn data_children(validator: SubstatementValidator) -> SubstatementValidator {
    validator
        .add_optional("description")
        .add_any("if-feature")
        .add_any("container")
        .add_any("list")
        .add_any("leaf")
        .add_any("leaf-list")
}

fn schema_node_declaration(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let name = node_name(&view)?;
    let Some(parent) = view.parent().map(|p| p.id()) else {
        return Ok(());
    };
    let id = ctx.id();
    ctx.put_at::<SchemaTreeNamespace>(parent, name, id)
}

fn schema_node_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    Ok(effective.with_node_name(node_name(ctx)?))
}

fn render(path: &[QName]) -> String {
    path.iter()
        .map(|q| format!("/{}", q.local_name()))
        .collect()
}

fn augment_declaration(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let ArgumentValue::Path(steps) = view.argument() else {
        return Err(SourceError::internal("augment argument is not a schema path"));
    };
    let path = steps
        .iter()
        .map(|step| resolve_qname(&view, step.prefix.as_deref(), &step.local))
        .collect::<SourceResult<Vec<_>>>()?;
    let Some(first) = path.first() else {
        return Err(SourceError::at("Augment target path is empty", view.reference()));
    };
    let target_module = first.module().clone();
    let description = format!("Augment of {}", render(&path));
    trace!(target = %render(&path), "Queueing augment");

    let lookup_module = target_module.clone();
    let lookup_path = path.clone();
    let requirement = Requirement::custom(
        format!("schema node {} in {}", render(&path), target_module),
        vec![NamespaceId::of::<NamespaceToModule>(), NamespaceId::of::<SchemaTreeNamespace>()],
        move |state| match state.get_global::<NamespaceToModule>(&lookup_module)? {
            Some(root) => schema_tree::find_node(state, root, &lookup_path),
            None => Ok(None),
        },
    );
    let action = ModelAction::new(
        ctx.id(),
        ModelProcessingPhase::FullDeclaration,
        description,
        move |ctx, resolved| {
            let node = resolved[0];
            let root = ctx
                .view()
                .state()
                .get_global::<NamespaceToModule>(&target_module)?
                .ok_or_else(|| {
                    SourceError::internal(format!("Module {} vanished", target_module))
                })?;
            let children = ctx
                .view()
                .children()
                .filter(|c| SCHEMA_NODES.contains(&c.raw_keyword()))
                .map(|c| Ok((c.id(), node_name(&c)?)))
                .collect::<SourceResult<Vec<(StmtId, QName)>>>()?;
            debug!(target = %render(&path), nodes = children.len(), "Applying augment");
            for (child, name) in children {
                ctx.put_at::<SchemaTreeNamespace>(node, name, child)?;
                ctx.add_effective_child(node, child, StatementOrigin::AddedByAugmentation);
            }
            ctx.put::<AugmentTargetNamespace>((), AugmentTarget { node, root, path })
        },
    )
    .requires(requirement);
    ctx.add_action(action);
    Ok(())
}

/// Record the augment in the target module's log
fn augment_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    let Some(target) = ctx.get::<AugmentTargetNamespace>(&())? else {
        return Err(SourceError::internal("augment finished without a target"));
    };
    let module = module_of(ctx)?;
    if let Some(log) = ctx.state().get_global::<ModuleAugmentations>(&target.root)? {
        log.push(AugmentationRecord {
            module,
            target: target.path.clone(),
        })
        .map_err(|err| err.or_at(ctx.reference()))?;
    }
    Ok(effective.with_facet(Facet::AugmentTarget(target.path)))
}

/// Exclude the parent when the named feature is disabled
fn if_feature_declaration(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let raw = view.raw_argument().unwrap_or_default();
    let (prefix, local) =
        split_prefixed(raw).map_err(|err| SourceError::at(err.to_string(), view.reference()))?;
    let feature = resolve_qname(&view, prefix, local)?;
    let Some(parent) = view.parent().map(|p| p.id()) else {
        return Err(SourceError::at("if-feature must have a parent", view.reference()));
    };
    let description = format!("if-feature {}", raw);
    let requirement = Requirement::global::<FeatureNamespace>(feature.clone());
    let action = ModelAction::new(
        ctx.id(),
        ModelProcessingPhase::FullDeclaration,
        description,
        move |ctx, _| {
            if feature_supported(&ctx.view(), &feature)? {
                return Ok(());
            }
            let parent_view = ctx.stmt(parent);
            trace!(feature = %feature, statement = parent_view.raw_keyword(), "Feature disabled");
            let mut excluded = vec![parent];
            if parent_view.raw_keyword() == "augment" {
                excluded.extend(
                    parent_view
                        .children()
                        .filter(|c| SCHEMA_NODES.contains(&c.raw_keyword()))
                        .map(|c| c.id()),
                );
            }
            for id in excluded {
                ctx.set_supported(id, false);
            }
            Ok(())
        },
    )
    .requires(requirement);
    ctx.add_action(action);
    Ok(())
}

/// Supports needed from FULL_DECLARATION on
#[must_use]
pub fn schema_supports() -> Vec<StatementSupport> {
    vec![
        StatementSupport::builder(keyword("container"))
            .argument(parse_identifier)
            .validator(data_children(SubstatementValidator::new()))
            .on_phase(ModelProcessingPhase::FullDeclaration, schema_node_declaration)
            .effective(schema_node_effective)
            .build(),
        StatementSupport::builder(keyword("list"))
            .argument(parse_identifier)
            .validator(data_children(SubstatementValidator::new().add_optional("key")))
            .on_phase(ModelProcessingPhase::FullDeclaration, schema_node_declaration)
            .effective(schema_node_effective)
            .build(),
        StatementSupport::builder(keyword("leaf"))
            .argument(parse_identifier)
            .validator(
                SubstatementValidator::new()
                    .add_mandatory("type")
                    .add_optional("description")
                    .add_any("if-feature"),
            )
            .on_phase(ModelProcessingPhase::FullDeclaration, schema_node_declaration)
            .effective(schema_node_effective)
            .build(),
        StatementSupport::builder(keyword("leaf-list"))
            .argument(parse_identifier)
            .validator(
                SubstatementValidator::new()
                    .add_mandatory("type")
                    .add_optional("description")
                    .add_any("if-feature"),
            )
            .on_phase(ModelProcessingPhase::FullDeclaration, schema_node_declaration)
            .effective(schema_node_effective)
            .build(),
        StatementSupport::builder(keyword("key"))
            .argument(parse_text)
            .build(),
        StatementSupport::builder(keyword("type"))
            .argument(parse_text)
            .build(),
        StatementSupport::builder(keyword("augment"))
            .argument(parse_schema_path)
            .validator(data_children(SubstatementValidator::new()))
            .on_phase(ModelProcessingPhase::FullDeclaration, augment_declaration)
            .effective(augment_effective)
            .build(),
        StatementSupport::builder(keyword("if-feature"))
            .argument(parse_text)
            .on_phase(ModelProcessingPhase::FullDeclaration, if_feature_declaration)
            .build(),
    ]
}
