//! Statements that define new names: extensions and features.

use crate::common::{keyword, node_name};
use crate::namespaces::FeatureNamespace;
use schemata_core::{ModelProcessingPhase, QName};
use schemata_reactor::namespaces::{ExtensionNamespace, SupportedFeaturesNamespace};
use schemata_reactor::support::{parse_identifier, parse_text};
use schemata_reactor::{
    EffectiveStatement, Facet, SourceResult, StatementSupport, StmtContext, StmtContextMut,
    SubstatementValidator,
};

/// Whether the build enables `feature`
///
/// Without a configured feature set every feature is enabled.
///
/// # Errors
///
/// Returns error if the supported-features namespace is not registered
pub fn feature_supported(ctx: &StmtContext<'_>, feature: &QName) -> SourceResult<bool> {
    Ok(ctx
        .state()
        .get_global::<SupportedFeaturesNamespace>(&())?
        .is_none_or(|features| features.contains(feature)))
}

fn extension_definition(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let name = node_name(&ctx.view())?;
    let id = ctx.id();
    ctx.put::<ExtensionNamespace>(name, id)
}

fn feature_definition(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let name = node_name(&ctx.view())?;
    let id = ctx.id();
    ctx.put::<FeatureNamespace>(name, id)
}

fn feature_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    let name = node_name(ctx)?;
    let supported = feature_supported(ctx, &name)?;
    Ok(effective.with_facet(Facet::Feature { name, supported }))
}

/// Supports needed from STATEMENT_DEFINITION on
#[must_use]
pub fn definition_supports() -> Vec<StatementSupport> {
    vec![
        StatementSupport::builder(keyword("extension"))
            .argument(parse_identifier)
            .validator(
                SubstatementValidator::new()
                    .add_optional("argument")
                    .add_optional("description"),
            )
            .on_phase(ModelProcessingPhase::StatementDefinition, extension_definition)
            .build(),
        StatementSupport::builder(keyword("argument"))
            .argument(parse_identifier)
            .build(),
        StatementSupport::builder(keyword("feature"))
            .argument(parse_identifier)
            .validator(
                SubstatementValidator::new()
                    .add_any("if-feature")
                    .add_optional("description"),
            )
            .on_phase(ModelProcessingPhase::StatementDefinition, feature_definition)
            .effective(feature_effective)
            .build(),
    ]
}

/// Support bound to instances of user-defined extensions
#[must_use]
pub fn unknown_support() -> StatementSupport {
    StatementSupport::builder(keyword("unknown"))
        .optional_argument(parse_text)
        .build()
}
