//! Small statement vocabulary used by the unit tests of this crate.

use crate::action::{ModelAction, Requirement};
use crate::bundle::{PhaseSupports, StatementSupportBundle, StatementSupportBundleBuilder};
use crate::config::ReactorConfig;
use crate::error::{SourceError, SourceResult};
use crate::model::{AugmentationRecord, EffectiveStatement, Facet};
use crate::mutable::SealableList;
use crate::namespace::{Namespace, NamespaceBehaviour};
use crate::namespaces::{
    ExtensionNamespace, ModuleCtxToModuleQName, PrefixToModule, SchemaTreeNamespace,
    reactor_namespaces,
};
use crate::reactor::{BuildGlobalContext, CrossSourceStatementReactor};
use crate::source::SourceContext;
use crate::state::{BuildState, StmtContext, StmtContextMut};
use crate::stmt::{StmtId, yang_module};
use crate::stream::{InMemorySource, RawStatement};
use crate::support::{
    ArgumentParser, StatementSupport, SubstatementValidator, parse_identifier, parse_namespace,
    parse_revision, parse_text, parse_version,
};
use schemata_core::{
    ModelProcessingPhase, QName, QNameModule, Revision, SourceIdentifier, XmlNamespace,
};
use std::sync::Arc;

/// Module roots by name, written once a module is linked
pub(crate) struct TestModules;

impl Namespace for TestModules {
    type Key = String;
    type Value = StmtId;
    const NAME: &'static str = "TestModules";
}

/// Augment log of each module root
pub(crate) struct TestAugmentLogs;

impl Namespace for TestAugmentLogs {
    type Key = StmtId;
    type Value = Arc<SealableList<AugmentationRecord>>;
    const NAME: &'static str = "TestAugmentLogs";
}

fn keyword(name: &str) -> QName {
    QName::create(yang_module(), name).unwrap()
}

fn leaf_support(name: &str, parser: ArgumentParser) -> StatementSupport {
    StatementSupport::builder(keyword(name)).argument(parser).build()
}

fn argument(ctx: &StmtContextMut<'_>) -> String {
    ctx.view().raw_argument().unwrap_or_default().to_string()
}

fn module_of(ctx: &StmtContext<'_>) -> SourceResult<QNameModule> {
    let root = ctx.root().id();
    ctx.state()
        .get_global::<ModuleCtxToModuleQName>(&root)?
        .ok_or_else(|| SourceError::new("module has no namespace"))
}

fn module_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let name = view.raw_argument().unwrap_or_default().to_string();
    let revision = view.latest_revision();
    let namespace = view
        .first_child("namespace")
        .and_then(|n| n.raw_argument())
        .map(XmlNamespace::of)
        .transpose()?;
    let prefix = view.first_child("prefix").and_then(|p| p.raw_argument()).map(str::to_string);

    let id = ctx.id();
    ctx.set_root_identifier(SourceIdentifier::with_revision(&name, revision));
    let log = Arc::new(SealableList::new());
    ctx.add_mutable(log.clone());
    ctx.put::<TestAugmentLogs>(id, log)?;
    if let Some(namespace) = namespace {
        let module = QNameModule::new(namespace, revision);
        ctx.put::<ModuleCtxToModuleQName>(id, module.clone())?;
        if let Some(prefix) = prefix {
            ctx.put::<PrefixToModule>(prefix, module)?;
        }
    }
    Ok(())
}

fn module_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let id = ctx.id();
    let name = argument(ctx);
    ctx.put::<TestModules>(name, id)
}

fn module_effective(
    ctx: &StmtContext<'_>,
    effective: EffectiveStatement,
) -> SourceResult<EffectiveStatement> {
    let module = module_of(ctx)?;
    let mut effective = effective.with_facet(Facet::Module(module));
    if let Some(log) = ctx.state().get_global::<TestAugmentLogs>(&ctx.id())? {
        effective = effective.with_facet(Facet::Augmentations(log));
    }
    Ok(effective)
}

fn import_pre_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let revision = ctx
        .view()
        .first_child("revision-date")
        .and_then(|r| r.raw_argument())
        .map(Revision::parse)
        .transpose()?;
    let name = argument(ctx);
    ctx.add_required_source(SourceIdentifier::with_revision(&name, revision));
    Ok(())
}

fn import_linkage(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let name = argument(ctx);
    let prefix = ctx
        .view()
        .first_child("prefix")
        .and_then(|p| p.raw_argument())
        .unwrap_or_default()
        .to_string();
    let action = ModelAction::new(
        ctx.id(),
        ModelProcessingPhase::Linkage,
        format!("Import of {}", name),
        move |ctx, resolved| {
            let module = ctx
                .get::<ModuleCtxToModuleQName>(&resolved[0])?
                .ok_or_else(|| SourceError::internal("imported module has no identity"))?;
            ctx.put::<PrefixToModule>(prefix, module)
        },
    )
    .requires(Requirement::global::<TestModules>(name));
    ctx.add_action(action);
    Ok(())
}

fn schema_node_declaration(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let name = QName::create(module_of(&view)?, view.raw_argument().unwrap_or_default())?;
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
    let name = QName::create(module_of(ctx)?, ctx.raw_argument().unwrap_or_default())?;
    Ok(effective.with_node_name(name))
}

fn extension_definition(ctx: &mut StmtContextMut<'_>) -> SourceResult<()> {
    let view = ctx.view();
    let name = QName::create(module_of(&view)?, view.raw_argument().unwrap_or_default())?;
    let id = ctx.id();
    ctx.put::<ExtensionNamespace>(name, id)
}

fn statements(builder: StatementSupportBundleBuilder) -> StatementSupportBundleBuilder {
    builder
        .add_support(
            StatementSupport::builder(keyword("module"))
                .argument(parse_identifier)
                .validator(
                    SubstatementValidator::new()
                        .add_mandatory("namespace")
                        .add_mandatory("prefix")
                        .add_optional("yang-version")
                        .add_any("revision")
                        .add_any("import")
                        .add_any("container")
                        .add_any("leaf")
                        .add_any("extension"),
                )
                .on_phase(ModelProcessingPhase::PreLinkage, module_pre_linkage)
                .on_phase(ModelProcessingPhase::Linkage, module_linkage)
                .effective(module_effective)
                .build(),
        )
        .add_support(leaf_support("namespace", parse_namespace))
        .add_support(leaf_support("prefix", parse_identifier))
        .add_support(leaf_support("revision", parse_revision))
        .add_support(leaf_support("revision-date", parse_revision))
        .add_support(leaf_support("yang-version", parse_version))
        .add_support(
            StatementSupport::builder(keyword("import"))
                .argument(parse_identifier)
                .validator(
                    SubstatementValidator::new()
                        .add_mandatory("prefix")
                        .add_optional("revision-date"),
                )
                .on_phase(ModelProcessingPhase::PreLinkage, import_pre_linkage)
                .on_phase(ModelProcessingPhase::Linkage, import_linkage)
                .build(),
        )
        .add_support(
            StatementSupport::builder(keyword("container"))
                .argument(parse_identifier)
                .validator(SubstatementValidator::new().add_any("container").add_any("leaf"))
                .on_phase(ModelProcessingPhase::FullDeclaration, schema_node_declaration)
                .effective(schema_node_effective)
                .build(),
        )
        .add_support(
            StatementSupport::builder(keyword("leaf"))
                .argument(parse_identifier)
                .on_phase(ModelProcessingPhase::FullDeclaration, schema_node_declaration)
                .effective(schema_node_effective)
                .build(),
        )
        .add_support(
            StatementSupport::builder(keyword("extension"))
                .argument(parse_identifier)
                .on_phase(ModelProcessingPhase::StatementDefinition, extension_definition)
                .build(),
        )
        .unknown_support(
            StatementSupport::builder(keyword("unknown"))
                .optional_argument(parse_text)
                .build(),
        )
}

/// Vocabulary plus every namespace it uses
pub(crate) fn bundle() -> StatementSupportBundle {
    let mut builder = statements(StatementSupportBundle::builder())
        .add_namespace(NamespaceBehaviour::global::<TestModules>())
        .add_namespace(NamespaceBehaviour::global::<TestAugmentLogs>());
    for behaviour in reactor_namespaces() {
        builder = builder.add_namespace(behaviour);
    }
    builder.build()
}

/// Vocabulary whose namespaces nobody registered
pub(crate) fn bundle_without_namespaces() -> StatementSupportBundle {
    statements(StatementSupportBundle::builder()).build()
}

pub(crate) fn supports() -> Arc<PhaseSupports> {
    let mut supports = PhaseSupports::new();
    supports.insert(ModelProcessingPhase::Init, bundle());
    Arc::new(supports)
}

/// Route reactor logs to the test harness; `RUST_LOG` selects the level
pub(crate) fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub(crate) fn reactor() -> CrossSourceStatementReactor {
    init_tracing();
    CrossSourceStatementReactor::builder()
        .phase(ModelProcessingPhase::Init, bundle())
        .build()
}

pub(crate) fn module(name: &str, namespace: &str) -> RawStatement {
    RawStatement::new("module", name)
        .with(RawStatement::new("namespace", namespace))
        .with(RawStatement::new("prefix", name))
}

pub(crate) fn revised_module(name: &str, namespace: &str, revision: &str) -> RawStatement {
    module(name, namespace).with(RawStatement::new("revision", revision))
}

pub(crate) fn import(name: &str, prefix: &str) -> RawStatement {
    RawStatement::new("import", name).with(RawStatement::new("prefix", prefix))
}

pub(crate) fn container(name: &str) -> RawStatement {
    RawStatement::new("container", name)
}

pub(crate) fn leaf(name: &str) -> RawStatement {
    RawStatement::new("leaf", name)
}

fn source_name(raw: &RawStatement) -> String {
    raw.argument.clone().unwrap_or_else(|| "source".to_string())
}

/// Fresh build state with one unprocessed source
pub(crate) fn source_context(raw: RawStatement) -> (BuildState, SourceContext) {
    let mut state = BuildState::new(supports(), ReactorConfig::default());
    let key = state.register_source();
    let stream = InMemorySource::new(&source_name(&raw), raw);
    (state, SourceContext::new(Box::new(stream), key))
}

/// Build state after every phase, plus the root of each source
pub(crate) fn built_state(roots: Vec<RawStatement>) -> (BuildState, Vec<StmtId>) {
    init_tracing();
    let mut context = BuildGlobalContext::new(supports(), ReactorConfig::default());
    for raw in roots {
        let stream = InMemorySource::new(&source_name(&raw), raw);
        context.add_source(Box::new(stream));
    }
    context.execute_phases().unwrap();
    let roots = context.roots();
    (context.state, roots)
}
