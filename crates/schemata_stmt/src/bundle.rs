//! Phase bundles of the reference vocabulary.
//!
//! Each phase extends the bundle of the phase before it, so a statement
//! becomes known in the first phase that needs it and stays known after.

use crate::definition::{definition_supports, unknown_support};
use crate::linkage::linkage_supports;
use crate::namespaces::statement_namespaces;
use crate::schema::schema_supports;
use schemata_core::{ModelProcessingPhase, YangVersion};
use schemata_reactor::namespaces::reactor_namespaces;
use schemata_reactor::{
    CrossSourceStatementReactor, PhaseSupports, StatementSupport, StatementSupportBundle,
};
use std::sync::Arc;

fn extend(
    parent: &Arc<StatementSupportBundle>,
    supports: Vec<StatementSupport>,
) -> StatementSupportBundle {
    supports
        .into_iter()
        .fold(StatementSupportBundle::derived_from(parent), |builder, support| {
            builder.add_support(support)
        })
        .build()
}

/// Bundles of the phases that add vocabulary, in execution order
#[must_use]
pub fn phase_bundles() -> Vec<(ModelProcessingPhase, StatementSupportBundle)> {
    let init = reactor_namespaces()
        .into_iter()
        .chain(statement_namespaces())
        .fold(
            StatementSupportBundle::builder().versions(YangVersion::ALL),
            |builder, behaviour| builder.add_namespace(behaviour),
        )
        .build();
    let init = Arc::new(init);
    let pre_linkage = Arc::new(extend(&init, linkage_supports()));

    let mut definitions =
        StatementSupportBundle::derived_from(&pre_linkage).unknown_support(unknown_support());
    for support in definition_supports() {
        definitions = definitions.add_support(support);
    }
    let definitions = Arc::new(definitions.build());
    let declarations = extend(&definitions, schema_supports());

    vec![
        (ModelProcessingPhase::Init, (*init).clone()),
        (ModelProcessingPhase::PreLinkage, (*pre_linkage).clone()),
        (ModelProcessingPhase::StatementDefinition, (*definitions).clone()),
        (ModelProcessingPhase::FullDeclaration, declarations),
    ]
}

/// Phase lookup table of the reference vocabulary
#[must_use]
pub fn yang_supports() -> PhaseSupports {
    let mut supports = PhaseSupports::new();
    for (phase, bundle) in phase_bundles() {
        supports.insert(phase, bundle);
    }
    supports
}

/// Reactor configured with the reference vocabulary
#[must_use]
pub fn yang_reactor() -> CrossSourceStatementReactor {
    phase_bundles()
        .into_iter()
        .fold(CrossSourceStatementReactor::builder(), |builder, (phase, bundle)| {
            builder.phase(phase, bundle)
        })
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use schemata_core::{QName, QNameModule, Revision, XmlNamespace};
    use schemata_reactor::{
        EffectiveSchemaContext, EffectiveStatement, Facet, InMemorySource, MutableStatement,
        RawStatement, ReactorConfig, ReactorError, StatementOrigin, StatementParserMode,
        yang_module,
    };
    use tracing_subscriber::EnvFilter;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn module(name: &str) -> RawStatement {
        RawStatement::new("module", name)
            .with(RawStatement::new("namespace", &format!("urn:{}", name)))
            .with(RawStatement::new("prefix", name))
    }

    fn import(name: &str, prefix: &str) -> RawStatement {
        RawStatement::new("import", name).with(RawStatement::new("prefix", prefix))
    }

    fn leaf(name: &str) -> RawStatement {
        RawStatement::new("leaf", name).with(RawStatement::new("type", "string"))
    }

    fn source(raw: RawStatement) -> InMemorySource {
        let name = raw.argument.clone().unwrap_or_default();
        InMemorySource::new(&name, raw)
    }

    fn qname(module: &str, local: &str) -> QName {
        QName::create(
            QNameModule::new(XmlNamespace::of(&format!("urn:{}", module)).unwrap(), None),
            local,
        )
        .unwrap()
    }

    fn build(sources: Vec<RawStatement>) -> Result<EffectiveSchemaContext, ReactorError> {
        init_tracing();
        yang_reactor()
            .new_build()
            .add_sources(sources.into_iter().map(source))
            .build_effective()
    }

    fn import_of<'a>(module: &'a EffectiveStatement) -> Option<&'a QNameModule> {
        module
            .children_named("import")
            .flat_map(|i| i.facets())
            .find_map(|f| match f {
                Facet::Import { module, .. } => Some(module),
                _ => None,
            })
    }

    #[test]
    fn test_supports_layered_by_phase() {
        let supports = yang_supports();
        let keyword = |name: &'static str| crate::common::keyword(name);
        let pre_linkage = supports.for_phase(ModelProcessingPhase::PreLinkage);
        assert!(pre_linkage.statement_definition(YangVersion::V1, &keyword("import")).is_some());
        assert!(pre_linkage.statement_definition(YangVersion::V1, &keyword("augment")).is_none());
        let linkage = supports.for_phase(ModelProcessingPhase::Linkage);
        assert!(linkage.statement_definition(YangVersion::V1, &keyword("module")).is_some());
        let effective = supports.for_phase(ModelProcessingPhase::EffectiveModel);
        for name in ["module", "feature", "container", "augment", "if-feature"] {
            assert!(effective.statement_definition(YangVersion::V1_1, &keyword(name)).is_some());
        }
        assert!(effective.unknown_support().is_some());
        assert_eq!(keyword("leaf").module(), &yang_module());
    }

    #[test]
    fn test_import_binds_in_either_order() {
        let foo = || module("foo").with(import("bar", "b"));
        let bar = || module("bar").with(leaf("x"));
        for sources in [vec![foo(), bar()], vec![bar(), foo()]] {
            let context = build(sources).unwrap();
            let foo = context.find_module_by_name("foo").unwrap();
            let bar = context.find_module_by_name("bar").unwrap();
            assert_eq!(import_of(foo), bar.module());
        }
    }

    #[test]
    fn test_missing_import_reports_every_source() {
        let err = build(vec![
            module("a").with(import("missing", "m")),
            module("b").with(import("missing", "m")),
        ])
        .unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::Linkage));
        assert_eq!(err.source_id().map(|s| s.name()), Some("a"));
        assert_eq!(err.suppressed().len(), 1);
        let ReactorError::SomeModifiersUnresolved { cause, .. } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert!(cause.message().contains("Import of missing"));
    }

    #[test]
    fn test_import_with_revision_date_selects_revision() {
        init_tracing();
        let old = module("bar").with(RawStatement::new("revision", "2019-01-01"));
        let new = module("bar").with(RawStatement::new("revision", "2020-01-01"));
        let foo = module("foo").with(
            import("bar", "b").with(RawStatement::new("revision-date", "2019-01-01")),
        );
        let context = yang_reactor()
            .new_build()
            .add_source(source(foo))
            .add_library_source(InMemorySource::new("bar-old", old))
            .unwrap()
            .add_library_source(InMemorySource::new("bar-new", new))
            .unwrap()
            .build_effective()
            .unwrap();
        assert_eq!(context.effective_roots().len(), 2);
        let foo = context.find_module_by_name("foo").unwrap();
        assert_eq!(
            import_of(foo).and_then(QNameModule::revision),
            Some(Revision::parse("2019-01-01").unwrap())
        );
    }

    #[test]
    fn test_unused_library_is_dropped() {
        init_tracing();
        let context = yang_reactor()
            .new_build()
            .add_source(source(module("foo")))
            .add_library_source(source(module("unused")))
            .unwrap()
            .build_effective()
            .unwrap();
        assert_eq!(context.effective_roots().len(), 1);
        assert!(context.find_module_by_name("unused").is_none());
    }

    #[test]
    fn test_transitive_library_promotion() {
        init_tracing();
        let context = yang_reactor()
            .new_build()
            .add_source(source(module("foo").with(import("bar", "b"))))
            .add_library_source(source(module("bar").with(import("baz", "z"))))
            .unwrap()
            .add_library_source(source(module("baz")))
            .unwrap()
            .build_effective()
            .unwrap();
        assert_eq!(context.effective_roots().len(), 3);
    }

    fn submodule(name: &str, owner: &str) -> RawStatement {
        RawStatement::new("submodule", name)
            .with(RawStatement::new("belongs-to", owner).with(RawStatement::new("prefix", owner)))
    }

    #[test]
    fn test_include_merges_submodule_nodes() {
        let context = build(vec![
            module("foo")
                .with(RawStatement::new("include", "foo-types"))
                .with(leaf("own")),
            submodule("foo-types", "foo")
                .with(RawStatement::new("container", "shared").with(leaf("x"))),
        ])
        .unwrap();
        let foo = context.find_module_by_name("foo").unwrap();
        let shared = foo.schema_tree_node(&qname("foo", "shared")).unwrap();
        assert_eq!(shared.origin(), StatementOrigin::IncludedFromSubmodule);
        assert_eq!(shared.node_name(), Some(&qname("foo", "shared")));
        assert!(context.find_node(&[qname("foo", "shared"), qname("foo", "x")]).is_some());
        assert!(foo.children_named("include").next().unwrap().facets().iter().any(|f| matches!(
            f,
            Facet::Include(id) if id.name() == "foo-types"
        )));
    }

    #[test]
    fn test_include_of_foreign_submodule_fails() {
        let err = build(vec![
            module("foo").with(RawStatement::new("include", "bar-types")),
            module("bar"),
            submodule("bar-types", "bar"),
        ])
        .unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::FullDeclaration));
        let ReactorError::SomeModifiersUnresolved { cause, .. } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert!(cause.message().contains("belongs to"));
    }

    #[test]
    fn test_augment_into_imported_module() {
        let context = build(vec![
            module("bar")
                .with(import("foo", "f"))
                .with(RawStatement::new("augment", "/f:top").with(leaf("extra"))),
            module("foo").with(RawStatement::new("container", "top").with(leaf("own"))),
        ])
        .unwrap();
        let top = context.find_node(&[qname("foo", "top")]).unwrap();
        let extra = top.schema_tree_node(&qname("bar", "extra")).unwrap();
        assert_eq!(extra.origin(), StatementOrigin::AddedByAugmentation);
        assert_eq!(top.schema_tree().len(), 2);

        let foo = context.find_module_by_name("foo").unwrap();
        let log = foo.augmentations().unwrap();
        let records = log.snapshot();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].module.namespace().as_str(), "urn:bar");
        assert_eq!(records[0].target, vec![qname("foo", "top")]);
        assert!(log.is_sealed());
        assert!(log.push(records[0].clone()).is_err());
    }

    fn augment_chain() -> Vec<RawStatement> {
        vec![
            module("foo").with(RawStatement::new("container", "top")),
            module("bar")
                .with(import("foo", "f"))
                .with(
                    RawStatement::new("augment", "/f:top")
                        .with(RawStatement::new("container", "inner")),
                ),
            module("baz")
                .with(import("foo", "f"))
                .with(import("bar", "b"))
                .with(RawStatement::new("augment", "/f:top/b:inner").with(leaf("deep"))),
        ]
    }

    #[test]
    fn test_augment_of_augmented_node_across_sources() {
        // baz targets a node bar adds; baz comes first so it must wait
        let mut sources = augment_chain();
        sources.rotate_right(1);
        let context = build(sources).unwrap();
        let deep = context
            .find_node(&[qname("foo", "top"), qname("bar", "inner"), qname("baz", "deep")])
            .unwrap();
        assert_eq!(deep.origin(), StatementOrigin::AddedByAugmentation);
        let foo = context.find_module_by_name("foo").unwrap();
        assert_eq!(foo.augmentations().unwrap().len(), 2);
    }

    proptest! {
        #[test]
        fn test_source_order_does_not_change_model(
            sources in Just(augment_chain()).prop_shuffle(),
        ) {
            let context = build(sources).unwrap();
            let top = context.find_node(&[qname("foo", "top")]).unwrap();
            let inner = top.schema_tree_node(&qname("bar", "inner")).unwrap();
            prop_assert_eq!(inner.schema_tree().len(), 1);
            let foo = context.find_module_by_name("foo").unwrap();
            prop_assert_eq!(foo.augmentations().unwrap().len(), 2);
        }
    }

    #[test]
    fn test_augment_of_missing_node_stalls() {
        let err = build(vec![
            module("bar")
                .with(import("foo", "f"))
                .with(RawStatement::new("augment", "/f:nowhere").with(leaf("x"))),
            module("foo"),
        ])
        .unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::FullDeclaration));
        assert_eq!(err.source_id().map(|s| s.name()), Some("bar"));
    }

    fn featured() -> RawStatement {
        module("foo")
            .with(RawStatement::new("feature", "fast"))
            .with(RawStatement::new("container", "always"))
            .with(leaf("sometimes").with(RawStatement::new("if-feature", "fast")))
    }

    #[test]
    fn test_every_feature_supported_by_default() {
        let context = build(vec![featured()]).unwrap();
        let foo = context.find_module_by_name("foo").unwrap();
        assert!(foo.schema_tree_node(&qname("foo", "sometimes")).is_some());
        let feature = foo.children_named("feature").next().unwrap();
        assert!(feature
            .facets()
            .iter()
            .any(|f| matches!(f, Facet::Feature { supported: true, .. })));
    }

    #[test]
    fn test_disabled_feature_prunes_nodes() {
        init_tracing();
        let context = yang_reactor()
            .new_build_with(ReactorConfig::new().with_supported_features(Vec::<QName>::new()))
            .add_source(source(featured()))
            .add_source(source(
                module("bar")
                    .with(import("foo", "f"))
                    .with(
                        RawStatement::new("augment", "/f:always")
                            .with(RawStatement::new("if-feature", "f:fast"))
                            .with(leaf("gated")),
                    ),
            ))
            .build_effective()
            .unwrap();
        let foo = context.find_module_by_name("foo").unwrap();
        assert!(foo.schema_tree_node(&qname("foo", "always")).is_some());
        assert!(foo.schema_tree_node(&qname("foo", "sometimes")).is_none());
        let always = foo.schema_tree_node(&qname("foo", "always")).unwrap();
        assert!(always.schema_tree().is_empty());
        assert!(foo.augmentations().unwrap().is_empty());
        let feature = foo.children_named("feature").next().unwrap();
        assert!(feature
            .facets()
            .iter()
            .any(|f| matches!(f, Facet::Feature { supported: false, .. })));
    }

    #[test]
    fn test_undefined_feature_stalls() {
        let guarded = leaf("x").with(RawStatement::new("if-feature", "ghost"));
        let err = build(vec![module("foo").with(guarded)]).unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::FullDeclaration));
    }

    #[test]
    fn test_semver_rejects_ambiguous_import() {
        init_tracing();
        let sources = || {
            vec![
                source(module("foo").with(import("bar", "b"))),
                source(module("bar").with(RawStatement::new("revision", "2019-01-01"))),
                source(module("bar").with(RawStatement::new("revision", "2020-01-01"))),
            ]
        };
        let err = yang_reactor()
            .new_build_with(ReactorConfig::new().with_parser_mode(StatementParserMode::SemVer))
            .add_sources(sources())
            .build_effective()
            .unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::StatementDefinition));

        let context = yang_reactor().new_build().add_sources(sources()).build_effective().unwrap();
        let foo = context.find_module_by_name("foo").unwrap();
        assert_eq!(
            import_of(foo).and_then(QNameModule::revision),
            Some(Revision::parse("2020-01-01").unwrap())
        );
    }

    #[test]
    fn test_structural_errors() {
        let no_namespace =
            RawStatement::new("module", "foo").with(RawStatement::new("prefix", "foo"));
        let err = build(vec![no_namespace]).unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::PreLinkage));

        let untyped = module("foo").with(RawStatement::new("leaf", "untyped"));
        let err = build(vec![untyped]).unwrap_err();
        let ReactorError::SomeModifiersUnresolved { cause, phase, .. } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(*phase, ModelProcessingPhase::FullDeclaration);
        assert!(cause.message().contains("type"));

        let err = build(vec![module("foo").with(RawStatement::new("bogus", "x"))]).unwrap_err();
        assert_eq!(err.phase(), Some(ModelProcessingPhase::FullDeclaration));
    }

    #[test]
    fn test_extension_instance_keeps_schema_path() {
        let context = build(vec![
            module("ext")
                .with(
                    RawStatement::new("extension", "mount")
                        .with(RawStatement::new("argument", "name")),
                ),
            module("foo")
                .with(import("ext", "e"))
                .with(
                    RawStatement::new("container", "top")
                        .with(RawStatement::new("e:mount", "point")),
                ),
            module("bar")
                .with(import("foo", "f"))
                .with(RawStatement::new("augment", "/f:top/f:point").with(leaf("mounted"))),
        ])
        .unwrap();
        let top = context.find_node(&[qname("foo", "top")]).unwrap();
        let mount = top
            .substatements()
            .iter()
            .find(|s| s.keyword().local_name() == "mount")
            .unwrap();
        assert_eq!(mount.keyword().namespace().as_str(), "urn:ext");
        assert!(mount.is_unknown());
        assert!(mount.schema_tree_node(&qname("bar", "mounted")).is_some());
        let mounted = context
            .find_node(&[qname("foo", "top"), qname("foo", "point"), qname("bar", "mounted")])
            .unwrap();
        assert_eq!(mounted.node_name(), Some(&qname("bar", "mounted")));
        assert_eq!(mounted.origin(), StatementOrigin::AddedByAugmentation);
    }

    #[test]
    fn test_independent_builds_in_parallel() {
        init_tracing();
        let reactor = Arc::new(yang_reactor());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let reactor = Arc::clone(&reactor);
                std::thread::spawn(move || {
                    let name = format!("m{}", i);
                    reactor
                        .new_build()
                        .add_source(source(module(&name).with(leaf("x"))))
                        .build_effective()
                        .map(|context| context.effective_roots().len())
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().unwrap(), 1);
        }
    }

    #[test]
    fn test_declared_model_keeps_substatements() {
        init_tracing();
        let model = yang_reactor()
            .new_build()
            .add_source(source(featured()))
            .build_declared()
            .unwrap();
        let root = &model.roots()[0];
        assert_eq!(root.raw_argument(), Some("foo"));
        assert!(root.find_first("feature").is_some());
        assert_eq!(root.substatements().len(), 5);
    }
}
