//! Declared and effective statement models.
//!
//! The declared tree mirrors the source syntax. The effective tree carries
//! resolved semantics: schema nodes indexed by qualified name, nodes placed
//! by augments and includes, and per-kind facets.

use crate::mutable::SealableList;
use crate::stmt::{ArgumentValue, StatementOrigin};
use indexmap::IndexMap;
use schemata_core::{Memoized, QName, QNameModule, SourceIdentifier, StatementSourceReference};
use std::sync::Arc;

/// Statement as written in a source
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredStatement {
    keyword: QName,
    raw_keyword: String,
    argument: ArgumentValue,
    raw_argument: Option<String>,
    substatements: Vec<Arc<DeclaredStatement>>,
    reference: Option<StatementSourceReference>,
}

impl DeclaredStatement {
    /// Create a declared statement
    #[must_use]
    pub fn new(
        keyword: QName,
        raw_keyword: String,
        argument: ArgumentValue,
        raw_argument: Option<String>,
        substatements: Vec<Arc<DeclaredStatement>>,
        reference: Option<StatementSourceReference>,
    ) -> Self {
        Self {
            keyword,
            raw_keyword,
            argument,
            raw_argument,
            substatements,
            reference,
        }
    }

    /// Keyword identity
    #[must_use]
    pub fn keyword(&self) -> &QName {
        &self.keyword
    }

    /// Keyword as written
    #[must_use]
    pub fn raw_keyword(&self) -> &str {
        &self.raw_keyword
    }

    /// Parsed argument
    #[must_use]
    pub fn argument(&self) -> &ArgumentValue {
        &self.argument
    }

    /// Argument as written
    #[must_use]
    pub fn raw_argument(&self) -> Option<&str> {
        self.raw_argument.as_deref()
    }

    /// Substatements in source order
    #[must_use]
    pub fn substatements(&self) -> &[Arc<DeclaredStatement>] {
        &self.substatements
    }

    /// Position in the source
    #[must_use]
    pub fn reference(&self) -> Option<&StatementSourceReference> {
        self.reference.as_ref()
    }

    /// First substatement written with `keyword`
    #[must_use]
    pub fn find_first(&self, keyword: &str) -> Option<&Arc<DeclaredStatement>> {
        self.substatements.iter().find(|s| s.raw_keyword == keyword)
    }
}

/// Module placed into another module's tree by an augment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentationRecord {
    /// Module declaring the augment
    pub module: QNameModule,
    /// Resolved target path
    pub target: Vec<QName>,
}

/// Kind-specific resolved information
#[derive(Debug, Clone)]
pub enum Facet {
    /// Identity of a module
    Module(QNameModule),
    /// Resolved import
    Import {
        /// Prefix bound by the import
        prefix: String,
        /// Imported module
        module: QNameModule,
    },
    /// Included submodule
    Include(SourceIdentifier),
    /// Owning module of a submodule
    BelongsTo {
        /// Prefix bound to the owner
        prefix: String,
        /// Owning module
        module: QNameModule,
    },
    /// Resolved augment target
    AugmentTarget(Vec<QName>),
    /// Augments targeting a module, filled while roots are built
    Augmentations(Arc<SealableList<AugmentationRecord>>),
    /// Feature definition and whether the build supports it
    Feature {
        /// Feature name
        name: QName,
        /// Whether the feature is enabled
        supported: bool,
    },
}

/// Statement with resolved semantics
#[derive(Debug, Clone)]
pub struct EffectiveStatement {
    keyword: QName,
    argument: ArgumentValue,
    declared: Option<Arc<DeclaredStatement>>,
    substatements: Vec<Arc<EffectiveStatement>>,
    schema_tree: IndexMap<QName, Arc<EffectiveStatement>>,
    node_name: Option<QName>,
    origin: StatementOrigin,
    facets: Vec<Facet>,
    unknown: bool,
}

impl EffectiveStatement {
    /// Create an effective statement, indexing substatements that are
    /// schema nodes
    #[must_use]
    pub fn new(
        keyword: QName,
        argument: ArgumentValue,
        declared: Option<Arc<DeclaredStatement>>,
        substatements: Vec<Arc<EffectiveStatement>>,
    ) -> Self {
        let schema_tree = substatements
            .iter()
            .filter_map(|s| s.node_name.clone().map(|name| (name, Arc::clone(s))))
            .collect();
        Self {
            keyword,
            argument,
            declared,
            substatements,
            schema_tree,
            node_name: None,
            origin: StatementOrigin::Declared,
            facets: Vec::new(),
            unknown: false,
        }
    }

    /// Mark this statement as the schema node `name`
    #[must_use]
    pub fn with_node_name(mut self, name: QName) -> Self {
        self.node_name = Some(name);
        self
    }

    /// Attach a facet
    #[must_use]
    pub fn with_facet(mut self, facet: Facet) -> Self {
        self.facets.push(facet);
        self
    }

    /// Mark this statement as an extension instance
    #[must_use]
    pub fn as_unknown(mut self) -> Self {
        self.unknown = true;
        self
    }

    /// Copy placed at another position
    #[must_use]
    pub fn with_origin(&self, origin: StatementOrigin) -> Self {
        Self {
            origin,
            ..self.clone()
        }
    }

    /// Keyword identity
    #[must_use]
    pub fn keyword(&self) -> &QName {
        &self.keyword
    }

    /// Parsed argument
    #[must_use]
    pub fn argument(&self) -> &ArgumentValue {
        &self.argument
    }

    /// Argument as written, if declared
    #[must_use]
    pub fn raw_argument(&self) -> Option<&str> {
        self.declared.as_ref().and_then(|d| d.raw_argument())
    }

    /// Declared counterpart
    #[must_use]
    pub fn declared(&self) -> Option<&Arc<DeclaredStatement>> {
        self.declared.as_ref()
    }

    /// All effective substatements
    #[must_use]
    pub fn substatements(&self) -> &[Arc<EffectiveStatement>] {
        &self.substatements
    }

    /// Child schema nodes by name
    #[must_use]
    pub fn schema_tree(&self) -> &IndexMap<QName, Arc<EffectiveStatement>> {
        &self.schema_tree
    }

    /// Child schema node `name`
    #[must_use]
    pub fn schema_tree_node(&self, name: &QName) -> Option<&Arc<EffectiveStatement>> {
        self.schema_tree.get(name)
    }

    /// Schema node identity, if this statement is a schema node
    #[must_use]
    pub fn node_name(&self) -> Option<&QName> {
        self.node_name.as_ref()
    }

    /// How this statement got here
    #[must_use]
    pub fn origin(&self) -> StatementOrigin {
        self.origin
    }

    /// Whether this statement instantiates an extension
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.unknown
    }

    /// Child schema node `step`, or else the extension instance whose raw
    /// argument is the step's local name
    #[must_use]
    pub fn find_schema_step(&self, step: &QName) -> Option<&Arc<EffectiveStatement>> {
        self.schema_tree_node(step).or_else(|| {
            self.substatements
                .iter()
                .find(|s| s.unknown && s.raw_argument() == Some(step.local_name()))
        })
    }

    /// Kind-specific facets
    #[must_use]
    pub fn facets(&self) -> &[Facet] {
        &self.facets
    }

    /// Module identity, for module statements
    #[must_use]
    pub fn module(&self) -> Option<&QNameModule> {
        self.facets.iter().find_map(|f| match f {
            Facet::Module(module) => Some(module),
            _ => None,
        })
    }

    /// Augments recorded against this module
    #[must_use]
    pub fn augmentations(&self) -> Option<&Arc<SealableList<AugmentationRecord>>> {
        self.facets.iter().find_map(|f| match f {
            Facet::Augmentations(list) => Some(list),
            _ => None,
        })
    }

    /// Substatements with the given keyword local name
    pub fn children_named<'a>(
        &'a self,
        keyword: &'a str,
    ) -> impl Iterator<Item = &'a Arc<EffectiveStatement>> + 'a {
        self.substatements
            .iter()
            .filter(move |s| s.keyword.local_name() == keyword)
    }
}

/// Declared roots of a build
#[derive(Debug, Clone)]
pub struct ReactorDeclaredModel {
    roots: Vec<Arc<DeclaredStatement>>,
}

impl ReactorDeclaredModel {
    /// Wrap the declared roots
    #[must_use]
    pub fn new(roots: Vec<Arc<DeclaredStatement>>) -> Self {
        Self { roots }
    }

    /// Root statements in source order
    #[must_use]
    pub fn roots(&self) -> &[Arc<DeclaredStatement>] {
        &self.roots
    }
}

/// Result of a successful build
///
/// Immutable once built and safe to share between threads. The module index
/// is computed on first lookup.
#[derive(Debug)]
pub struct EffectiveSchemaContext {
    declared: Vec<Arc<DeclaredStatement>>,
    effective: Vec<Arc<EffectiveStatement>>,
    module_index: Memoized<IndexMap<QNameModule, usize>>,
}

impl EffectiveSchemaContext {
    /// Pair declared and effective roots index by index
    #[must_use]
    pub fn new(
        declared: Vec<Arc<DeclaredStatement>>,
        effective: Vec<Arc<EffectiveStatement>>,
    ) -> Self {
        Self {
            declared,
            effective,
            module_index: Memoized::new(),
        }
    }

    fn module_index(&self) -> &IndexMap<QNameModule, usize> {
        self.module_index.get_or_compute(|| {
            self.effective
                .iter()
                .enumerate()
                .filter_map(|(i, root)| root.module().map(|m| (m.clone(), i)))
                .collect()
        })
    }

    /// Declared roots
    #[must_use]
    pub fn declared_roots(&self) -> &[Arc<DeclaredStatement>] {
        &self.declared
    }

    /// Effective roots, paired with [`declared_roots`](Self::declared_roots)
    #[must_use]
    pub fn effective_roots(&self) -> &[Arc<EffectiveStatement>] {
        &self.effective
    }

    /// Effective module statements
    pub fn modules(&self) -> impl Iterator<Item = &Arc<EffectiveStatement>> {
        self.effective.iter().filter(|root| root.module().is_some())
    }

    /// Module with the given identity
    ///
    /// A module without revision matches the latest revision of its namespace.
    #[must_use]
    pub fn find_module(&self, module: &QNameModule) -> Option<&Arc<EffectiveStatement>> {
        let index = self.module_index();
        let position = if module.revision().is_some() {
            index.get(module).copied()
        } else {
            index
                .iter()
                .filter(|(q, _)| q.namespace() == module.namespace())
                .max_by_key(|(q, _)| q.revision())
                .map(|(_, &i)| i)
        };
        position.map(|i| &self.effective[i])
    }

    /// Module with the given name, latest revision first
    #[must_use]
    pub fn find_module_by_name(&self, name: &str) -> Option<&Arc<EffectiveStatement>> {
        self.modules()
            .filter(|m| m.argument().as_text() == Some(name))
            .max_by_key(|m| m.module().and_then(QNameModule::revision))
    }

    /// Schema node at an absolute path
    ///
    /// The first step selects the module by its namespace. Steps may pass
    /// through extension instances the same way augment targets do.
    #[must_use]
    pub fn find_node(&self, path: &[QName]) -> Option<&Arc<EffectiveStatement>> {
        let first = path.first()?;
        let mut current = self.find_module(first.module())?;
        for step in path {
            current = current.find_schema_step(step)?;
        }
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stmt::yang_module;
    use schemata_core::{Revision, XmlNamespace};

    fn keyword(name: &str) -> QName {
        QName::create(yang_module(), name).unwrap()
    }

    fn module(ns: &str, rev: Option<&str>) -> QNameModule {
        QNameModule::new(
            XmlNamespace::of(ns).unwrap(),
            rev.map(|r| Revision::parse(r).unwrap()),
        )
    }

    fn leaf(module: &QNameModule, name: &str) -> Arc<EffectiveStatement> {
        Arc::new(
            EffectiveStatement::new(keyword("leaf"), ArgumentValue::Text(name.into()), None, vec![])
                .with_node_name(QName::create(module.clone(), name).unwrap()),
        )
    }

    fn module_stmt(
        module: &QNameModule,
        name: &str,
        children: Vec<Arc<EffectiveStatement>>,
    ) -> Arc<EffectiveStatement> {
        let argument = ArgumentValue::Text(name.into());
        Arc::new(
            EffectiveStatement::new(keyword("module"), argument, None, children)
                .with_facet(Facet::Module(module.clone())),
        )
    }

    #[test]
    fn test_schema_tree_indexes_named_children() {
        let m = module("urn:foo", None);
        let desc = Arc::new(EffectiveStatement::new(
            keyword("description"),
            ArgumentValue::Text("d".into()),
            None,
            vec![],
        ));
        let root = module_stmt(&m, "foo", vec![leaf(&m, "a"), desc]);
        assert_eq!(root.substatements().len(), 2);
        assert_eq!(root.schema_tree().len(), 1);
        assert!(root
            .schema_tree_node(&QName::create(m.clone(), "a").unwrap())
            .is_some());
        assert_eq!(root.children_named("description").count(), 1);
    }

    #[test]
    fn test_with_origin_copies() {
        let m = module("urn:foo", None);
        let l = leaf(&m, "a");
        let moved = l.with_origin(StatementOrigin::AddedByAugmentation);
        assert_eq!(moved.origin(), StatementOrigin::AddedByAugmentation);
        assert_eq!(l.origin(), StatementOrigin::Declared);
        assert_eq!(moved.node_name(), l.node_name());
    }

    #[test]
    fn test_context_find_node_and_latest_module() {
        let old = module("urn:foo", Some("2020-01-01"));
        let new = module("urn:foo", Some("2021-06-01"));
        let context = EffectiveSchemaContext::new(
            vec![],
            vec![
                module_stmt(&old, "foo", vec![leaf(&old, "a")]),
                module_stmt(&new, "foo", vec![leaf(&new, "b")]),
            ],
        );
        assert_eq!(context.modules().count(), 2);
        assert_eq!(
            context.find_module(&module("urn:foo", None)).and_then(|m| m.module()),
            Some(&new)
        );
        assert_eq!(
            context.find_module_by_name("foo").and_then(|m| m.module()),
            Some(&new)
        );
        let path = [QName::create(old.clone(), "a").unwrap()];
        assert!(context.find_node(&path).is_some());
        let missing = [QName::create(old, "b").unwrap()];
        assert!(context.find_node(&missing).is_none());
        assert!(context.find_node(&[]).is_none());
    }

    #[test]
    fn test_find_node_passes_extension_instance() {
        let m = module("urn:foo", None);
        let declared = Arc::new(DeclaredStatement::new(
            QName::create(m.clone(), "slot").unwrap(),
            "ex:slot".into(),
            ArgumentValue::Text("s".into()),
            Some("s".into()),
            vec![],
            None,
        ));
        let slot = Arc::new(
            EffectiveStatement::new(
                QName::create(m.clone(), "slot").unwrap(),
                ArgumentValue::Text("s".into()),
                Some(declared),
                vec![leaf(&m, "inner")],
            )
            .as_unknown(),
        );
        let argument = ArgumentValue::Text("top".into());
        let top = Arc::new(
            EffectiveStatement::new(keyword("container"), argument, None, vec![slot])
                .with_node_name(QName::create(m.clone(), "top").unwrap()),
        );
        let context = EffectiveSchemaContext::new(vec![], vec![module_stmt(&m, "foo", vec![top])]);
        let name = |local: &str| QName::create(m.clone(), local).unwrap();
        let found = context.find_node(&[name("top"), name("s"), name("inner")]).unwrap();
        assert_eq!(found.node_name(), Some(&name("inner")));
        assert!(context.find_node(&[name("top"), name("s")]).unwrap().is_unknown());
        assert!(context.find_node(&[name("top"), name("t")]).is_none());
    }

    #[test]
    fn test_context_shared_between_threads() {
        let m = module("urn:foo", None);
        let context = Arc::new(EffectiveSchemaContext::new(
            vec![],
            vec![module_stmt(&m, "foo", vec![leaf(&m, "a")])],
        ));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let context = Arc::clone(&context);
                let m = m.clone();
                std::thread::spawn(move || context.find_module(&m).map(|e| Arc::as_ptr(e) as usize))
            })
            .collect();
        let found: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(found.iter().all(|p| p.is_some() && *p == found[0]));
        assert!(context.module_index.is_computed());
    }
}
