//! Build-wide state and statement context views.
//!
//! [`BuildState`] owns the statement arena, the global namespace storage and
//! the memoized namespace behaviours of one build. Statement supports see it
//! through [`StmtContext`] (read-only) and [`StmtContextMut`] (during phase
//! hooks and action application).

use crate::action::ModelAction;
use crate::bundle::{PhaseSupports, StatementSupportBundle};
use crate::config::ReactorConfig;
use crate::error::{SourceError, SourceResult};
use crate::mutable::{MutableRegistry, MutableStatement};
use crate::namespace::{
    Namespace, NamespaceContext, NamespaceId, NamespaceRegistry, NamespaceStorage, PutOutcome,
    StorageScope,
};
use crate::source::{SourceBook, advance};
use crate::stmt::{ArgumentValue, SourceKey, StatementOrigin, StmtId, StmtNode};
use crate::support::StatementSupport;
use schemata_core::{
    ModelProcessingPhase, QName, Revision, SourceIdentifier, StatementSourceReference, YangVersion,
};
use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

/// Progress of one source as seen by other sources
#[derive(Debug, Clone, Copy)]
pub(crate) struct SourceStatus {
    pub(crate) finished: ModelProcessingPhase,
    pub(crate) root: Option<StmtId>,
}

/// State shared by every source of one build
pub struct BuildState {
    nodes: Vec<StmtNode>,
    pub(crate) global: NamespaceStorage,
    registry: RefCell<NamespaceRegistry>,
    pub(crate) phase: ModelProcessingPhase,
    supports: Arc<PhaseSupports>,
    pub(crate) config: ReactorConfig,
    pub(crate) mutables: MutableRegistry,
    sources: Vec<SourceStatus>,
    definitions: HashMap<(YangVersion, QName), Arc<StatementSupport>>,
}

impl BuildState {
    pub(crate) fn new(supports: Arc<PhaseSupports>, config: ReactorConfig) -> Self {
        Self {
            nodes: Vec::new(),
            global: NamespaceStorage::new(),
            registry: RefCell::new(NamespaceRegistry::default()),
            phase: ModelProcessingPhase::Init,
            supports,
            config,
            mutables: MutableRegistry::default(),
            sources: Vec::new(),
            definitions: HashMap::new(),
        }
    }

    /// Phase currently being executed
    #[must_use]
    pub fn phase(&self) -> ModelProcessingPhase {
        self.phase
    }

    /// Build configuration
    #[must_use]
    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Number of statements across all sources
    #[must_use]
    pub fn statement_count(&self) -> usize {
        self.nodes.len()
    }

    /// Read view of a statement
    #[must_use]
    pub fn stmt(&self, id: StmtId) -> StmtContext<'_> {
        StmtContext { state: self, id }
    }

    pub(crate) fn node(&self, id: StmtId) -> &StmtNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: StmtId) -> &mut StmtNode {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn alloc(&mut self, node: StmtNode) -> StmtId {
        let id = StmtId(self.nodes.len() as u32);
        let parent = node.parent;
        self.nodes.push(node);
        if let Some(parent) = parent {
            self.node_mut(parent).children.push(id);
        }
        id
    }

    pub(crate) fn register_source(&mut self) -> SourceKey {
        let key = SourceKey(self.sources.len() as u32);
        self.sources.push(SourceStatus {
            finished: ModelProcessingPhase::Init,
            root: None,
        });
        key
    }

    pub(crate) fn source_status(&self, key: SourceKey) -> SourceStatus {
        self.sources[key.index()]
    }

    pub(crate) fn set_source_root(&mut self, key: SourceKey, root: StmtId) {
        self.sources[key.index()].root = Some(root);
    }

    pub(crate) fn set_source_finished(&mut self, key: SourceKey, phase: ModelProcessingPhase) {
        self.sources[key.index()].finished = phase;
    }

    /// Bundle in effect for the current phase
    pub(crate) fn bundle(&self) -> &StatementSupportBundle {
        self.supports.for_phase(self.phase)
    }

    pub(crate) fn supports(&self) -> &PhaseSupports {
        &self.supports
    }

    /// Support for `keyword`, memoized per language version
    pub(crate) fn statement_definition(
        &mut self,
        version: YangVersion,
        keyword: &QName,
    ) -> Option<Arc<StatementSupport>> {
        let key = (version, keyword.clone());
        if let Some(existing) = self.definitions.get(&key) {
            return Some(Arc::clone(existing));
        }
        let bundle = self.supports.for_phase(self.phase);
        let found = Arc::clone(bundle.statement_definition(version, keyword)?);
        self.definitions.insert(key, Arc::clone(&found));
        Some(found)
    }

    fn context(&self, id: NamespaceId) -> SourceResult<NamespaceContext> {
        self.registry
            .borrow_mut()
            .behaviour(id, self.phase, self.supports.for_phase(self.phase))
    }

    /// Write generation of a namespace, if it has been used
    pub(crate) fn generation(&self, id: NamespaceId) -> Option<u64> {
        self.registry.borrow().generation(id)
    }

    fn root_of(&self, mut id: StmtId) -> StmtId {
        while let Some(parent) = self.node(id).parent {
            id = parent;
        }
        id
    }

    /// Storages consulted for a lookup, nearest first
    fn lookup_chain(
        &self,
        scope: StorageScope,
        at: Option<StmtId>,
    ) -> SourceResult<Vec<&NamespaceStorage>> {
        Ok(match (scope, at) {
            (StorageScope::Global, _) => vec![&self.global],
            (StorageScope::Source, Some(at)) => vec![&self.node(self.root_of(at)).storage],
            (StorageScope::Statement, Some(at)) => vec![&self.node(at).storage],
            (StorageScope::Tree, Some(at)) => {
                let mut chain = Vec::new();
                let mut current = Some(at);
                while let Some(id) = current {
                    chain.push(&self.node(id).storage);
                    current = self.node(id).parent;
                }
                chain.push(&self.global);
                chain
            }
            (scope, None) => {
                return Err(SourceError::internal(format!(
                    "{:?} namespace accessed without a statement",
                    scope
                )));
            }
        })
    }

    fn lookup<N: Namespace>(
        &self,
        at: Option<StmtId>,
        key: &N::Key,
    ) -> SourceResult<Option<N::Value>> {
        let context = self.context(NamespaceId::of::<N>())?;
        let chain = self.lookup_chain(context.scope, at)?;
        Ok(match &context.derived {
            None => chain.iter().find_map(|storage| storage.get::<N>(key).cloned()),
            Some(view) => chain.iter().find_map(|storage| {
                let base = storage.erased(view.base)?;
                let value = (view.derive)(base, key as &dyn Any)?;
                value.downcast::<N::Value>().ok().map(|value| *value)
            }),
        })
    }

    /// Value bound to `key` in `N`, as visible from statement `at`
    ///
    /// # Errors
    ///
    /// Returns error if `N` is not registered for the current phase
    pub fn get<N: Namespace>(&self, at: StmtId, key: &N::Key) -> SourceResult<Option<N::Value>> {
        self.lookup::<N>(Some(at), key)
    }

    /// Value bound to `key` in a global namespace
    ///
    /// # Errors
    ///
    /// Returns error if `N` is not registered or not global
    pub fn get_global<N: Namespace>(&self, key: &N::Key) -> SourceResult<Option<N::Value>> {
        self.lookup::<N>(None, key)
    }

    pub(crate) fn put<N: Namespace>(
        &mut self,
        at: Option<StmtId>,
        key: N::Key,
        value: N::Value,
    ) -> SourceResult<()> {
        let context = self.context(NamespaceId::of::<N>())?;
        if context.derived.is_some() {
            return Err(SourceError::internal(format!(
                "Namespace {} is derived and cannot be written",
                N::NAME
            )));
        }
        let outcome = match (context.scope, at) {
            (StorageScope::Global, _) => self.global.put::<N>(key.clone(), value),
            (StorageScope::Source, Some(at)) => {
                let root = self.root_of(at);
                self.node_mut(root).storage.put::<N>(key.clone(), value)
            }
            (StorageScope::Statement | StorageScope::Tree, Some(at)) => {
                self.node_mut(at).storage.put::<N>(key.clone(), value)
            }
            (scope, None) => {
                return Err(SourceError::internal(format!(
                    "{:?} namespace {} written without a statement",
                    scope,
                    N::NAME
                )));
            }
        };
        match outcome {
            Some(PutOutcome::Inserted) => {
                context.record_write();
                Ok(())
            }
            Some(PutOutcome::Unchanged) => Ok(()),
            Some(PutOutcome::Conflict(existing)) => Err(SourceError::at(
                format!(
                    "{} already binds {:?} to {:?}, cannot rebind it",
                    N::NAME,
                    key,
                    existing
                ),
                at.and_then(|at| self.node(at).reference.as_ref()),
            )),
            None => Err(SourceError::internal(format!(
                "Storage of namespace {} holds another type",
                N::NAME
            ))),
        }
    }

    /// Write into a global namespace outside of any statement
    pub(crate) fn put_global<N: Namespace>(
        &mut self,
        key: N::Key,
        value: N::Value,
    ) -> SourceResult<()> {
        self.put::<N>(None, key, value)
    }
}

impl std::fmt::Debug for BuildState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildState")
            .field("phase", &self.phase)
            .field("statements", &self.nodes.len())
            .field("sources", &self.sources.len())
            .field("namespaces", &self.registry.borrow().len())
            .finish()
    }
}

/// Read-only view of one statement
#[derive(Clone, Copy)]
pub struct StmtContext<'a> {
    state: &'a BuildState,
    id: StmtId,
}

impl<'a> StmtContext<'a> {
    fn node(&self) -> &'a StmtNode {
        self.state.node(self.id)
    }

    /// Statement handle
    #[must_use]
    pub fn id(&self) -> StmtId {
        self.id
    }

    /// Build state
    #[must_use]
    pub fn state(&self) -> &'a BuildState {
        self.state
    }

    /// View of another statement
    #[must_use]
    pub fn stmt(&self, id: StmtId) -> StmtContext<'a> {
        StmtContext {
            state: self.state,
            id,
        }
    }

    /// Keyword as written
    #[must_use]
    pub fn raw_keyword(&self) -> &'a str {
        &self.node().raw_keyword
    }

    /// Keyword without prefix
    #[must_use]
    pub fn local_keyword(&self) -> &'a str {
        &self.node().local
    }

    /// Keyword prefix of an extension instance
    #[must_use]
    pub fn keyword_prefix(&self) -> Option<&'a str> {
        self.node().prefix.as_deref()
    }

    /// Keyword identity, once the statement is bound to a support
    #[must_use]
    pub fn keyword(&self) -> Option<&'a QName> {
        self.node().keyword.as_ref()
    }

    /// Argument as written
    #[must_use]
    pub fn raw_argument(&self) -> Option<&'a str> {
        self.node().raw_argument.as_deref()
    }

    /// Parsed argument
    #[must_use]
    pub fn argument(&self) -> &'a ArgumentValue {
        &self.node().argument
    }

    /// Position in the source
    #[must_use]
    pub fn reference(&self) -> Option<&'a StatementSourceReference> {
        self.node().reference.as_ref()
    }

    /// Owning source
    #[must_use]
    pub fn source_key(&self) -> SourceKey {
        self.node().source
    }

    /// Parent statement
    #[must_use]
    pub fn parent(&self) -> Option<StmtContext<'a>> {
        self.node().parent.map(|id| self.stmt(id))
    }

    /// Root statement of the owning source
    #[must_use]
    pub fn root(&self) -> StmtContext<'a> {
        self.stmt(self.state.root_of(self.id))
    }

    /// Whether this is a source root
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    /// Declared substatements in source order
    pub fn children(&self) -> impl Iterator<Item = StmtContext<'a>> + 'a {
        let state = self.state;
        self.node().children.iter().map(move |&id| StmtContext { state, id })
    }

    /// Declared substatements written with `keyword`
    pub fn children_with(&self, keyword: &'a str) -> impl Iterator<Item = StmtContext<'a>> + 'a {
        self.children().filter(move |c| c.raw_keyword() == keyword)
    }

    /// First declared substatement written with `keyword`
    #[must_use]
    pub fn first_child(&self, keyword: &'a str) -> Option<StmtContext<'a>> {
        self.children_with(keyword).next()
    }

    /// Latest revision among `revision` substatements
    #[must_use]
    pub fn latest_revision(&self) -> Option<Revision> {
        self.children_with("revision")
            .filter_map(|c| c.raw_argument().and_then(|raw| Revision::parse(raw).ok()))
            .max()
    }

    /// Whether the statement takes part in the effective model
    #[must_use]
    pub fn is_supported(&self) -> bool {
        self.node().supported
    }

    /// Whether the statement is an extension instance
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        self.node().unknown
    }

    /// Value bound to `key` in `N`, as visible from this statement
    ///
    /// # Errors
    ///
    /// Returns error if `N` is not registered for the current phase
    pub fn get<N: Namespace>(&self, key: &N::Key) -> SourceResult<Option<N::Value>> {
        self.state.get::<N>(self.id, key)
    }

    /// Entries of a statement-local namespace stored on this statement
    #[must_use]
    pub fn local_entries<N: Namespace>(&self) -> Vec<(N::Key, N::Value)> {
        self.node()
            .storage
            .map::<N>()
            .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default()
    }

    /// Phase currently being executed
    #[must_use]
    pub fn phase(&self) -> ModelProcessingPhase {
        self.state.phase
    }

    /// Build configuration
    #[must_use]
    pub fn config(&self) -> &'a ReactorConfig {
        &self.state.config
    }
}

impl std::fmt::Debug for StmtContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.raw_keyword(), self.raw_argument())
    }
}

/// Mutable view of one statement, handed to phase hooks and actions
pub struct StmtContextMut<'a> {
    state: &'a mut BuildState,
    book: &'a mut SourceBook,
    id: StmtId,
}

impl<'a> StmtContextMut<'a> {
    pub(crate) fn new(state: &'a mut BuildState, book: &'a mut SourceBook, id: StmtId) -> Self {
        Self { state, book, id }
    }

    /// Statement handle
    #[must_use]
    pub fn id(&self) -> StmtId {
        self.id
    }

    /// Read view of this statement
    #[must_use]
    pub fn view(&self) -> StmtContext<'_> {
        self.state.stmt(self.id)
    }

    /// Read view of another statement
    #[must_use]
    pub fn stmt(&self, id: StmtId) -> StmtContext<'_> {
        self.state.stmt(id)
    }

    /// Value bound to `key` in `N`, as visible from this statement
    ///
    /// # Errors
    ///
    /// Returns error if `N` is not registered for the current phase
    pub fn get<N: Namespace>(&self, key: &N::Key) -> SourceResult<Option<N::Value>> {
        self.state.get::<N>(self.id, key)
    }

    /// Bind `key` in `N` from this statement
    ///
    /// # Errors
    ///
    /// Returns error if the key is bound to a different value, or `N` is
    /// derived or unavailable
    pub fn put<N: Namespace>(&mut self, key: N::Key, value: N::Value) -> SourceResult<()> {
        self.state.put::<N>(Some(self.id), key, value)
    }

    /// Bind `key` in `N` on behalf of another statement
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put)
    pub fn put_at<N: Namespace>(
        &mut self,
        at: StmtId,
        key: N::Key,
        value: N::Value,
    ) -> SourceResult<()> {
        self.state.put::<N>(Some(at), key, value)
    }

    /// Record a source this source cannot be built without
    pub fn add_required_source(&mut self, source: SourceIdentifier) {
        self.book.required.insert(source);
    }

    /// Set the identity of this source
    pub fn set_root_identifier(&mut self, identifier: SourceIdentifier) {
        self.book.root_identifier = Some(identifier);
    }

    /// Queue an action to run once its requirements resolve
    pub fn add_action(&mut self, action: ModelAction) {
        self.book.actions.push(action);
    }

    /// Register state to be sealed after the build
    pub fn add_mutable(&mut self, statement: Arc<dyn MutableStatement>) {
        self.state.mutables.register(statement);
    }

    /// Include or exclude a statement from the effective model
    pub fn set_supported(&mut self, target: StmtId, supported: bool) {
        self.state.node_mut(target).supported = supported;
    }

    /// Place `child` among the effective substatements of `target`
    pub fn add_effective_child(&mut self, target: StmtId, child: StmtId, origin: StatementOrigin) {
        self.state.node_mut(target).additions.push((child, origin));
    }

    /// Bind this extension instance to the generic unknown-statement support
    /// and run the hooks it missed
    ///
    /// # Errors
    ///
    /// Returns error if no bundle provides an unknown-statement support or a
    /// hook fails
    pub fn bind_unknown(&mut self, keyword: QName) -> SourceResult<()> {
        let node = self.state.node(self.id);
        let Some(support) = self.state.bundle().unknown_support().cloned() else {
            return Err(SourceError::at(
                format!("No support for extension instance {}", node.raw_keyword),
                node.reference.as_ref(),
            ));
        };
        let argument =
            support.parse_argument(node.raw_argument.as_deref(), node.reference.as_ref())?;
        let node = self.state.node_mut(self.id);
        node.keyword = Some(keyword);
        node.definition = Some(support);
        node.argument = argument;
        node.unknown = true;
        let phase = self.state.phase;
        advance(self.state, self.book, self.id, phase)
    }

    /// Phase currently being executed
    #[must_use]
    pub fn phase(&self) -> ModelProcessingPhase {
        self.state.phase
    }

    /// Build configuration
    #[must_use]
    pub fn config(&self) -> &ReactorConfig {
        &self.state.config
    }
}
