//! Namespaces: typed cross-reference tables populated and queried by
//! statements.
//!
//! A [`Namespace`] is a marker type naming a key/value table. Statement
//! support bundles register a [`NamespaceBehaviour`] for it per phase, which
//! decides where entries are stored ([`StorageScope`]) or, for derived
//! namespaces, how entries are computed from a base namespace.

use crate::bundle::StatementSupportBundle;
use crate::error::{SourceError, SourceResult};
use indexmap::IndexMap;
use schemata_core::{ListenerRegistry, ModelProcessingPhase};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// A typed cross-reference table
pub trait Namespace: 'static {
    /// Lookup key
    type Key: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static;
    /// Bound value
    type Value: Clone + PartialEq + fmt::Debug + Send + Sync + 'static;
    /// Human-readable name used in diagnostics
    const NAME: &'static str;
}

/// Entries of one namespace in one storage node
pub type NamespaceMap<N> = IndexMap<<N as Namespace>::Key, <N as Namespace>::Value>;

/// Runtime identity of a namespace type
#[derive(Clone, Copy)]
pub struct NamespaceId {
    type_id: TypeId,
    name: &'static str,
}

impl NamespaceId {
    /// Identity of `N`
    #[must_use]
    pub fn of<N: Namespace>() -> Self {
        Self {
            type_id: TypeId::of::<N>(),
            name: N::NAME,
        }
    }

    /// Namespace name
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for NamespaceId {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for NamespaceId {}

impl Hash for NamespaceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamespaceId({})", self.name)
    }
}

impl fmt::Display for NamespaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Where entries of a simple namespace live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageScope {
    /// One table shared by the whole build
    Global,
    /// One table per source, held by its root statement
    Source,
    /// One table per statement, visible only through that statement
    Statement,
    /// Stored per statement; lookups walk up through ancestors, then global
    Tree,
}

type ErasedMap = dyn Any + Send + Sync;
type DeriveFn = Arc<dyn Fn(&ErasedMap, &dyn Any) -> Option<Box<dyn Any>> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum BehaviourKind {
    Simple(StorageScope),
    Derived { base: NamespaceId, derive: DeriveFn },
}

/// Registration of a namespace in a support bundle
#[derive(Clone)]
pub struct NamespaceBehaviour {
    id: NamespaceId,
    pub(crate) kind: BehaviourKind,
}

impl NamespaceBehaviour {
    /// Simple namespace stored at `scope`
    #[must_use]
    pub fn simple<N: Namespace>(scope: StorageScope) -> Self {
        Self {
            id: NamespaceId::of::<N>(),
            kind: BehaviourKind::Simple(scope),
        }
    }

    /// Build-wide namespace
    #[must_use]
    pub fn global<N: Namespace>() -> Self {
        Self::simple::<N>(StorageScope::Global)
    }

    /// Per-source namespace
    #[must_use]
    pub fn source_local<N: Namespace>() -> Self {
        Self::simple::<N>(StorageScope::Source)
    }

    /// Per-statement namespace
    #[must_use]
    pub fn statement_local<N: Namespace>() -> Self {
        Self::simple::<N>(StorageScope::Statement)
    }

    /// Per-statement namespace with ancestor lookup
    #[must_use]
    pub fn tree_scoped<N: Namespace>() -> Self {
        Self::simple::<N>(StorageScope::Tree)
    }

    /// Read-only namespace computed from the entries of `B`
    ///
    /// The derived namespace shares the storage scope of its base.
    #[must_use]
    pub fn derived<N, B>(derive: fn(&N::Key, &NamespaceMap<B>) -> Option<N::Value>) -> Self
    where
        N: Namespace,
        B: Namespace,
    {
        let derive: DeriveFn = Arc::new(move |base: &ErasedMap, key: &dyn Any| {
            let base = base.downcast_ref::<NamespaceMap<B>>()?;
            let key = key.downcast_ref::<N::Key>()?;
            derive(key, base).map(|value| Box::new(value) as Box<dyn Any>)
        });
        Self {
            id: NamespaceId::of::<N>(),
            kind: BehaviourKind::Derived {
                base: NamespaceId::of::<B>(),
                derive,
            },
        }
    }

    /// Namespace this behaviour is registered for
    #[must_use]
    pub fn id(&self) -> NamespaceId {
        self.id
    }

    /// Whether entries are computed from another namespace
    #[must_use]
    pub fn is_derived(&self) -> bool {
        matches!(self.kind, BehaviourKind::Derived { .. })
    }
}

impl fmt::Debug for NamespaceBehaviour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            BehaviourKind::Simple(scope) => write!(f, "Simple({}, {:?})", self.id, scope),
            BehaviourKind::Derived { base, .. } => write!(f, "Derived({} <- {})", self.id, base),
        }
    }
}

/// Outcome of writing a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PutOutcome<V> {
    /// Key was absent and is now bound
    Inserted,
    /// Key was already bound to an equal value
    Unchanged,
    /// Key is bound to a different value, which is kept
    Conflict(V),
}

/// Namespace tables of one storage node
#[derive(Default)]
pub struct NamespaceStorage {
    maps: HashMap<NamespaceId, Box<ErasedMap>>,
}

impl NamespaceStorage {
    /// Create empty storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `key` in `N`
    #[must_use]
    pub fn get<N: Namespace>(&self, key: &N::Key) -> Option<&N::Value> {
        self.map::<N>()?.get(key)
    }

    /// All entries of `N`
    #[must_use]
    pub fn map<N: Namespace>(&self) -> Option<&NamespaceMap<N>> {
        self.maps.get(&NamespaceId::of::<N>())?.downcast_ref()
    }

    pub(crate) fn erased(&self, id: NamespaceId) -> Option<&ErasedMap> {
        self.maps.get(&id).map(|map| map.as_ref())
    }

    /// Bind `key` unless it is already bound; a bound key never changes
    pub(crate) fn put<N: Namespace>(
        &mut self,
        key: N::Key,
        value: N::Value,
    ) -> Option<PutOutcome<N::Value>> {
        let map = self
            .maps
            .entry(NamespaceId::of::<N>())
            .or_insert_with(|| Box::new(NamespaceMap::<N>::new()))
            .downcast_mut::<NamespaceMap<N>>()?;
        Some(match map.get(&key) {
            None => {
                map.insert(key, value);
                PutOutcome::Inserted
            }
            Some(existing) if *existing == value => PutOutcome::Unchanged,
            Some(existing) => PutOutcome::Conflict(existing.clone()),
        })
    }

    /// Number of namespaces with at least one table here
    #[must_use]
    pub fn namespace_count(&self) -> usize {
        self.maps.len()
    }

    /// Whether no namespace has a table here
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

impl fmt::Debug for NamespaceStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set()
            .entries(self.maps.keys().map(NamespaceId::name))
            .finish()
    }
}

#[derive(Clone)]
pub(crate) struct DerivedView {
    pub(crate) base: NamespaceId,
    pub(crate) derive: DeriveFn,
}

/// A behaviour bound to a build, with change tracking
#[derive(Clone)]
pub(crate) struct NamespaceContext {
    pub(crate) id: NamespaceId,
    pub(crate) scope: StorageScope,
    pub(crate) derived: Option<DerivedView>,
    generation: Arc<AtomicU64>,
    writes: Arc<ListenerRegistry<NamespaceId>>,
}

impl NamespaceContext {
    fn new(id: NamespaceId, scope: StorageScope, derived: Option<DerivedView>) -> Self {
        Self {
            id,
            scope,
            derived,
            generation: Arc::new(AtomicU64::new(0)),
            writes: Arc::new(ListenerRegistry::new()),
        }
    }

    /// Number of observed writes, including writes to the base
    pub(crate) fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub(crate) fn record_write(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.writes.publish(self.id);
    }

    /// Make writes to this namespace visible as changes of `dependent`
    fn add_dependent(&self, dependent: &NamespaceContext) {
        let generation = Arc::clone(&dependent.generation);
        let writes = Arc::clone(&dependent.writes);
        let id = dependent.id;
        self.writes.subscribe(move |_| {
            generation.fetch_add(1, Ordering::SeqCst);
            writes.publish(id);
        });
    }
}

/// Per-build memo of namespace behaviours
#[derive(Default)]
pub(crate) struct NamespaceRegistry {
    contexts: HashMap<NamespaceId, NamespaceContext>,
}

impl NamespaceRegistry {
    /// Behaviour for `id`, resolved against the bundle of `phase` on first use
    pub(crate) fn behaviour(
        &mut self,
        id: NamespaceId,
        phase: ModelProcessingPhase,
        bundle: &StatementSupportBundle,
    ) -> SourceResult<NamespaceContext> {
        self.resolve(id, phase, bundle, &mut Vec::new())
    }

    fn resolve(
        &mut self,
        id: NamespaceId,
        phase: ModelProcessingPhase,
        bundle: &StatementSupportBundle,
        visiting: &mut Vec<NamespaceId>,
    ) -> SourceResult<NamespaceContext> {
        if let Some(existing) = self.contexts.get(&id) {
            return Ok(existing.clone());
        }
        if visiting.contains(&id) {
            return Err(SourceError::internal(format!(
                "Namespace {} is derived from itself",
                id
            )));
        }
        let raw = bundle
            .namespace_behaviour(id)
            .ok_or_else(|| SourceError::namespace_not_available(id.name(), phase))?;
        let context = match &raw.kind {
            BehaviourKind::Simple(scope) => NamespaceContext::new(id, *scope, None),
            BehaviourKind::Derived { base, derive } => {
                visiting.push(id);
                let base_context = self.resolve(*base, phase, bundle, visiting)?;
                visiting.pop();
                let context = NamespaceContext::new(
                    id,
                    base_context.scope,
                    Some(DerivedView {
                        base: *base,
                        derive: Arc::clone(derive),
                    }),
                );
                base_context.add_dependent(&context);
                context
            }
        };
        self.contexts.insert(id, context.clone());
        Ok(context)
    }

    /// Write generation of an already resolved namespace
    pub(crate) fn generation(&self, id: NamespaceId) -> Option<u64> {
        self.contexts.get(&id).map(NamespaceContext::generation)
    }

    pub(crate) fn len(&self) -> usize {
        self.contexts.len()
    }
}
