//! Model actions.
//!
//! An action is deferred work attached to a statement: a list of
//! [`Requirement`]s that must all resolve to statements, and a closure that
//! runs once they have. Requirements are polled once per sweep; one that
//! watches namespaces is only re-polled after one of them changed.

use crate::error::{SourceError, SourceResult};
use crate::namespace::{Namespace, NamespaceId};
use crate::namespaces::SchemaTreeNamespace;
use crate::schema_tree;
use crate::state::{BuildState, StmtContextMut};
use crate::stmt::StmtId;
use schemata_core::{ModelProcessingPhase, QName};
use std::fmt;

type LookupFn = Box<dyn Fn(&BuildState) -> SourceResult<Option<StmtId>> + Send>;
type ApplyFn = Box<dyn FnOnce(&mut StmtContextMut<'_>, &[StmtId]) -> SourceResult<()> + Send>;

/// A statement an action waits for
pub struct Requirement {
    description: String,
    watches: Vec<NamespaceId>,
    lookup: LookupFn,
    resolved: Option<StmtId>,
    seen: Option<Vec<Option<u64>>>,
}

impl Requirement {
    /// Wait for an entry of a statement-valued namespace, as visible from `at`
    #[must_use]
    pub fn namespace<N>(at: StmtId, key: N::Key) -> Self
    where
        N: Namespace<Value = StmtId>,
    {
        Self {
            description: format!("{} {:?}", N::NAME, key),
            watches: vec![NamespaceId::of::<N>()],
            lookup: Box::new(move |state| state.get::<N>(at, &key)),
            resolved: None,
            seen: None,
        }
    }

    /// Wait for an entry of a global statement-valued namespace
    #[must_use]
    pub fn global<N>(key: N::Key) -> Self
    where
        N: Namespace<Value = StmtId>,
    {
        Self {
            description: format!("{} {:?}", N::NAME, key),
            watches: vec![NamespaceId::of::<N>()],
            lookup: Box::new(move |state| state.get_global::<N>(&key)),
            resolved: None,
            seen: None,
        }
    }

    /// Wait for the schema node at `path` below `root`
    #[must_use]
    pub fn schema_node(root: StmtId, path: Vec<QName>) -> Self {
        let description = path
            .iter()
            .map(|q| q.local_name().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self {
            description: format!("schema node /{}", description),
            watches: vec![NamespaceId::of::<SchemaTreeNamespace>()],
            lookup: Box::new(move |state| schema_tree::find_node(state, root, &path)),
            resolved: None,
            seen: None,
        }
    }

    /// Wait until the source owning `stmt` has finished `phase`
    #[must_use]
    pub fn source_phase(stmt: StmtId, phase: ModelProcessingPhase) -> Self {
        Self {
            description: format!("source of {} to finish {}", stmt, phase),
            watches: Vec::new(),
            lookup: Box::new(move |state| {
                let status = state.source_status(state.stmt(stmt).source_key());
                Ok((status.finished >= phase).then_some(stmt))
            }),
            resolved: None,
            seen: None,
        }
    }

    /// Wait on an arbitrary lookup
    ///
    /// With an empty `watches` the lookup runs on every sweep.
    #[must_use]
    pub fn custom<F>(description: impl Into<String>, watches: Vec<NamespaceId>, lookup: F) -> Self
    where
        F: Fn(&BuildState) -> SourceResult<Option<StmtId>> + Send + 'static,
    {
        Self {
            description: description.into(),
            watches,
            lookup: Box::new(lookup),
            resolved: None,
            seen: None,
        }
    }

    /// What is being waited for
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Statement this requirement resolved to
    #[must_use]
    pub fn resolved(&self) -> Option<StmtId> {
        self.resolved
    }

    fn poll(&mut self, state: &BuildState) -> SourceResult<bool> {
        if self.resolved.is_some() {
            return Ok(true);
        }
        if !self.watches.is_empty() {
            let generations: Vec<_> = self.watches.iter().map(|&w| state.generation(w)).collect();
            if self.seen.as_ref() == Some(&generations) {
                return Ok(false);
            }
            self.seen = Some(generations);
        }
        self.resolved = (self.lookup)(state)?;
        Ok(self.resolved.is_some())
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("description", &self.description)
            .field("resolved", &self.resolved)
            .finish()
    }
}

/// Deferred work of one statement
pub struct ModelAction {
    owner: StmtId,
    phase: ModelProcessingPhase,
    description: String,
    requirements: Vec<Requirement>,
    apply: ApplyFn,
}

impl ModelAction {
    /// Create an action of `owner` to complete in `phase`
    ///
    /// `apply` receives the statements the requirements resolved to, in
    /// the order they were added.
    #[must_use]
    pub fn new<F>(
        owner: StmtId,
        phase: ModelProcessingPhase,
        description: impl Into<String>,
        apply: F,
    ) -> Self
    where
        F: FnOnce(&mut StmtContextMut<'_>, &[StmtId]) -> SourceResult<()> + Send + 'static,
    {
        Self {
            owner,
            phase,
            description: description.into(),
            requirements: Vec::new(),
            apply: Box::new(apply),
        }
    }

    /// Add a requirement
    #[must_use]
    pub fn requires(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    /// Statement owning the action
    #[must_use]
    pub fn owner(&self) -> StmtId {
        self.owner
    }

    /// Phase the action belongs to
    #[must_use]
    pub fn phase(&self) -> ModelProcessingPhase {
        self.phase
    }

    /// Human-readable purpose
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Poll every requirement; true once all have resolved
    pub(crate) fn poll(&mut self, state: &BuildState) -> SourceResult<bool> {
        let mut ready = true;
        for requirement in &mut self.requirements {
            ready &= requirement.poll(state)?;
        }
        Ok(ready)
    }

    pub(crate) fn into_parts(self) -> (StmtId, Vec<StmtId>, ApplyFn) {
        let resolved = self
            .requirements
            .iter()
            .filter_map(Requirement::resolved)
            .collect();
        (self.owner, resolved, self.apply)
    }

    /// Explanation for an action that can never run
    pub(crate) fn failure(&self, state: &BuildState) -> SourceError {
        let pending = self
            .requirements
            .iter()
            .filter(|r| r.resolved.is_none())
            .map(Requirement::description)
            .collect::<Vec<_>>()
            .join(", ");
        SourceError::at(
            format!("{} failed: unresolved {}", self.description, pending),
            state.stmt(self.owner).reference(),
        )
    }
}

impl fmt::Debug for ModelAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelAction")
            .field("owner", &self.owner)
            .field("phase", &self.phase)
            .field("description", &self.description)
            .field("requirements", &self.requirements)
            .finish()
    }
}
