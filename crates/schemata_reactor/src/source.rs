//! Source contexts.
//!
//! A [`SourceContext`] owns one source's statement tree and walks it through
//! the phases: loading statements for a phase binds keywords to supports and
//! runs phase hooks, completing a phase applies queued actions whose
//! requirements have resolved.

use crate::action::{ModelAction, Requirement};
use crate::error::{ReactorError, ReactorResult, SourceError, SourceResult};
use crate::namespace::NamespaceId;
use crate::namespaces::{ExtensionNamespace, ModuleCtxToModuleQName, PrefixToModule};
use crate::state::{BuildState, StmtContextMut};
use crate::stmt::{SourceKey, StmtId, StmtNode, yang_module};
use crate::stream::{RawStatement, StatementStreamSource};
use indexmap::IndexSet;
use schemata_core::{ModelProcessingPhase, QName, SourceIdentifier, YangVersion};
use std::fmt;
use tracing::trace;

/// Outcome of one attempt to complete a phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseCompletionProgress {
    /// Nothing remains for the phase
    Finished,
    /// Some actions ran, others remain
    Progress,
    /// Nothing could run
    NoProgress,
}

/// Per-source bookkeeping reachable from statement contexts
#[derive(Debug)]
pub(crate) struct SourceBook {
    pub(crate) key: SourceKey,
    pub(crate) root: Option<StmtId>,
    pub(crate) root_identifier: Option<SourceIdentifier>,
    pub(crate) required: IndexSet<SourceIdentifier>,
    pub(crate) actions: Vec<ModelAction>,
    pub(crate) version: YangVersion,
    /// Statements in pre-order
    pub(crate) statements: Vec<StmtId>,
}

impl SourceBook {
    fn new(key: SourceKey) -> Self {
        Self {
            key,
            root: None,
            root_identifier: None,
            required: IndexSet::new(),
            actions: Vec::new(),
            version: YangVersion::default(),
            statements: Vec::new(),
        }
    }
}

/// Run the hooks `id` has not yet run, up to and including `phase`
pub(crate) fn advance(
    state: &mut BuildState,
    book: &mut SourceBook,
    id: StmtId,
    phase: ModelProcessingPhase,
) -> SourceResult<()> {
    let node = state.node(id);
    let Some(support) = node.definition.clone() else {
        return Ok(());
    };
    let reference = node.reference.clone();
    let hooked = node.hooked;
    for step in ModelProcessingPhase::ALL {
        if step > phase || hooked.is_some_and(|done| step <= done) {
            continue;
        }
        if let Some(hook) = support.hook(step) {
            let mut ctx = StmtContextMut::new(state, book, id);
            hook(&mut ctx).map_err(|err| err.or_at(reference.as_ref()))?;
        }
        state.node_mut(id).hooked = Some(step);
    }
    Ok(())
}

/// One source moving through the phases
pub(crate) struct SourceContext {
    stream: Box<dyn StatementStreamSource>,
    pub(crate) book: SourceBook,
    finished: ModelProcessingPhase,
    current: Option<ModelProcessingPhase>,
}

impl SourceContext {
    pub(crate) fn new(stream: Box<dyn StatementStreamSource>, key: SourceKey) -> Self {
        Self {
            stream,
            book: SourceBook::new(key),
            finished: ModelProcessingPhase::Init,
            current: None,
        }
    }

    pub(crate) fn root_identifier(&self) -> Option<&SourceIdentifier> {
        self.book.root_identifier.as_ref()
    }

    pub(crate) fn required_sources(&self) -> &IndexSet<SourceIdentifier> {
        &self.book.required
    }

    pub(crate) fn root(&self) -> Option<StmtId> {
        self.book.root
    }

    /// Begin `phase`; the previous phase must have finished
    pub(crate) fn start_phase(&mut self, phase: ModelProcessingPhase) -> ReactorResult<()> {
        if phase.previous() != Some(self.finished) {
            return Err(ReactorError::PhaseOrder {
                requested: phase,
                finished: self.finished,
            });
        }
        self.current = Some(phase);
        Ok(())
    }

    fn current_phase(&self) -> SourceResult<ModelProcessingPhase> {
        self.current
            .ok_or_else(|| {
                SourceError::internal(format!("Source {} has no phase in progress", self))
            })
    }

    /// Materialize and bind the statements needed for the current phase
    pub(crate) fn load_statements(&mut self, state: &mut BuildState) -> SourceResult<()> {
        let phase = self.current_phase()?;
        if phase == ModelProcessingPhase::PreLinkage {
            let raw = self.stream.emit()?;
            self.book.version = root_version(&raw, state)?;
            let root = self.materialize(state, raw, None);
            self.book.root = Some(root);
            state.set_source_root(self.book.key, root);
        }

        for index in 0..self.book.statements.len() {
            let id = self.book.statements[index];
            self.bind(state, id)?;
            advance(state, &mut self.book, id, phase)?;
            if phase == ModelProcessingPhase::StatementDefinition {
                self.queue_extension_resolution(state, id);
            }
        }

        if phase == ModelProcessingPhase::FullDeclaration {
            for &id in &self.book.statements {
                check_bound(state, id)?;
            }
            for &id in &self.book.statements {
                validate(state, id)?;
            }
        }
        Ok(())
    }

    fn materialize(
        &mut self,
        state: &mut BuildState,
        raw: RawStatement,
        parent: Option<StmtId>,
    ) -> StmtId {
        let RawStatement {
            keyword,
            argument,
            substatements,
            reference,
        } = raw;
        let id = state.alloc(StmtNode::new(keyword, argument, parent, self.book.key, reference));
        self.book.statements.push(id);
        for child in substatements {
            self.materialize(state, child, Some(id));
        }
        id
    }

    /// Bind a built-in keyword to its support, if the current bundle has one
    fn bind(&self, state: &mut BuildState, id: StmtId) -> SourceResult<()> {
        let node = state.node(id);
        if node.definition.is_some() || node.prefix.is_some() {
            return Ok(());
        }
        let reference = node.reference.clone();
        let keyword = QName::create(yang_module(), &node.local)
            .map_err(|err| SourceError::at(err.to_string(), reference.as_ref()))?;
        let Some(support) = state.statement_definition(self.book.version, &keyword) else {
            return Ok(());
        };
        let node = state.node(id);
        let argument = support.parse_argument(node.raw_argument.as_deref(), reference.as_ref())?;
        let node = state.node_mut(id);
        node.keyword = Some(keyword);
        node.definition = Some(support);
        node.argument = argument;
        Ok(())
    }

    /// Queue binding of an extension instance once its definition is known
    fn queue_extension_resolution(&mut self, state: &BuildState, id: StmtId) {
        let node = state.node(id);
        let Some(prefix) = node.prefix.clone() else {
            return;
        };
        if node.definition.is_some() {
            return;
        }
        let local = node.local.clone();
        let lookup_prefix = prefix.clone();
        let lookup_local = local.clone();
        let requirement = Requirement::custom(
            format!("extension {}:{}", prefix, local),
            vec![
                NamespaceId::of::<PrefixToModule>(),
                NamespaceId::of::<ExtensionNamespace>(),
            ],
            move |state| {
                let Some(module) = state.get::<PrefixToModule>(id, &lookup_prefix)? else {
                    return Ok(None);
                };
                let name = QName::create(module, &lookup_local)?;
                state.get_global::<ExtensionNamespace>(&name)
            },
        );
        let action = ModelAction::new(
            id,
            ModelProcessingPhase::StatementDefinition,
            format!("Definition of {}:{}", prefix, local),
            move |ctx, _| {
                let module = ctx.get::<PrefixToModule>(&prefix)?.ok_or_else(|| {
                    SourceError::internal(format!("Prefix {} disappeared", prefix))
                })?;
                ctx.bind_unknown(QName::create(module, &local)?)
            },
        )
        .requires(requirement);
        self.book.actions.push(action);
    }

    /// Run as many ready actions of `phase` as possible
    pub(crate) fn try_to_complete_phase(
        &mut self,
        state: &mut BuildState,
        phase: ModelProcessingPhase,
    ) -> SourceResult<PhaseCompletionProgress> {
        let mut progressed = false;
        let mut waiting = Vec::new();
        for mut action in std::mem::take(&mut self.book.actions) {
            if action.phase() > phase || !action.poll(state)? {
                waiting.push(action);
                continue;
            }
            let (owner, resolved, apply) = action.into_parts();
            let reference = state.stmt(owner).reference().cloned();
            let mut ctx = StmtContextMut::new(state, &mut self.book, owner);
            apply(&mut ctx, &resolved).map_err(|err| err.or_at(reference.as_ref()))?;
            progressed = true;
        }
        // Actions queued while applying go after the ones still waiting
        waiting.append(&mut self.book.actions);
        self.book.actions = waiting;

        let pending = self.book.actions.iter().filter(|a| a.phase() <= phase).count();
        trace!(source = %self, %phase, pending, progressed, "Tried to complete phase");
        if pending == 0 {
            self.finished = phase;
            self.current = None;
            state.set_source_finished(self.book.key, phase);
            return Ok(PhaseCompletionProgress::Finished);
        }
        Ok(if progressed {
            PhaseCompletionProgress::Progress
        } else {
            PhaseCompletionProgress::NoProgress
        })
    }

    /// Explain the actions of `phase` that never ran
    ///
    /// The first unresolved action is the returned error; the others are
    /// attached to it as suppressed errors.
    pub(crate) fn fail_modifiers(
        &self,
        state: &BuildState,
        phase: ModelProcessingPhase,
    ) -> Option<SourceError> {
        let mut failures = self
            .book
            .actions
            .iter()
            .filter(|a| a.phase() <= phase)
            .map(|a| a.failure(state));
        let mut primary = failures.next()?;
        for failure in failures {
            primary.add_suppressed(failure);
        }
        Some(primary)
    }

    /// Identity to blame for errors in this source
    ///
    /// Modules are named by their argument and module revision, other roots
    /// by their argument and latest `revision` substatement. A source with
    /// no root falls back to the identity its stream declares.
    pub(crate) fn error_identifier(&self, state: &BuildState) -> SourceIdentifier {
        let Some(root) = self.book.root else {
            return self.stream.identifier();
        };
        let ctx = state.stmt(root);
        let Some(name) = ctx.raw_argument() else {
            return self.stream.identifier();
        };
        // Read storage directly: the namespace may be unregistered here
        match state.global.get::<ModuleCtxToModuleQName>(&root) {
            Some(module) => SourceIdentifier::with_revision(name, module.revision()),
            None => SourceIdentifier::with_revision(name, ctx.latest_revision()),
        }
    }
}

impl fmt::Display for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.book.root_identifier {
            Some(identifier) => write!(f, "{}", identifier),
            None => write!(f, "{}", self.stream.identifier()),
        }
    }
}

impl fmt::Debug for SourceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceContext")
            .field("source", &self.stream.identifier())
            .field("finished", &self.finished)
            .field("current", &self.current)
            .field("actions", &self.book.actions.len())
            .finish()
    }
}

/// Language version declared by a root's `yang-version` substatement
fn root_version(raw: &RawStatement, state: &BuildState) -> SourceResult<YangVersion> {
    let Some(stmt) = raw.substatements.iter().find(|s| s.keyword == "yang-version") else {
        return Ok(YangVersion::default());
    };
    let value = stmt.argument.as_deref().unwrap_or_default();
    let version = YangVersion::parse(value)
        .map_err(|err| SourceError::at(err.to_string(), stmt.reference.as_ref()))?;
    let supported = state
        .supports()
        .for_phase(ModelProcessingPhase::Init)
        .supported_versions();
    if !supported.contains(&version) {
        return Err(SourceError::at(
            format!("Language version {} is not supported", version),
            stmt.reference.as_ref(),
        ));
    }
    Ok(version)
}

/// Built-in keywords must have a support by FULL_DECLARATION
fn check_bound(state: &BuildState, id: StmtId) -> SourceResult<()> {
    let ctx = state.stmt(id);
    if ctx.keyword_prefix().is_none() && ctx.keyword().is_none() {
        return Err(SourceError::at(
            format!("{} is not a valid statement", ctx.raw_keyword()),
            ctx.reference(),
        ));
    }
    Ok(())
}

/// Substatement cardinality checks
fn validate(state: &BuildState, id: StmtId) -> SourceResult<()> {
    let ctx = state.stmt(id);
    let Some(validator) = state.node(id).definition.as_ref().and_then(|d| d.validator()) else {
        return Ok(());
    };
    let children = ctx
        .children()
        .filter(|c| c.keyword_prefix().is_none())
        .map(|c| c.raw_keyword());
    validator.validate(ctx.raw_keyword(), children, ctx.reference())
}
