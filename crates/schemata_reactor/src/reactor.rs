//! The cross-source statement reactor.
//!
//! [`CrossSourceStatementReactor`] holds the per-phase vocabulary. Each
//! [`BuildAction`] it hands out is one independent build: sources are
//! registered, then every source is driven through the five phases to a
//! global fixed point and the resulting roots are assembled.

use crate::assemble::Assembler;
use crate::bundle::{PhaseSupports, StatementSupportBundle};
use crate::config::ReactorConfig;
use crate::error::{ReactorError, ReactorResult, SourceError, SourceErrorKind};
use crate::model::{EffectiveSchemaContext, ReactorDeclaredModel};
use crate::namespaces::{ModulesDeviatedByModules, SupportedFeaturesNamespace};
use crate::source::{PhaseCompletionProgress, SourceContext};
use crate::state::BuildState;
use crate::stmt::StmtId;
use crate::stream::StatementStreamSource;
use schemata_core::{ModelProcessingPhase, Revision, SourceIdentifier};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, trace, warn};

/// Reusable reactor configured with per-phase statement supports
#[derive(Debug, Clone)]
pub struct CrossSourceStatementReactor {
    supports: Arc<PhaseSupports>,
}

impl CrossSourceStatementReactor {
    /// Start configuring a reactor
    #[must_use]
    pub fn builder() -> ReactorBuilder {
        ReactorBuilder {
            supports: PhaseSupports::new(),
        }
    }

    /// Start a build with the default configuration
    #[must_use]
    pub fn new_build(&self) -> BuildAction {
        self.new_build_with(ReactorConfig::default())
    }

    /// Start a build with `config`
    #[must_use]
    pub fn new_build_with(&self, config: ReactorConfig) -> BuildAction {
        BuildAction {
            context: BuildGlobalContext::new(Arc::clone(&self.supports), config),
        }
    }
}

/// Builder for [`CrossSourceStatementReactor`]
#[derive(Debug)]
pub struct ReactorBuilder {
    supports: PhaseSupports,
}

impl ReactorBuilder {
    /// Set the vocabulary of `phase`
    #[must_use]
    pub fn phase(mut self, phase: ModelProcessingPhase, bundle: StatementSupportBundle) -> Self {
        self.supports.insert(phase, bundle);
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> CrossSourceStatementReactor {
        CrossSourceStatementReactor {
            supports: Arc::new(self.supports),
        }
    }
}

/// One build: a fixed set of sources compiled once
#[derive(Debug)]
pub struct BuildAction {
    context: BuildGlobalContext,
}

impl BuildAction {
    /// Replace the build configuration
    ///
    /// # Errors
    ///
    /// Returns error when switching to semantic-version mode after library
    /// sources were added
    pub fn with_config(mut self, config: ReactorConfig) -> ReactorResult<Self> {
        self.context.set_config(config)?;
        Ok(self)
    }

    /// Register a main source
    #[must_use]
    pub fn add_source(mut self, source: impl StatementStreamSource + 'static) -> Self {
        self.context.add_source(Box::new(source));
        self
    }

    /// Register several main sources in order
    #[must_use]
    pub fn add_sources<S>(mut self, sources: impl IntoIterator<Item = S>) -> Self
    where
        S: StatementStreamSource + 'static,
    {
        for source in sources {
            self.context.add_source(Box::new(source));
        }
        self
    }

    /// Register a library source, promoted only if a main source needs it
    ///
    /// # Errors
    ///
    /// Returns error in semantic-version mode
    pub fn add_library_source(
        mut self,
        source: impl StatementStreamSource + 'static,
    ) -> ReactorResult<Self> {
        self.context.add_lib_source(Box::new(source))?;
        Ok(self)
    }

    /// Run every phase and return the declared roots
    ///
    /// # Errors
    ///
    /// Returns the single error describing why the build failed
    pub fn build_declared(mut self) -> ReactorResult<ReactorDeclaredModel> {
        self.context.execute_phases()?;
        self.context.transform()
    }

    /// Run every phase and assemble the effective schema context
    ///
    /// # Errors
    ///
    /// Returns the single error describing why the build failed
    pub fn build_effective(mut self) -> ReactorResult<EffectiveSchemaContext> {
        self.context.execute_phases()?;
        self.context.transform_effective()
    }
}

fn check_library_mode(config: &ReactorConfig, libraries: usize) -> ReactorResult<()> {
    if libraries > 0 && config.semantic_versioning() {
        return Err(ReactorError::InvalidState {
            reason: "Library sources are not supported in semantic version mode".to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceRef {
    Main(usize),
    Library(usize),
}

/// Driver of all sources of one build
#[derive(Debug)]
pub(crate) struct BuildGlobalContext {
    pub(crate) state: BuildState,
    sources: Vec<SourceContext>,
    libraries: Vec<SourceContext>,
    finished: ModelProcessingPhase,
}

impl BuildGlobalContext {
    pub(crate) fn new(supports: Arc<PhaseSupports>, config: ReactorConfig) -> Self {
        Self {
            state: BuildState::new(supports, config),
            sources: Vec::new(),
            libraries: Vec::new(),
            finished: ModelProcessingPhase::Init,
        }
    }

    pub(crate) fn add_source(&mut self, stream: Box<dyn StatementStreamSource>) {
        let key = self.state.register_source();
        self.sources.push(SourceContext::new(stream, key));
    }

    pub(crate) fn add_lib_source(
        &mut self,
        stream: Box<dyn StatementStreamSource>,
    ) -> ReactorResult<()> {
        if self.finished != ModelProcessingPhase::Init
            || self.state.phase != ModelProcessingPhase::Init
        {
            return Err(ReactorError::InvalidState {
                reason: format!(
                    "Library sources can only be added before the build starts, phase is {}",
                    self.state.phase
                ),
            });
        }
        check_library_mode(&self.state.config, 1)?;
        let key = self.state.register_source();
        self.libraries.push(SourceContext::new(stream, key));
        Ok(())
    }

    pub(crate) fn set_config(&mut self, config: ReactorConfig) -> ReactorResult<()> {
        check_library_mode(&config, self.libraries.len())?;
        self.state.config = config;
        Ok(())
    }

    pub(crate) fn roots(&self) -> Vec<StmtId> {
        self.sources.iter().filter_map(SourceContext::root).collect()
    }

    pub(crate) fn execute_phases(&mut self) -> ReactorResult<()> {
        self.seed()?;
        for phase in ModelProcessingPhase::EXECUTION_ORDER {
            self.start_phase(phase)?;
            self.load_phase_statements()?;
            self.complete_phase_actions()?;
            self.end_phase(phase)?;
        }
        Ok(())
    }

    /// Write configuration data into the global namespaces
    fn seed(&mut self) -> ReactorResult<()> {
        check_library_mode(&self.state.config, self.libraries.len())?;
        if let Some(features) = self.state.config.supported_features.clone() {
            self.state
                .put_global::<SupportedFeaturesNamespace>((), Arc::new(features))
                .map_err(config_error)?;
        }
        if !self.state.config.modules_deviated_by.is_empty() {
            let deviations = Arc::new(self.state.config.modules_deviated_by.clone());
            self.state
                .put_global::<ModulesDeviatedByModules>((), deviations)
                .map_err(config_error)?;
        }
        Ok(())
    }

    pub(crate) fn start_phase(&mut self, phase: ModelProcessingPhase) -> ReactorResult<()> {
        if phase.previous() != Some(self.finished) {
            return Err(ReactorError::PhaseOrder {
                requested: phase,
                finished: self.finished,
            });
        }
        for source in self.sources.iter_mut().chain(self.libraries.iter_mut()) {
            source.start_phase(phase)?;
        }
        self.state.phase = phase;
        debug!(%phase, "Global phase started");
        Ok(())
    }

    fn load_phase_statements(&mut self) -> ReactorResult<()> {
        let state = &mut self.state;
        for source in self.sources.iter_mut().chain(self.libraries.iter_mut()) {
            if let Err(err) = source.load_statements(state) {
                return Err(propagate(state, source, err));
            }
        }
        Ok(())
    }

    fn complete_phase_actions(&mut self) -> ReactorResult<()> {
        let phase = self.state.phase;
        if !self.libraries.is_empty() && phase != ModelProcessingPhase::PreLinkage {
            return Err(ReactorError::InvalidState {
                reason: format!(
                    "Library sources should be resolved after PRE_LINKAGE, phase is {}",
                    phase
                ),
            });
        }
        let mut working: Vec<SourceRef> = (0..self.sources.len())
            .map(SourceRef::Main)
            .chain((0..self.libraries.len()).map(SourceRef::Library))
            .collect();

        let mut progressing = true;
        let mut sweep = 0;
        while progressing && !working.is_empty() {
            progressing = false;
            sweep += 1;
            let mut remaining = Vec::with_capacity(working.len());
            for source_ref in working {
                let source = match source_ref {
                    SourceRef::Main(i) => &mut self.sources[i],
                    SourceRef::Library(i) => &mut self.libraries[i],
                };
                match source.try_to_complete_phase(&mut self.state, phase) {
                    Ok(PhaseCompletionProgress::Finished) => progressing = true,
                    Ok(PhaseCompletionProgress::Progress) => {
                        progressing = true;
                        remaining.push(source_ref);
                    }
                    Ok(PhaseCompletionProgress::NoProgress) => remaining.push(source_ref),
                    Err(err) => return Err(propagate(&self.state, source, err)),
                }
            }
            working = remaining;
            trace!(%phase, sweep, remaining = working.len(), "Sweep completed");
        }

        if !self.libraries.is_empty() {
            working = self.promote_required_libraries(working);
        }
        if working.is_empty() {
            return Ok(());
        }
        match self.stall_failure(&working, phase) {
            Some(failure) => Err(failure),
            None => Ok(()),
        }
    }

    /// Aggregate the explanations of every source that did not converge
    fn stall_failure(
        &self,
        working: &[SourceRef],
        phase: ModelProcessingPhase,
    ) -> Option<ReactorError> {
        let mut failure: Option<(SourceIdentifier, SourceError, Vec<SourceError>)> = None;
        for source_ref in working {
            let source = match *source_ref {
                SourceRef::Main(i) => &self.sources[i],
                SourceRef::Library(i) => &self.libraries[i],
            };
            let Some(err) = source.fail_modifiers(&self.state, phase) else {
                continue;
            };
            error!(%source, error = %err, "Failed to process source");
            if !err.suppressed().is_empty() {
                error!("{} additional errors reported:", err.suppressed().len());
                for (count, suppressed) in err.suppressed().iter().enumerate() {
                    error!("Error {}: {}", count + 1, suppressed);
                }
            }
            match &mut failure {
                None => failure = Some((source.error_identifier(&self.state), err, Vec::new())),
                Some((_, _, others)) => others.push(err),
            }
        }
        failure.map(|(source_id, cause, suppressed)| ReactorError::SomeModifiersUnresolved {
            phase,
            source_id,
            cause,
            suppressed,
        })
    }

    /// Move required library sources into the main set and drop the rest
    ///
    /// Returns `working` with promoted libraries renamed to their main
    /// positions and dropped ones removed.
    fn promote_required_libraries(&mut self, working: Vec<SourceRef>) -> Vec<SourceRef> {
        let required = self.required_libraries();
        let base = self.sources.len();
        let libraries = std::mem::take(&mut self.libraries);
        let dropped = libraries.len() - required.len();
        let mut positions = vec![None; libraries.len()];
        for (index, library) in libraries.into_iter().enumerate() {
            if let Ok(position) = required.binary_search(&index) {
                positions[index] = Some(base + position);
                self.sources.push(library);
            }
        }
        debug!(promoted = required.len(), dropped, "Resolved library sources");
        working
            .into_iter()
            .filter_map(|source_ref| match source_ref {
                SourceRef::Main(i) => Some(SourceRef::Main(i)),
                SourceRef::Library(i) => positions[i].map(SourceRef::Main),
            })
            .collect()
    }

    /// Indices of library sources transitively required by main sources,
    /// in library registration order
    fn required_libraries(&self) -> Vec<usize> {
        let mut table: BTreeMap<&str, BTreeMap<Option<Revision>, usize>> = BTreeMap::new();
        for (index, library) in self.libraries.iter().enumerate() {
            match library.root_identifier() {
                Some(identifier) => {
                    table
                        .entry(identifier.name())
                        .or_default()
                        .insert(identifier.revision(), index);
                }
                None => warn!(source = %library, "Library source has no identity, ignoring it"),
            }
        }

        let mut required = Vec::new();
        for source in &self.sources {
            self.collect_required(&table, source, &mut required);
        }
        required.retain(|&index| {
            let identifier = self.libraries[index].root_identifier();
            !self.sources.iter().any(|s| s.root_identifier() == identifier)
        });
        required.sort_unstable();
        required
    }

    fn collect_required(
        &self,
        table: &BTreeMap<&str, BTreeMap<Option<Revision>, usize>>,
        source: &SourceContext,
        required: &mut Vec<usize>,
    ) {
        for wanted in source.required_sources() {
            let Some(revisions) = table.get(wanted.name()) else {
                continue;
            };
            let found = match wanted.revision() {
                Some(revision) => revisions.get(&Some(revision)).copied(),
                None => revisions.last_key_value().map(|(_, &index)| index),
            };
            if let Some(index) = found {
                if !required.contains(&index) {
                    required.push(index);
                    self.collect_required(table, &self.libraries[index], required);
                }
            }
        }
    }

    fn end_phase(&mut self, phase: ModelProcessingPhase) -> ReactorResult<()> {
        if self.state.phase != phase {
            return Err(ReactorError::InvalidState {
                reason: format!("Cannot end phase {} while {} is running", phase, self.state.phase),
            });
        }
        self.finished = phase;
        debug!(%phase, "Global phase finished");
        Ok(())
    }

    fn check_finished(&self) -> ReactorResult<()> {
        if self.finished != ModelProcessingPhase::EffectiveModel {
            return Err(ReactorError::InvalidState {
                reason: format!("Build stopped after {}", self.finished),
            });
        }
        Ok(())
    }

    pub(crate) fn transform(&mut self) -> ReactorResult<ReactorDeclaredModel> {
        self.check_finished()?;
        let mut assembler = Assembler::new(&self.state);
        let mut roots = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            let root = source_root(source)?;
            roots.push(
                assembler
                    .declared(root)
                    .map_err(|err| propagate(&self.state, source, err))?,
            );
        }
        assembler.finish();
        Ok(ReactorDeclaredModel::new(roots))
    }

    pub(crate) fn transform_effective(&mut self) -> ReactorResult<EffectiveSchemaContext> {
        self.check_finished()?;
        let mut assembler = Assembler::new(&self.state);
        let mut declared = Vec::with_capacity(self.sources.len());
        let mut effective = Vec::with_capacity(self.sources.len());
        let result = self.sources.iter().try_for_each(|source| {
            let root = source_root(source)?;
            let wrap = |err| propagate(&self.state, source, err);
            declared.push(assembler.declared(root).map_err(wrap)?);
            effective.push(assembler.effective(root).map_err(wrap)?);
            Ok(())
        });
        assembler.finish();
        result?;

        let sealed = self.state.mutables.seal_all();
        debug!(roots = effective.len(), sealed, "Effective model assembled");
        Ok(EffectiveSchemaContext::new(declared, effective))
    }
}

fn source_root(source: &SourceContext) -> ReactorResult<StmtId> {
    source.root().ok_or_else(|| ReactorError::InvalidState {
        reason: format!("Source {} has no root statement", source),
    })
}

/// Attribute a statement-level failure to its source
fn propagate(state: &BuildState, source: &SourceContext, err: SourceError) -> ReactorError {
    let phase = state.phase;
    match err.kind() {
        SourceErrorKind::NamespaceNotAvailable { namespace, phase } => {
            ReactorError::NamespaceNotAvailable {
                namespace: namespace.to_string(),
                phase,
            }
        }
        kind => {
            let source_id = source.error_identifier(state);
            if kind == SourceErrorKind::Internal {
                warn!(%source_id, error = %err, "Unexpected error processing source");
            }
            ReactorError::SomeModifiersUnresolved {
                phase,
                source_id,
                cause: err,
                suppressed: Vec::new(),
            }
        }
    }
}

fn config_error(err: SourceError) -> ReactorError {
    match err.kind() {
        SourceErrorKind::NamespaceNotAvailable { namespace, phase } => {
            ReactorError::NamespaceNotAvailable {
                namespace: namespace.to_string(),
                phase,
            }
        }
        _ => ReactorError::InvalidState {
            reason: err.to_string(),
        },
    }
}
