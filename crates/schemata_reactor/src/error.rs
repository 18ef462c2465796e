//! Reactor error types.
//!
//! Statement-level failures are [`SourceError`]s. The reactor turns them into
//! exactly one [`ReactorError`] per failed build, attributed to a source and
//! a phase.

use schemata_core::{ModelProcessingPhase, SourceIdentifier, StatementSourceReference};
use std::fmt;

/// Result of statement-level processing
pub type SourceResult<T> = Result<T, SourceError>;

/// Result of a build
pub type ReactorResult<T> = Result<T, ReactorError>;

/// Classification of a [`SourceError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    /// Defect in a source document
    Statement,
    /// A namespace was requested that no bundle registers for the phase
    NamespaceNotAvailable {
        /// Namespace name
        namespace: &'static str,
        /// Phase in which it was requested
        phase: ModelProcessingPhase,
    },
    /// Broken reactor invariant
    Internal,
}

/// Error attributed to a statement in a source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    reference: Option<StatementSourceReference>,
    suppressed: Vec<SourceError>,
}

impl SourceError {
    /// Create a statement error
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Statement,
            message: message.into(),
            reference: None,
            suppressed: Vec::new(),
        }
    }

    /// Create a statement error at a position
    #[must_use]
    pub fn at(message: impl Into<String>, reference: Option<&StatementSourceReference>) -> Self {
        Self {
            reference: reference.cloned(),
            ..Self::new(message)
        }
    }

    /// Create a namespace-unavailable configuration error
    #[must_use]
    pub fn namespace_not_available(namespace: &'static str, phase: ModelProcessingPhase) -> Self {
        Self {
            kind: SourceErrorKind::NamespaceNotAvailable { namespace, phase },
            message: format!("Namespace {} is not available in phase {}", namespace, phase),
            reference: None,
            suppressed: Vec::new(),
        }
    }

    /// Create an internal error
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            ..Self::new(message)
        }
    }

    /// Attach a position if none is set
    #[must_use]
    pub fn or_at(mut self, reference: Option<&StatementSourceReference>) -> Self {
        if self.reference.is_none() {
            self.reference = reference.cloned();
        }
        self
    }

    /// Attach another error as suppressed detail
    pub fn add_suppressed(&mut self, error: SourceError) {
        self.suppressed.push(error);
    }

    /// Error kind
    #[must_use]
    pub fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    /// Message without position
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Statement position, if known
    #[must_use]
    pub fn reference(&self) -> Option<&StatementSourceReference> {
        self.reference.as_ref()
    }

    /// Suppressed errors
    #[must_use]
    pub fn suppressed(&self) -> &[SourceError] {
        &self.suppressed
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            Some(reference) => write!(f, "{} [at {}]", self.message, reference),
            None => f.write_str(&self.message),
        }
    }
}

impl std::error::Error for SourceError {}

impl From<schemata_core::CoreError> for SourceError {
    fn from(err: schemata_core::CoreError) -> Self {
        Self::new(err.to_string())
    }
}

/// Failure of a whole build
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReactorError {
    /// A source failed to load, or sources stopped converging in a phase
    #[error("Some of {phase} modifiers for statements were not resolved in source {source_id}")]
    SomeModifiersUnresolved {
        /// Phase in which the build failed
        phase: ModelProcessingPhase,
        /// Primary offending source
        source_id: SourceIdentifier,
        /// Explanation from the primary source
        #[source]
        cause: SourceError,
        /// Explanations from every other non-converging source
        suppressed: Vec<SourceError>,
    },

    /// A namespace was requested that is not registered for the phase
    #[error("Namespace {namespace} is not available in phase {phase}")]
    NamespaceNotAvailable {
        /// Namespace name
        namespace: String,
        /// Phase in which it was requested
        phase: ModelProcessingPhase,
    },

    /// Phase started out of order
    #[error("Cannot start phase {requested}: last finished phase is {finished}")]
    PhaseOrder {
        /// Phase that was requested
        requested: ModelProcessingPhase,
        /// Phase that had finished
        finished: ModelProcessingPhase,
    },

    /// Reactor API used in an invalid state
    #[error("Invalid reactor state: {reason}")]
    InvalidState {
        /// What was wrong
        reason: String,
    },
}

impl ReactorError {
    /// Phase the error is attributed to, if any
    #[must_use]
    pub fn phase(&self) -> Option<ModelProcessingPhase> {
        match self {
            Self::SomeModifiersUnresolved { phase, .. } => Some(*phase),
            Self::NamespaceNotAvailable { phase, .. } => Some(*phase),
            Self::PhaseOrder { requested, .. } => Some(*requested),
            Self::InvalidState { .. } => None,
        }
    }

    /// Source the error is attributed to, if any
    #[must_use]
    pub fn source_id(&self) -> Option<&SourceIdentifier> {
        match self {
            Self::SomeModifiersUnresolved { source_id, .. } => Some(source_id),
            _ => None,
        }
    }

    /// Suppressed errors from other sources
    #[must_use]
    pub fn suppressed(&self) -> &[SourceError] {
        match self {
            Self::SomeModifiersUnresolved { suppressed, .. } => suppressed,
            _ => &[],
        }
    }
}
