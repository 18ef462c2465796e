//! Model processing phases.
//!
//! Every build walks the same totally ordered phase sequence. A phase may
//! only start once its predecessor has finished for every active source.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Processing phase of a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelProcessingPhase {
    /// Before any source has been touched; seed data is written here
    Init,
    /// Source identity and required sources are discovered
    PreLinkage,
    /// Imports, includes and belongs-to are bound
    Linkage,
    /// Extensions and features are defined
    StatementDefinition,
    /// The full declared tree is validated and schema nodes are published
    FullDeclaration,
    /// Cross-module effects (augmentation, feature pruning) are applied
    EffectiveModel,
}

impl ModelProcessingPhase {
    /// Phases a build executes, in order
    pub const EXECUTION_ORDER: [ModelProcessingPhase; 5] = [
        ModelProcessingPhase::PreLinkage,
        ModelProcessingPhase::Linkage,
        ModelProcessingPhase::StatementDefinition,
        ModelProcessingPhase::FullDeclaration,
        ModelProcessingPhase::EffectiveModel,
    ];

    /// Every phase including `Init`, in order
    pub const ALL: [ModelProcessingPhase; 6] = [
        ModelProcessingPhase::Init,
        ModelProcessingPhase::PreLinkage,
        ModelProcessingPhase::Linkage,
        ModelProcessingPhase::StatementDefinition,
        ModelProcessingPhase::FullDeclaration,
        ModelProcessingPhase::EffectiveModel,
    ];

    /// The phase that must have finished before this one starts
    #[must_use]
    pub const fn previous(&self) -> Option<ModelProcessingPhase> {
        match self {
            Self::Init => None,
            Self::PreLinkage => Some(Self::Init),
            Self::Linkage => Some(Self::PreLinkage),
            Self::StatementDefinition => Some(Self::Linkage),
            Self::FullDeclaration => Some(Self::StatementDefinition),
            Self::EffectiveModel => Some(Self::FullDeclaration),
        }
    }

    /// The phase following this one
    #[must_use]
    pub const fn next(&self) -> Option<ModelProcessingPhase> {
        match self {
            Self::Init => Some(Self::PreLinkage),
            Self::PreLinkage => Some(Self::Linkage),
            Self::Linkage => Some(Self::StatementDefinition),
            Self::StatementDefinition => Some(Self::FullDeclaration),
            Self::FullDeclaration => Some(Self::EffectiveModel),
            Self::EffectiveModel => None,
        }
    }

    /// Whether this is the terminal phase
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::EffectiveModel)
    }

    /// Position in [`Self::ALL`]
    #[must_use]
    pub const fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ModelProcessingPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::PreLinkage => "SOURCE_PRE_LINKAGE",
            Self::Linkage => "SOURCE_LINKAGE",
            Self::StatementDefinition => "STATEMENT_DEFINITION",
            Self::FullDeclaration => "FULL_DECLARATION",
            Self::EffectiveModel => "EFFECTIVE_MODEL",
        };
        f.write_str(name)
    }
}
