//! Build configuration.

use indexmap::{IndexMap, IndexSet};
use schemata_core::{QName, QNameModule};
use serde::{Deserialize, Serialize};

/// Statement parser mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementParserMode {
    /// Standard revision-based linkage
    #[default]
    Default,
    /// Semantic-version rules for imports, submodules and augments
    SemVer,
}

/// Configuration of one build
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactorConfig {
    /// Parser mode
    #[serde(default)]
    pub parser_mode: StatementParserMode,
    /// Features considered supported; `None` supports every feature
    #[serde(default)]
    pub supported_features: Option<IndexSet<QName>>,
    /// Modules deviated by other modules
    #[serde(default)]
    pub modules_deviated_by: IndexMap<QNameModule, IndexSet<QNameModule>>,
}

impl ReactorConfig {
    /// Create the default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the parser mode
    #[must_use]
    pub fn with_parser_mode(mut self, mode: StatementParserMode) -> Self {
        self.parser_mode = mode;
        self
    }

    /// Restrict the supported feature set
    #[must_use]
    pub fn with_supported_features(mut self, features: impl IntoIterator<Item = QName>) -> Self {
        self.supported_features = Some(features.into_iter().collect());
        self
    }

    /// Record that `deviated` is deviated by `deviating`
    #[must_use]
    pub fn with_deviation(mut self, deviated: QNameModule, deviating: QNameModule) -> Self {
        self.modules_deviated_by
            .entry(deviated)
            .or_default()
            .insert(deviating);
        self
    }

    /// Whether semantic-version rules are enforced
    #[must_use]
    pub fn semantic_versioning(&self) -> bool {
        self.parser_mode == StatementParserMode::SemVer
    }
}
