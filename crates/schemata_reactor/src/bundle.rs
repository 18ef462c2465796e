//! Statement support bundles.
//!
//! A bundle is the vocabulary available in one phase: statement supports
//! keyed by language version and keyword, namespace behaviours, and the
//! generic support bound to extension instances. Bundles chain to a parent,
//! so later phases can extend earlier ones.

use crate::namespace::{NamespaceBehaviour, NamespaceId};
use crate::support::StatementSupport;
use indexmap::{IndexMap, IndexSet};
use schemata_core::{ModelProcessingPhase, QName, YangVersion};
use std::fmt;
use std::sync::Arc;

/// Vocabulary of one phase
#[derive(Clone, Default)]
pub struct StatementSupportBundle {
    parent: Option<Arc<StatementSupportBundle>>,
    supported_versions: IndexSet<YangVersion>,
    common: IndexMap<QName, Arc<StatementSupport>>,
    versioned: IndexMap<(YangVersion, QName), Arc<StatementSupport>>,
    namespaces: IndexMap<NamespaceId, NamespaceBehaviour>,
    unknown: Option<Arc<StatementSupport>>,
}

impl StatementSupportBundle {
    /// Start an empty bundle
    #[must_use]
    pub fn builder() -> StatementSupportBundleBuilder {
        StatementSupportBundleBuilder {
            bundle: Self::default(),
        }
    }

    /// Start a bundle extending `parent`
    #[must_use]
    pub fn derived_from(parent: &Arc<StatementSupportBundle>) -> StatementSupportBundleBuilder {
        StatementSupportBundleBuilder {
            bundle: Self {
                parent: Some(Arc::clone(parent)),
                ..Self::default()
            },
        }
    }

    /// Support for `keyword` in `version`, searching parents
    #[must_use]
    pub fn statement_definition(
        &self,
        version: YangVersion,
        keyword: &QName,
    ) -> Option<&Arc<StatementSupport>> {
        self.versioned
            .get(&(version, keyword.clone()))
            .or_else(|| self.common.get(keyword))
            .or_else(|| {
                self.parent
                    .as_ref()
                    .and_then(|p| p.statement_definition(version, keyword))
            })
    }

    /// Behaviour registered for a namespace, searching parents
    #[must_use]
    pub fn namespace_behaviour(&self, id: NamespaceId) -> Option<&NamespaceBehaviour> {
        self.namespaces
            .get(&id)
            .or_else(|| self.parent.as_ref().and_then(|p| p.namespace_behaviour(id)))
    }

    /// Support bound to extension instances, searching parents
    #[must_use]
    pub fn unknown_support(&self) -> Option<&Arc<StatementSupport>> {
        self.unknown
            .as_ref()
            .or_else(|| self.parent.as_ref().and_then(|p| p.unknown_support()))
    }

    /// Language versions this bundle accepts
    ///
    /// A bundle that names none inherits its parent's set; a root bundle
    /// that names none accepts every version.
    #[must_use]
    pub fn supported_versions(&self) -> IndexSet<YangVersion> {
        if !self.supported_versions.is_empty() {
            return self.supported_versions.clone();
        }
        match &self.parent {
            Some(parent) => parent.supported_versions(),
            None => YangVersion::ALL.into_iter().collect(),
        }
    }

    /// Number of supports defined directly in this bundle
    #[must_use]
    pub fn len(&self) -> usize {
        self.common.len() + self.versioned.len()
    }

    /// Whether this bundle defines no supports of its own
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for StatementSupportBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatementSupportBundle")
            .field("supports", &self.len())
            .field("namespaces", &self.namespaces.len())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

/// Builder for [`StatementSupportBundle`]
pub struct StatementSupportBundleBuilder {
    bundle: StatementSupportBundle,
}

impl StatementSupportBundleBuilder {
    /// Restrict accepted language versions
    #[must_use]
    pub fn versions(mut self, versions: impl IntoIterator<Item = YangVersion>) -> Self {
        self.bundle.supported_versions = versions.into_iter().collect();
        self
    }

    /// Add a support valid in every version
    #[must_use]
    pub fn add_support(mut self, support: StatementSupport) -> Self {
        self.bundle
            .common
            .insert(support.keyword().clone(), Arc::new(support));
        self
    }

    /// Add a support valid only in `version`
    #[must_use]
    pub fn add_version_specific(mut self, version: YangVersion, support: StatementSupport) -> Self {
        self.bundle
            .versioned
            .insert((version, support.keyword().clone()), Arc::new(support));
        self
    }

    /// Register a namespace behaviour
    #[must_use]
    pub fn add_namespace(mut self, behaviour: NamespaceBehaviour) -> Self {
        self.bundle.namespaces.insert(behaviour.id(), behaviour);
        self
    }

    /// Set the support bound to extension instances
    #[must_use]
    pub fn unknown_support(mut self, support: StatementSupport) -> Self {
        self.bundle.unknown = Some(Arc::new(support));
        self
    }

    /// Finish
    #[must_use]
    pub fn build(self) -> StatementSupportBundle {
        self.bundle
    }
}

/// Bundles of every phase
///
/// A phase without a bundle uses the bundle of the closest earlier phase.
#[derive(Debug, Clone, Default)]
pub struct PhaseSupports {
    bundles: IndexMap<ModelProcessingPhase, StatementSupportBundle>,
    empty: StatementSupportBundle,
}

impl PhaseSupports {
    /// Create without bundles
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bundle of `phase`
    pub fn insert(&mut self, phase: ModelProcessingPhase, bundle: StatementSupportBundle) {
        self.bundles.insert(phase, bundle);
    }

    /// Bundle in effect for `phase`
    #[must_use]
    pub fn for_phase(&self, phase: ModelProcessingPhase) -> &StatementSupportBundle {
        let mut current = Some(phase);
        while let Some(p) = current {
            if let Some(bundle) = self.bundles.get(&p) {
                return bundle;
            }
            current = p.previous();
        }
        &self.empty
    }
}
