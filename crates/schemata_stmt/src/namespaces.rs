//! Namespaces of the reference vocabulary.

use schemata_core::{QName, QNameModule, Revision, SourceIdentifier};
use schemata_reactor::namespace::{Namespace, NamespaceBehaviour, NamespaceMap};
use schemata_reactor::{AugmentationRecord, SealableList, StmtId};
use std::sync::Arc;

/// Module roots by name and revision
pub struct ModuleNamespace;

impl Namespace for ModuleNamespace {
    type Key = SourceIdentifier;
    type Value = StmtId;
    const NAME: &'static str = "ModuleNamespace";
}

/// Latest revision of each module, by name
pub struct LatestModuleNamespace;

impl Namespace for LatestModuleNamespace {
    type Key = String;
    type Value = StmtId;
    const NAME: &'static str = "LatestModuleNamespace";
}

/// Every known revision of each module, by name
pub struct ModuleRevisionsNamespace;

impl Namespace for ModuleRevisionsNamespace {
    type Key = String;
    type Value = Vec<Option<Revision>>;
    const NAME: &'static str = "ModuleRevisionsNamespace";
}

/// Module roots by module identity
pub struct NamespaceToModule;

impl Namespace for NamespaceToModule {
    type Key = QNameModule;
    type Value = StmtId;
    const NAME: &'static str = "NamespaceToModule";
}

/// Submodule roots by name and revision
pub struct SubmoduleNamespace;

impl Namespace for SubmoduleNamespace {
    type Key = SourceIdentifier;
    type Value = StmtId;
    const NAME: &'static str = "SubmoduleNamespace";
}

/// Latest revision of each submodule, by name
pub struct LatestSubmoduleNamespace;

impl Namespace for LatestSubmoduleNamespace {
    type Key = String;
    type Value = StmtId;
    const NAME: &'static str = "LatestSubmoduleNamespace";
}

/// Identity of the module a submodule belongs to, keyed by submodule root
pub struct SubmoduleOwner;

impl Namespace for SubmoduleOwner {
    type Key = StmtId;
    type Value = QNameModule;
    const NAME: &'static str = "SubmoduleOwner";
}

/// Submodule root an `include` statement resolved to
pub struct IncludedSubmodule;

impl Namespace for IncludedSubmodule {
    type Key = ();
    type Value = StmtId;
    const NAME: &'static str = "IncludedSubmodule";
}

/// Feature definitions by name
pub struct FeatureNamespace;

impl Namespace for FeatureNamespace {
    type Key = QName;
    type Value = StmtId;
    const NAME: &'static str = "FeatureNamespace";
}

/// Augment log of each module root
pub struct ModuleAugmentations;

impl Namespace for ModuleAugmentations {
    type Key = StmtId;
    type Value = Arc<SealableList<AugmentationRecord>>;
    const NAME: &'static str = "ModuleAugmentations";
}

/// Where an augment placed its nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AugmentTarget {
    /// Target schema node
    pub node: StmtId,
    /// Root of the module owning the target
    pub root: StmtId,
    /// Target path
    pub path: Vec<QName>,
}

/// Resolved target of an `augment` statement
pub struct AugmentTargetNamespace;

impl Namespace for AugmentTargetNamespace {
    type Key = ();
    type Value = AugmentTarget;
    const NAME: &'static str = "AugmentTargetNamespace";
}

fn latest_by_name(name: &String, base: &NamespaceMap<ModuleNamespace>) -> Option<StmtId> {
    base.iter()
        .filter(|(id, _)| id.name() == name)
        .max_by_key(|(id, _)| id.revision())
        .map(|(_, &root)| root)
}

fn latest_submodule_by_name(
    name: &String,
    base: &NamespaceMap<SubmoduleNamespace>,
) -> Option<StmtId> {
    base.iter()
        .filter(|(id, _)| id.name() == name)
        .max_by_key(|(id, _)| id.revision())
        .map(|(_, &root)| root)
}

fn revisions_by_name(
    name: &String,
    base: &NamespaceMap<ModuleNamespace>,
) -> Option<Vec<Option<Revision>>> {
    let revisions: Vec<_> = base
        .keys()
        .filter(|id| id.name() == name)
        .map(SourceIdentifier::revision)
        .collect();
    (!revisions.is_empty()).then_some(revisions)
}

/// Behaviours of every namespace defined here
#[must_use]
pub fn statement_namespaces() -> Vec<NamespaceBehaviour> {
    vec![
        NamespaceBehaviour::global::<ModuleNamespace>(),
        NamespaceBehaviour::derived::<LatestModuleNamespace, ModuleNamespace>(latest_by_name),
        NamespaceBehaviour::derived::<ModuleRevisionsNamespace, ModuleNamespace>(revisions_by_name),
        NamespaceBehaviour::global::<NamespaceToModule>(),
        NamespaceBehaviour::global::<SubmoduleNamespace>(),
        NamespaceBehaviour::derived::<LatestSubmoduleNamespace, SubmoduleNamespace>(
            latest_submodule_by_name,
        ),
        NamespaceBehaviour::global::<SubmoduleOwner>(),
        NamespaceBehaviour::statement_local::<IncludedSubmodule>(),
        NamespaceBehaviour::global::<FeatureNamespace>(),
        NamespaceBehaviour::global::<ModuleAugmentations>(),
        NamespaceBehaviour::statement_local::<AugmentTargetNamespace>(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemata_reactor::namespace::NamespaceId;

    #[test]
    fn test_behaviours_cover_every_namespace() {
        let behaviours = statement_namespaces();
        assert_eq!(behaviours.len(), 11);
        let derived: Vec<_> = behaviours
            .iter()
            .filter(|b| b.is_derived())
            .map(|b| b.id())
            .collect();
        assert_eq!(derived.len(), 3);
        assert!(derived.contains(&NamespaceId::of::<LatestModuleNamespace>()));
    }
}
