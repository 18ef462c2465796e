//! Namespaces the reactor itself reads or seeds.
//!
//! Bundles must register a behaviour for each of these that their
//! vocabulary uses; [`reactor_namespaces`] returns the canonical set.

use crate::namespace::{Namespace, NamespaceBehaviour};
use crate::stmt::StmtId;
use indexmap::{IndexMap, IndexSet};
use schemata_core::{QName, QNameModule};
use std::sync::Arc;

/// Module identity of a module root statement
pub struct ModuleCtxToModuleQName;

impl Namespace for ModuleCtxToModuleQName {
    type Key = StmtId;
    type Value = QNameModule;
    const NAME: &'static str = "ModuleCtxToModuleQName";
}

/// Prefixes visible in a source
pub struct PrefixToModule;

impl Namespace for PrefixToModule {
    type Key = String;
    type Value = QNameModule;
    const NAME: &'static str = "PrefixToModule";
}

/// Extension definitions by name
pub struct ExtensionNamespace;

impl Namespace for ExtensionNamespace {
    type Key = QName;
    type Value = StmtId;
    const NAME: &'static str = "ExtensionNamespace";
}

/// Child schema nodes of a statement
pub struct SchemaTreeNamespace;

impl Namespace for SchemaTreeNamespace {
    type Key = QName;
    type Value = StmtId;
    const NAME: &'static str = "SchemaTreeNamespace";
}

/// Features enabled for the build; absent when every feature is enabled
pub struct SupportedFeaturesNamespace;

impl Namespace for SupportedFeaturesNamespace {
    type Key = ();
    type Value = Arc<IndexSet<QName>>;
    const NAME: &'static str = "SupportedFeatures";
}

/// Modules deviated by other modules
pub struct ModulesDeviatedByModules;

impl Namespace for ModulesDeviatedByModules {
    type Key = ();
    type Value = Arc<IndexMap<QNameModule, IndexSet<QNameModule>>>;
    const NAME: &'static str = "ModulesDeviatedByModules";
}

/// Behaviours of every namespace defined here
#[must_use]
pub fn reactor_namespaces() -> Vec<NamespaceBehaviour> {
    vec![
        NamespaceBehaviour::global::<ModuleCtxToModuleQName>(),
        NamespaceBehaviour::source_local::<PrefixToModule>(),
        NamespaceBehaviour::global::<ExtensionNamespace>(),
        NamespaceBehaviour::statement_local::<SchemaTreeNamespace>(),
        NamespaceBehaviour::global::<SupportedFeaturesNamespace>(),
        NamespaceBehaviour::global::<ModulesDeviatedByModules>(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::NamespaceId;

    #[test]
    fn test_reactor_namespaces_are_distinct() {
        let ids: IndexSet<NamespaceId> = reactor_namespaces().iter().map(|b| b.id()).collect();
        assert_eq!(ids.len(), 6);
        assert!(ids.contains(&NamespaceId::of::<SchemaTreeNamespace>()));
        assert!(reactor_namespaces().iter().all(|b| !b.is_derived()));
    }
}
