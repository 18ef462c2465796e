//! Schemata Statement Vocabulary
//!
//! Reference statement supports for the Schemata reactor: modules and
//! submodules, imports and includes, extensions and features, schema
//! nodes and augments. [`yang_reactor`] returns a reactor with the whole
//! vocabulary registered phase by phase.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bundle;
pub mod common;
pub mod definition;
pub mod linkage;
pub mod namespaces;
pub mod schema;

// Re-exports
pub use bundle::{phase_bundles, yang_reactor, yang_supports};
pub use common::{keyword, module_of, resolve_qname};
pub use definition::feature_supported;
pub use namespaces::{
    AugmentTarget, FeatureNamespace, LatestModuleNamespace, ModuleNamespace, NamespaceToModule,
    SubmoduleNamespace, statement_namespaces,
};
