//! Schemata Statement Reactor
//!
//! Compiles a set of schema sources into one effective schema model. Every
//! source is driven through the same ordered phases; within a phase the
//! reactor sweeps all sources until none makes progress, so declarations
//! may refer to each other across sources in any order.
//!
//! Statement vocabularies plug in through [`StatementSupportBundle`]s, one
//! per phase. Supports bind data into typed [`Namespace`]s and queue
//! [`ModelAction`]s that run once the statements they need exist.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod action;
mod assemble;
pub mod bundle;
pub mod config;
pub mod error;
pub mod model;
pub mod mutable;
pub mod namespace;
pub mod namespaces;
pub mod reactor;
pub mod schema_tree;
mod source;
pub mod state;
pub mod stmt;
pub mod stream;
pub mod support;

#[cfg(test)]
mod testing;

// Re-exports
pub use action::{ModelAction, Requirement};
pub use bundle::{PhaseSupports, StatementSupportBundle, StatementSupportBundleBuilder};
pub use config::{ReactorConfig, StatementParserMode};
pub use error::{ReactorError, ReactorResult, SourceError, SourceErrorKind, SourceResult};
pub use model::{
    AugmentationRecord, DeclaredStatement, EffectiveSchemaContext, EffectiveStatement, Facet,
    ReactorDeclaredModel,
};
pub use mutable::{MutableStatement, SealableList};
pub use namespace::{Namespace, NamespaceBehaviour, NamespaceId, NamespaceMap, StorageScope};
pub use reactor::{BuildAction, CrossSourceStatementReactor, ReactorBuilder};
pub use source::PhaseCompletionProgress;
pub use state::{BuildState, StmtContext, StmtContextMut};
pub use stmt::{ArgumentValue, PrefixedName, StatementOrigin, StmtId, YANG_NAMESPACE, yang_module};
pub use stream::{InMemorySource, RawStatement, StatementStreamSource};
pub use support::{
    ArgumentSpec, Cardinality, StatementSupport, StatementSupportBuilder, SubstatementValidator,
};
