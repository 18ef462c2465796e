//! Schemata Core Types
//!
//! Pure value types shared by the statement reactor and statement
//! vocabularies. Nothing in this crate performs I/O.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod listener;
pub mod memo;
pub mod phase;
pub mod qname;
pub mod revision;
pub mod source;
pub mod version;

// Re-exports
pub use error::{CoreError, CoreResult};
pub use listener::ListenerRegistry;
pub use memo::Memoized;
pub use phase::ModelProcessingPhase;
pub use qname::{QName, QNameModule, XmlNamespace, intern, is_identifier, split_prefixed};
pub use revision::Revision;
pub use source::{SourceIdentifier, StatementSourceReference};
pub use version::YangVersion;
