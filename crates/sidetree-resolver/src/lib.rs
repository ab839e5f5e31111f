//! Resolution of Sidetree documents from their anchored operation logs.
//!
//! [`Resolver`] loads a suffix log from the operation store and hands it to
//! the [`OperationApplier`], which replays the log under the protocol
//! generation in effect at each operation's transaction time. Operations
//! that fail the commitment chain, signature, or patch checks are rejected
//! one at a time; the document keeps the last accepted state.
//!
//! # Key Types
//!
//! - [`DocumentComposer`]: applies patch actions to a document
//! - [`OperationApplier`] / [`DocumentState`]: commitment-chain replay
//! - [`Resolver`] / [`ResolutionResult`]: short- and long-form resolution

pub mod applier;
pub mod composer;
pub mod document;
pub mod error;
pub mod resolver;

#[cfg(test)]
mod testing;

pub use applier::{DocumentState, OperationApplier, Rejection};
pub use composer::{DocumentComposer, PatchError};
pub use document::{DidDocumentMetadata, DocumentMetadata, DocumentType, MethodMetadata, ResolutionResult};
pub use error::{ResolveError, ResolveResult};
pub use resolver::Resolver;
