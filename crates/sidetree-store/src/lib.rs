//! Operation store for anchored Sidetree operations.
//!
//! Each `(namespace, unique_suffix)` owns an append-only log ordered by
//! [`TxnPosition`](sidetree_types::TxnPosition). Writers are the observers;
//! readers are resolvers.
//!
//! After every successful `put` the store emits one `suffix_mutated`
//! notification per affected suffix to registered [`MutationListener`]s.
//! Listeners are held weakly, so a document cache can subscribe without the
//! store keeping it alive.

pub mod error;
pub mod events;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use events::{MutationHub, MutationListener};
pub use memory::InMemoryOperationStore;
pub use traits::OperationStore;
