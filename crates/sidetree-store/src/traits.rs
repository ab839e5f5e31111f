use std::sync::Arc;

use sidetree_types::{Namespace, Operation, TxnPosition, UniqueSuffix};

use crate::error::StoreResult;
use crate::events::MutationListener;

/// Append-only store of anchored operations keyed by `(namespace, suffix)`.
///
/// Implementations must satisfy:
/// - each suffix log is strictly ordered by position and never reordered
/// - `put` is atomic: either every operation is appended or none is
/// - a position that already exists in a suffix log is rejected
/// - listeners are notified once per affected suffix after a successful `put`
pub trait OperationStore: Send + Sync {
    /// Append `ops`, preserving their order within each suffix log.
    fn put(&self, ops: &[Operation]) -> StoreResult<()>;

    /// The full log of a suffix, ordered by position. Empty if unknown.
    fn get(&self, namespace: &Namespace, suffix: &UniqueSuffix) -> StoreResult<Vec<Operation>>;

    /// Register a listener for `suffix_mutated` notifications. Held weakly.
    fn subscribe(&self, listener: &Arc<dyn MutationListener>);

    /// `true` if the suffix log holds an operation at `position`.
    fn contains(
        &self,
        namespace: &Namespace,
        suffix: &UniqueSuffix,
        position: &TxnPosition,
    ) -> StoreResult<bool> {
        Ok(self
            .get(namespace, suffix)?
            .iter()
            .any(|op| &op.position == position))
    }
}
