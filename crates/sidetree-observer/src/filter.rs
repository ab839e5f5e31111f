use std::collections::HashMap;

use sidetree_protocol::ProtocolRegistry;
use sidetree_resolver::OperationApplier;
use sidetree_store::OperationStore;
use sidetree_types::{Operation, OperationType, TxnPosition, UniqueSuffix};
use tracing::debug;

use crate::error::ObserverResult;

#[derive(Default)]
struct SuffixView {
    has_create: bool,
    /// Position of the deactivate the replayed log accepted.
    deactivated_at: Option<TxnPosition>,
    positions: Vec<TxnPosition>,
}

/// Drops operations that must not reach the store.
///
/// An operation is dropped when the store already holds its position
/// (replay), when the replayed stored log is deactivated before it, or
/// when it is not a create and neither the store nor an earlier operation
/// of the same batch creates its suffix.
///
/// Deactivation is taken from the applier's replay, so a deactivate that
/// fails its commitment or signature check never blocks later operations.
/// Only stored state is consulted, so a deactivate and a later update in
/// one batch are both kept and the update is ignored at resolution.
pub struct OperationFilter<'a> {
    store: &'a dyn OperationStore,
    protocols: &'a ProtocolRegistry,
}

impl<'a> OperationFilter<'a> {
    pub fn new(store: &'a dyn OperationStore, protocols: &'a ProtocolRegistry) -> Self {
        Self { store, protocols }
    }

    fn view(&self, log: &[Operation]) -> SuffixView {
        let deactivated_at = if log.is_empty() {
            None
        } else {
            match OperationApplier::new(self.protocols).replay(log) {
                Ok(state) => state.deactivated,
                Err(e) => {
                    debug!(suffix = %log[0].unique_suffix, error = %e, "stored log does not replay");
                    None
                }
            }
        };
        SuffixView {
            has_create: log.iter().any(|o| o.operation_type() == OperationType::Create),
            deactivated_at,
            positions: log.iter().map(|o| o.position).collect(),
        }
    }

    pub fn filter(&self, ops: Vec<Operation>) -> ObserverResult<Vec<Operation>> {
        let mut views: HashMap<UniqueSuffix, SuffixView> = HashMap::new();
        let mut kept = Vec::with_capacity(ops.len());

        for op in ops {
            if !views.contains_key(&op.unique_suffix) {
                let log = self.store.get(&op.namespace, &op.unique_suffix)?;
                views.insert(op.unique_suffix.clone(), self.view(&log));
            }
            let Some(view) = views.get_mut(&op.unique_suffix) else {
                continue;
            };

            let reason = if view.positions.binary_search(&op.position).is_ok() {
                Some("replay")
            } else if view.deactivated_at.is_some_and(|d| d < op.position) {
                Some("after deactivate")
            } else if op.operation_type() != OperationType::Create && !view.has_create {
                Some("unknown suffix")
            } else {
                None
            };

            match reason {
                Some(reason) => debug!(
                    suffix = %op.unique_suffix,
                    position = %op.position,
                    op = %op.operation_type(),
                    reason,
                    "operation filtered"
                ),
                None => {
                    if op.operation_type() == OperationType::Create {
                        view.has_create = true;
                    }
                    kept.push(op);
                }
            }
        }
        Ok(kept)
    }
}
