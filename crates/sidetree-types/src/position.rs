use std::fmt;

use serde::{Deserialize, Serialize};

/// Ledger position of an anchored operation.
///
/// `transaction_time` is the block number, `transaction_number` the anchor's
/// position inside the block, and `operation_index` the operation's position
/// inside the anchored batch. The derived ordering (field order) is the total
/// order used by the operation store, the filter, and the resolver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxnPosition {
    pub transaction_time: u64,
    pub transaction_number: u32,
    pub operation_index: u32,
}

impl TxnPosition {
    pub const fn new(transaction_time: u64, transaction_number: u32, operation_index: u32) -> Self {
        Self {
            transaction_time,
            transaction_number,
            operation_index,
        }
    }

    /// `true` if both positions come from the same anchor.
    pub fn same_anchor(&self, other: &Self) -> bool {
        self.transaction_time == other.transaction_time
            && self.transaction_number == other.transaction_number
    }
}

impl fmt::Display for TxnPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.transaction_time, self.transaction_number, self.operation_index
        )
    }
}
