use async_trait::async_trait;
use sidetree_types::{AnchorString, Namespace};
use tokio::sync::broadcast;

use crate::error::LedgerResult;
use crate::records::{Block, BlockHash, BlockchainInfo, TxnId};

/// Write boundary: commit one anchor per batch.
#[async_trait]
pub trait AnchorWriter: Send + Sync {
    /// Append `anchor` to the transaction stream for `namespace`.
    ///
    /// Returns only once the transaction is durably committed. Retryable
    /// failures surface as [`LedgerError::Transient`](crate::LedgerError::Transient).
    async fn write_anchor(&self, namespace: &Namespace, anchor: &AnchorString)
        -> LedgerResult<TxnId>;
}

/// Read boundary over committed blocks of one channel.
#[async_trait]
pub trait BlockSource: Send + Sync {
    async fn info(&self) -> LedgerResult<BlockchainInfo>;

    async fn block_by_number(&self, number: u64) -> LedgerResult<Block>;

    async fn block_by_hash(&self, hash: &BlockHash) -> LedgerResult<Block>;

    /// Stream of blocks committed after the call.
    fn subscribe(&self) -> broadcast::Receiver<Block>;
}
