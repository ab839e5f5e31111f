use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use sidetree_types::{AnchorString, Endpoint, Namespace};
use tokio::sync::broadcast;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::records::{AnchorRecord, Block, BlockHash, BlockchainInfo, TxnId};
use crate::traits::{AnchorWriter, BlockSource};

/// When written anchors become part of a block.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BlockCutting {
    /// Every anchor write commits its own block.
    #[default]
    PerWrite,
    /// Anchors accumulate until [`InMemoryBlockchain::commit_block`].
    Manual,
}

struct Chain {
    blocks: Vec<Block>,
    by_hash: HashMap<BlockHash, u64>,
    pending: Vec<AnchorRecord>,
}

/// In-memory single-channel blockchain.
///
/// Starts with an empty genesis block 0. Intended for tests and embedding.
pub struct InMemoryBlockchain {
    chain: RwLock<Chain>,
    cutting: BlockCutting,
    sender: broadcast::Sender<Block>,
}

impl InMemoryBlockchain {
    pub fn new(cutting: BlockCutting) -> Arc<Self> {
        let genesis = Block::new(0, BlockHash::zero(), Utc::now(), Vec::new())
            .expect("genesis header serializes");
        let mut by_hash = HashMap::new();
        by_hash.insert(genesis.hash, 0);
        let (sender, _) = broadcast::channel(1024);
        Arc::new(Self {
            chain: RwLock::new(Chain {
                blocks: vec![genesis],
                by_hash,
                pending: Vec::new(),
            }),
            cutting,
            sender,
        })
    }

    /// Anchor writer that stamps records with `origin`.
    pub fn writer(self: &Arc<Self>, origin: Endpoint) -> InMemoryAnchorWriter {
        InMemoryAnchorWriter {
            chain: Arc::clone(self),
            origin,
        }
    }

    /// Seal pending anchors (possibly none) into a new block.
    pub fn commit_block(&self) -> LedgerResult<Block> {
        let block = {
            let mut chain = self.chain.write().expect("lock poisoned");
            let anchors = std::mem::take(&mut chain.pending);
            Self::append_locked(&mut chain, anchors)?
        };
        self.publish(&block);
        Ok(block)
    }

    fn publish(&self, block: &Block) {
        // No receivers is fine.
        let _ = self.sender.send(block.clone());
        debug!(block = block.number, anchors = block.anchors.len(), "block committed");
    }

    /// Commit `count` empty blocks.
    pub fn advance(&self, count: u64) -> LedgerResult<u64> {
        for _ in 0..count {
            self.commit_block()?;
        }
        Ok(self.height())
    }

    pub fn height(&self) -> u64 {
        self.chain.read().expect("lock poisoned").blocks.len() as u64
    }

    pub fn pending_len(&self) -> usize {
        self.chain.read().expect("lock poisoned").pending.len()
    }

    /// Every anchor record committed so far, oldest first.
    pub fn committed_anchors(&self) -> Vec<(u64, AnchorRecord)> {
        let chain = self.chain.read().expect("lock poisoned");
        chain
            .blocks
            .iter()
            .flat_map(|b| b.anchors.iter().map(move |a| (b.number, a.clone())))
            .collect()
    }

    fn append_locked(chain: &mut Chain, anchors: Vec<AnchorRecord>) -> LedgerResult<Block> {
        let (number, previous_hash) = {
            let last = chain
                .blocks
                .last()
                .ok_or_else(|| LedgerError::Fatal("chain has no genesis".into()))?;
            (last.number + 1, last.hash)
        };
        let block = Block::new(number, previous_hash, Utc::now(), anchors)?;
        chain.by_hash.insert(block.hash, number);
        chain.blocks.push(block.clone());
        Ok(block)
    }

    fn submit(&self, record: AnchorRecord) -> LedgerResult<TxnId> {
        let txn = TxnId(uuid::Uuid::now_v7().to_string());
        match self.cutting {
            BlockCutting::PerWrite => {
                let block = {
                    let mut chain = self.chain.write().expect("lock poisoned");
                    Self::append_locked(&mut chain, vec![record])?
                };
                self.publish(&block);
            }
            BlockCutting::Manual => {
                self.chain
                    .write()
                    .expect("lock poisoned")
                    .pending
                    .push(record);
            }
        }
        Ok(txn)
    }
}

#[async_trait]
impl BlockSource for InMemoryBlockchain {
    async fn info(&self) -> LedgerResult<BlockchainInfo> {
        let chain = self.chain.read().expect("lock poisoned");
        let last = chain
            .blocks
            .last()
            .ok_or_else(|| LedgerError::Fatal("chain has no genesis".into()))?;
        Ok(BlockchainInfo {
            height: chain.blocks.len() as u64,
            current_hash: last.hash,
        })
    }

    async fn block_by_number(&self, number: u64) -> LedgerResult<Block> {
        let chain = self.chain.read().expect("lock poisoned");
        chain
            .blocks
            .get(number as usize)
            .cloned()
            .ok_or(LedgerError::BlockNotFound(number))
    }

    async fn block_by_hash(&self, hash: &BlockHash) -> LedgerResult<Block> {
        let chain = self.chain.read().expect("lock poisoned");
        chain
            .by_hash
            .get(hash)
            .and_then(|n| chain.blocks.get(*n as usize))
            .cloned()
            .ok_or_else(|| LedgerError::HashNotFound(hash.to_hex()))
    }

    fn subscribe(&self) -> broadcast::Receiver<Block> {
        self.sender.subscribe()
    }
}

/// [`AnchorWriter`] handle bound to one originating peer.
#[derive(Clone)]
pub struct InMemoryAnchorWriter {
    chain: Arc<InMemoryBlockchain>,
    origin: Endpoint,
}

impl InMemoryAnchorWriter {
    pub fn origin(&self) -> &Endpoint {
        &self.origin
    }
}

#[async_trait]
impl AnchorWriter for InMemoryAnchorWriter {
    async fn write_anchor(&self, namespace: &Namespace, anchor: &AnchorString) -> LedgerResult<TxnId> {
        let record = AnchorRecord {
            namespace: namespace.clone(),
            anchor_string: anchor.to_string(),
            origin: self.origin.clone(),
        };
        let txn = self.chain.submit(record)?;
        debug!(namespace = %namespace, anchor = %anchor, txn = %txn, "anchor written");
        Ok(txn)
    }
}
