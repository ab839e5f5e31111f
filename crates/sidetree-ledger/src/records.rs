use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sidetree_types::{Endpoint, Namespace};

use crate::error::{LedgerError, LedgerResult};

/// Identifier of a submitted ledger transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxnId(pub String);

impl fmt::Display for TxnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// BLAKE3 hash of a block header.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHash([u8; 32]);

impl BlockHash {
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockHash({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// An anchor string committed to the ledger on behalf of a namespace.
///
/// The anchor string is kept as raw text; parsing is the observer's job so
/// that malformed anchors can be skipped rather than rejected by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub namespace: Namespace,
    pub anchor_string: String,
    /// Peer that submitted the anchor.
    pub origin: Endpoint,
}

/// A committed block. `anchors` are in transaction order; an anchor's index
/// is its transaction number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub number: u64,
    pub hash: BlockHash,
    pub previous_hash: BlockHash,
    pub timestamp: DateTime<Utc>,
    pub anchors: Vec<AnchorRecord>,
}

#[derive(Serialize)]
struct HeaderPreimage<'a> {
    number: u64,
    previous_hash: &'a BlockHash,
    timestamp_millis: i64,
    anchors: &'a [AnchorRecord],
}

impl Block {
    pub fn new(
        number: u64,
        previous_hash: BlockHash,
        timestamp: DateTime<Utc>,
        anchors: Vec<AnchorRecord>,
    ) -> LedgerResult<Self> {
        let preimage = HeaderPreimage {
            number,
            previous_hash: &previous_hash,
            timestamp_millis: timestamp.timestamp_millis(),
            anchors: &anchors,
        };
        let bytes =
            bincode::serialize(&preimage).map_err(|e| LedgerError::Serialization(e.to_string()))?;
        Ok(Self {
            number,
            hash: BlockHash(*blake3::hash(&bytes).as_bytes()),
            previous_hash,
            timestamp,
            anchors,
        })
    }

    pub fn anchors_from<'a>(&'a self, origin: &'a Endpoint) -> impl Iterator<Item = (u32, &'a AnchorRecord)> + 'a {
        self.anchors
            .iter()
            .enumerate()
            .filter(move |(_, a)| &a.origin == origin)
            .map(|(i, a)| (i as u32, a))
    }
}

/// Chain summary. Blocks are numbered `0..height`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockchainInfo {
    pub height: u64,
    pub current_hash: BlockHash,
}
