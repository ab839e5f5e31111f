//! Blockchain substrate interfaces for the Sidetree pipeline.
//!
//! The ledger is an external collaborator. This crate defines the narrow
//! capabilities the pipeline needs from it:
//! - [`AnchorWriter`] commits one anchor string per batch
//! - [`BlockSource`] reads committed blocks and streams new ones
//!
//! [`InMemoryBlockchain`] implements both for tests and embedding. One
//! instance models one channel.

pub mod error;
pub mod memory;
pub mod records;
pub mod traits;

pub use error::{LedgerError, LedgerResult};
pub use memory::{BlockCutting, InMemoryAnchorWriter, InMemoryBlockchain};
pub use records::{AnchorRecord, Block, BlockHash, BlockchainInfo, TxnId};
pub use traits::{AnchorWriter, BlockSource};
