//! Observer side of the Sidetree pipeline.
//!
//! The observer follows committed blocks of one channel. For every anchor
//! it downloads the artifact graph from CAS, reconstructs the anchored
//! operations, drops replays and writes after deactivation, and appends the
//! rest to the operation store. Progress is checkpointed per channel in a
//! [`MetadataStore`] so a restart (or another peer) resumes where it left off.
//!
//! # Key Types
//!
//! - [`Discovery`] / [`StaticDiscovery`]: peer membership and liveness
//! - [`LeaseProvider`] / [`Lease`]: which peer processes a given block
//! - [`AnchorFetcher`]: anchor string to ordered operations
//! - [`OperationFilter`]: replay and post-deactivation filtering
//! - [`Observer`]: the per-channel worker
//! - [`Monitor`]: read-only lag and completeness checks with [`Alert`]s

pub mod discovery;
pub mod error;
pub mod fetcher;
pub mod filter;
pub mod lease;
pub mod metadata;
pub mod monitor;
pub mod observer;

#[cfg(test)]
mod testing;

pub use discovery::{Discovery, Member, Role, StaticDiscovery};
pub use error::{ErrorCode, ObserverError, ObserverResult};
pub use fetcher::{AnchorFetcher, AnchorLocation};
pub use filter::OperationFilter;
pub use lease::{Lease, LeaseProvider};
pub use metadata::{FileMetadataStore, InMemoryMetadataStore, Metadata, MetadataStore, SkippedAnchor};
pub use monitor::{Alert, Monitor, MonitorConfig};
pub use observer::{Observer, ObserverConfig, PassSummary};
