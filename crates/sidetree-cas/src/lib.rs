//! Content-addressable storage for batch artifacts.
//!
//! Chunks, provisional indexes, and core indexes are written here by the
//! batch writer and read back by the observer. Addresses are base64url
//! multihashes of the content under the active protocol's hash algorithm.
//!
//! # Design Rules
//!
//! 1. `get(put(x)) == x`.
//! 2. Addresses are deterministic in the content for a fixed algorithm.
//! 3. `NotFound` is permanent for the caller's purposes; `Transient` is retryable.
//! 4. The store never interprets artifact contents.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{CasError, CasResult};
pub use memory::InMemoryCas;
pub use traits::{content_address, verify_content, CasClient};
