use async_trait::async_trait;
use bytes::Bytes;
use sidetree_crypto::Multihash;
use sidetree_types::{CasAddress, HashAlgorithm};

use crate::error::{CasError, CasResult};

/// Content-addressable store client.
///
/// Implementations must satisfy:
/// - `get(put(x)) == x`
/// - `put` is idempotent; the same bytes always yield the same address
/// - retryable failures surface as [`CasError::Transient`]
#[async_trait]
pub trait CasClient: Send + Sync {
    /// Upload `content` and return its address.
    async fn put(&self, content: Bytes) -> CasResult<CasAddress>;

    /// Download the content stored under `address`.
    async fn get(&self, address: &CasAddress) -> CasResult<Bytes>;
}

/// Address of `content` under `algorithm`.
pub fn content_address(algorithm: HashAlgorithm, content: &[u8]) -> CasAddress {
    CasAddress::new(Multihash::compute(algorithm, content).encode())
        .expect("base64url multihash is a valid address")
}

/// Check that `content` hashes to `address` under the address's algorithm.
pub fn verify_content(address: &CasAddress, content: &[u8]) -> CasResult<()> {
    let expected = Multihash::decode(address.as_str())
        .map_err(|_| CasError::HashMismatch(address.clone()))?;
    if expected.matches(content) {
        Ok(())
    } else {
        Err(CasError::HashMismatch(address.clone()))
    }
}
