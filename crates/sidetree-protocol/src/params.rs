use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sidetree_types::{HashAlgorithm, PatchAction};

use crate::compression::CompressionAlgorithm;
use crate::error::{ProtocolError, ProtocolResult};

/// Immutable parameter bundle for one protocol generation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolParameters {
    /// First transaction time (block number) at which this generation applies.
    pub generation_time: u64,
    pub version: String,
    pub hash_algorithm: HashAlgorithm,
    pub max_operations_per_batch: u32,
    /// Limit on a single client request body.
    pub max_operation_size: usize,
    /// Limit on the canonical JSON size of one delta.
    pub max_delta_size: usize,
    pub max_core_index_size: usize,
    pub max_provisional_index_size: usize,
    pub max_chunk_size: usize,
    pub compression_algorithm: CompressionAlgorithm,
    pub allowed_patch_actions: BTreeSet<PatchAction>,
    /// JWS `alg` values accepted on signed data.
    pub allowed_signature_algorithms: Vec<String>,
    /// JWK curves accepted for signing and document keys.
    pub allowed_key_algorithms: Vec<String>,
}

impl Default for ProtocolParameters {
    fn default() -> Self {
        Self {
            generation_time: 0,
            version: "1.0".into(),
            hash_algorithm: HashAlgorithm::Sha2_256,
            max_operations_per_batch: 100,
            max_operation_size: 2_500,
            max_delta_size: 1_000,
            max_core_index_size: 1_000_000,
            max_provisional_index_size: 1_000_000,
            max_chunk_size: 10_000_000,
            compression_algorithm: CompressionAlgorithm::Zstd,
            allowed_patch_actions: PatchAction::ALL.into_iter().collect(),
            allowed_signature_algorithms: vec!["EdDSA".into()],
            allowed_key_algorithms: vec!["Ed25519".into()],
        }
    }
}

impl ProtocolParameters {
    pub fn validate(&self) -> ProtocolResult<()> {
        let invalid = |msg: &str| {
            Err(ProtocolError::InvalidParameters(format!(
                "generation {}: {msg}",
                self.generation_time
            )))
        };
        if self.max_operations_per_batch == 0 {
            return invalid("max_operations_per_batch must be > 0");
        }
        if self.max_operation_size == 0 || self.max_delta_size == 0 {
            return invalid("operation and delta size limits must be > 0");
        }
        if self.max_core_index_size == 0
            || self.max_provisional_index_size == 0
            || self.max_chunk_size == 0
        {
            return invalid("artifact size limits must be > 0");
        }
        if self.allowed_signature_algorithms.is_empty() || self.allowed_key_algorithms.is_empty() {
            return invalid("at least one signature and key algorithm is required");
        }
        Ok(())
    }

    pub fn allows_patch(&self, action: PatchAction) -> bool {
        self.allowed_patch_actions.contains(&action)
    }

    pub fn allows_signature(&self, alg: &str) -> bool {
        self.allowed_signature_algorithms.iter().any(|a| a == alg)
    }

    pub fn allows_key(&self, crv: &str) -> bool {
        self.allowed_key_algorithms.iter().any(|a| a == crv)
    }
}
