use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Hash algorithm, identified by its multihash code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub enum HashAlgorithm {
    /// SHA2-256, multihash code `0x12`.
    Sha2_256,
    /// BLAKE3-256, multihash code `0x1e`.
    Blake3,
}

impl HashAlgorithm {
    pub const fn code(self) -> u64 {
        match self {
            Self::Sha2_256 => 0x12,
            Self::Blake3 => 0x1e,
        }
    }

    pub fn from_code(code: u64) -> Result<Self, TypeError> {
        match code {
            0x12 => Ok(Self::Sha2_256),
            0x1e => Ok(Self::Blake3),
            other => Err(TypeError::UnknownHashCode(other)),
        }
    }

    /// Digest length in bytes.
    pub const fn digest_len(self) -> usize {
        32
    }
}

impl TryFrom<u64> for HashAlgorithm {
    type Error = TypeError;

    fn try_from(code: u64) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<HashAlgorithm> for u64 {
    fn from(alg: HashAlgorithm) -> Self {
        alg.code()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha2_256 => f.write_str("sha2-256"),
            Self::Blake3 => f.write_str("blake3"),
        }
    }
}
