use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};

const ZSTD_LEVEL: i32 = 3;

/// Artifact compression used by a protocol generation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    #[default]
    Zstd,
}

impl CompressionAlgorithm {
    pub fn compress(self, data: &[u8]) -> ProtocolResult<Vec<u8>> {
        match self {
            Self::None => Ok(data.to_vec()),
            Self::Zstd => zstd::encode_all(data, ZSTD_LEVEL)
                .map_err(|e| ProtocolError::Compression(e.to_string())),
        }
    }

    /// Decompress, refusing to inflate beyond `limit` bytes.
    pub fn decompress(self, data: &[u8], limit: usize) -> ProtocolResult<Vec<u8>> {
        let out = match self {
            Self::None => data.to_vec(),
            Self::Zstd => zstd::bulk::decompress(data, limit)
                .map_err(|e| ProtocolError::Compression(e.to_string()))?,
        };
        if out.len() > limit {
            return Err(ProtocolError::TooLarge {
                what: "decompressed artifact",
                size: out.len(),
                limit,
            });
        }
        Ok(out)
    }
}
