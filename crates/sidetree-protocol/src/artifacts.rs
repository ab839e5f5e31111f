use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sidetree_types::{CasAddress, Delta, SuffixData, UniqueSuffix};

use crate::error::{ProtocolError, ProtocolResult};
use crate::params::ProtocolParameters;

/// Decompressed artifacts may be at most this many times their size limit.
const MAX_INFLATION: usize = 8;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReference {
    pub suffix_data: SuffixData,
}

/// Header of a recover, deactivate, or update operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedReference {
    pub did_suffix: UniqueSuffix,
    pub reveal_value: String,
    pub signed_data: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub create: Vec<CreateReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recover: Vec<SignedReference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub deactivate: Vec<SignedReference>,
}

/// Root of a batch's artifact graph; its address is anchored on the ledger.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreIndexFile {
    /// Present whenever the batch carries any delta or update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisional_index_file_uri: Option<CasAddress>,
    #[serde(default)]
    pub operations: CoreOperations,
}

impl CoreIndexFile {
    pub fn operation_count(&self) -> usize {
        self.operations.create.len()
            + self.operations.recover.len()
            + self.operations.deactivate.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkReference {
    pub chunk_file_uri: CasAddress,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalOperations {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update: Vec<SignedReference>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionalIndexFile {
    pub chunks: Vec<ChunkReference>,
    #[serde(default)]
    pub operations: ProvisionalOperations,
}

/// Deltas in batch order: creates, then recovers, then updates.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkFile {
    pub deltas: Vec<Delta>,
}

#[derive(Clone, Copy, Debug)]
enum Kind {
    CoreIndex,
    ProvisionalIndex,
    Chunk,
}

impl Kind {
    fn name(self) -> &'static str {
        match self {
            Self::CoreIndex => "core index",
            Self::ProvisionalIndex => "provisional index",
            Self::Chunk => "chunk",
        }
    }

    fn limit(self, params: &ProtocolParameters) -> usize {
        match self {
            Self::CoreIndex => params.max_core_index_size,
            Self::ProvisionalIndex => params.max_provisional_index_size,
            Self::Chunk => params.max_chunk_size,
        }
    }
}

/// Encodes artifacts as compressed JSON under one protocol generation.
pub struct ArtifactCodec<'a> {
    params: &'a ProtocolParameters,
}

impl<'a> ArtifactCodec<'a> {
    pub fn new(params: &'a ProtocolParameters) -> Self {
        Self { params }
    }

    pub fn encode_core_index(&self, file: &CoreIndexFile) -> ProtocolResult<Vec<u8>> {
        self.encode(Kind::CoreIndex, file)
    }

    pub fn encode_provisional_index(&self, file: &ProvisionalIndexFile) -> ProtocolResult<Vec<u8>> {
        self.encode(Kind::ProvisionalIndex, file)
    }

    pub fn encode_chunk(&self, file: &ChunkFile) -> ProtocolResult<Vec<u8>> {
        self.encode(Kind::Chunk, file)
    }

    pub fn decode_core_index(&self, bytes: &[u8]) -> ProtocolResult<CoreIndexFile> {
        self.decode(Kind::CoreIndex, bytes)
    }

    pub fn decode_provisional_index(&self, bytes: &[u8]) -> ProtocolResult<ProvisionalIndexFile> {
        self.decode(Kind::ProvisionalIndex, bytes)
    }

    pub fn decode_chunk(&self, bytes: &[u8]) -> ProtocolResult<ChunkFile> {
        self.decode(Kind::Chunk, bytes)
    }

    fn encode<T: Serialize>(&self, kind: Kind, value: &T) -> ProtocolResult<Vec<u8>> {
        let json = serde_json::to_vec(value)
            .map_err(|e| ProtocolError::Malformed(format!("{}: {e}", kind.name())))?;
        let packed = self.params.compression_algorithm.compress(&json)?;
        let limit = kind.limit(self.params);
        if packed.len() > limit {
            return Err(ProtocolError::TooLarge {
                what: kind.name(),
                size: packed.len(),
                limit,
            });
        }
        Ok(packed)
    }

    fn decode<T: DeserializeOwned>(&self, kind: Kind, bytes: &[u8]) -> ProtocolResult<T> {
        let limit = kind.limit(self.params);
        if bytes.len() > limit {
            return Err(ProtocolError::TooLarge {
                what: kind.name(),
                size: bytes.len(),
                limit,
            });
        }
        let json = self
            .params
            .compression_algorithm
            .decompress(bytes, limit.saturating_mul(MAX_INFLATION))?;
        serde_json::from_slice(&json)
            .map_err(|e| ProtocolError::Malformed(format!("{}: {e}", kind.name())))
    }
}
