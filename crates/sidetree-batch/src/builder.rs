use std::collections::{HashMap, HashSet};

use bytes::Bytes;
use sidetree_cas::CasClient;
use sidetree_protocol::{
    ArtifactCodec, ChunkFile, ChunkReference, CoreIndexFile, CoreOperations, CreateReference,
    OperationParser, ProtocolParameters, ProvisionalIndexFile, ProvisionalOperations,
    SignedReference,
};
use sidetree_types::{AnchorString, CasAddress, OperationRequest, UniqueSuffix};
use tracing::{debug, warn};

use crate::error::BatchResult;
use crate::queue::QueuedOperation;

/// A cut batch split by operation class, in anchored order.
///
/// The observer numbers operations creates, recovers, deactivates, then
/// updates; each class keeps enqueue order. An operation that would be
/// numbered ahead of an earlier-queued operation on the same suffix is held
/// back in `deferred`, together with everything queued after it for that
/// suffix, so per-suffix order always matches enqueue order.
#[derive(Debug, Default)]
pub struct Partitioned {
    pub creates: Vec<QueuedOperation>,
    pub recovers: Vec<QueuedOperation>,
    pub deactivates: Vec<QueuedOperation>,
    pub updates: Vec<QueuedOperation>,
    /// Operations that no longer validate under the current protocol.
    pub dropped: Vec<QueuedOperation>,
    /// Operations left for the next cut, in enqueue order.
    pub deferred: Vec<QueuedOperation>,
}

impl Partitioned {
    pub fn len(&self) -> usize {
        self.creates.len() + self.recovers.len() + self.deactivates.len() + self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Included operations in anchored order.
    pub fn operations(&self) -> impl Iterator<Item = &QueuedOperation> {
        self.creates
            .iter()
            .chain(&self.recovers)
            .chain(&self.deactivates)
            .chain(&self.updates)
    }

    pub fn into_included(self) -> Vec<QueuedOperation> {
        let mut out = self.creates;
        out.extend(self.recovers);
        out.extend(self.deactivates);
        out.extend(self.updates);
        out
    }
}

/// Addresses of an uploaded artifact graph.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BuiltBatch {
    pub anchor: AnchorString,
    pub provisional_index: Option<CasAddress>,
    pub chunk: Option<CasAddress>,
}

/// Serializes a batch into chunk, provisional index, and core index files
/// and uploads them, dependencies first.
pub struct ArtifactBuilder<'a> {
    params: &'a ProtocolParameters,
    cas: &'a dyn CasClient,
}

impl<'a> ArtifactBuilder<'a> {
    pub fn new(params: &'a ProtocolParameters, cas: &'a dyn CasClient) -> Self {
        Self { params, cas }
    }

    /// Revalidate and partition. Invalid operations are logged and moved to
    /// `dropped`; the rest of the batch proceeds.
    pub fn partition(&self, ops: Vec<QueuedOperation>) -> Partitioned {
        let parser = OperationParser::new(self.params);
        let mut out = Partitioned::default();
        let mut latest: HashMap<UniqueSuffix, u8> = HashMap::new();
        let mut held: HashSet<UniqueSuffix> = HashSet::new();
        for queued in ops {
            let suffix = &queued.operation.unique_suffix;
            if held.contains(suffix) {
                out.deferred.push(queued);
                continue;
            }
            if let Err(e) = parser.validate(queued.operation.request.clone()) {
                warn!(
                    seq = queued.seq,
                    suffix = %queued.operation.unique_suffix,
                    error = %e,
                    "dropping operation that fails validation"
                );
                out.dropped.push(queued);
                continue;
            }
            let rank = class_rank(&queued.operation.request);
            if latest.get(suffix).is_some_and(|&r| rank < r) {
                debug!(
                    seq = queued.seq,
                    suffix = %suffix,
                    "deferring operation queued behind a later-numbered one"
                );
                held.insert(suffix.clone());
                out.deferred.push(queued);
                continue;
            }
            let entry = latest.entry(suffix.clone()).or_insert(rank);
            *entry = (*entry).max(rank);
            match &queued.operation.request {
                OperationRequest::Create { .. } => out.creates.push(queued),
                OperationRequest::Recover { .. } => out.recovers.push(queued),
                OperationRequest::Deactivate { .. } => out.deactivates.push(queued),
                OperationRequest::Update { .. } => out.updates.push(queued),
            }
        }
        out
    }

    pub async fn upload(&self, batch: &Partitioned) -> BatchResult<BuiltBatch> {
        let codec = ArtifactCodec::new(self.params);

        let mut core = CoreOperations::default();
        let mut provisional = ProvisionalOperations::default();
        let mut deltas = Vec::new();

        for q in &batch.creates {
            if let OperationRequest::Create { suffix_data, delta } = &q.operation.request {
                core.create.push(CreateReference {
                    suffix_data: suffix_data.clone(),
                });
                deltas.push(delta.clone());
            }
        }
        for q in &batch.recovers {
            if let OperationRequest::Recover {
                did_suffix,
                reveal_value,
                delta,
                signed_data,
            } = &q.operation.request
            {
                core.recover
                    .push(signed_reference(did_suffix, reveal_value, signed_data));
                deltas.push(delta.clone());
            }
        }
        for q in &batch.deactivates {
            if let OperationRequest::Deactivate {
                did_suffix,
                reveal_value,
                signed_data,
            } = &q.operation.request
            {
                core.deactivate
                    .push(signed_reference(did_suffix, reveal_value, signed_data));
            }
        }
        for q in &batch.updates {
            if let OperationRequest::Update {
                did_suffix,
                reveal_value,
                delta,
                signed_data,
            } = &q.operation.request
            {
                provisional
                    .update
                    .push(signed_reference(did_suffix, reveal_value, signed_data));
                deltas.push(delta.clone());
            }
        }

        let (chunk, provisional_index) = if deltas.is_empty() {
            (None, None)
        } else {
            let chunk_bytes = codec.encode_chunk(&ChunkFile { deltas })?;
            let chunk = self.cas.put(Bytes::from(chunk_bytes)).await?;
            debug!(address = chunk.short(), "chunk uploaded");

            let index = ProvisionalIndexFile {
                chunks: vec![ChunkReference {
                    chunk_file_uri: chunk.clone(),
                }],
                operations: provisional,
            };
            let index_bytes = codec.encode_provisional_index(&index)?;
            let address = self.cas.put(Bytes::from(index_bytes)).await?;
            debug!(address = address.short(), "provisional index uploaded");
            (Some(chunk), Some(address))
        };

        let core_index = CoreIndexFile {
            provisional_index_file_uri: provisional_index.clone(),
            operations: core,
        };
        let core_bytes = codec.encode_core_index(&core_index)?;
        let core_address = self.cas.put(Bytes::from(core_bytes)).await?;
        debug!(address = core_address.short(), ops = batch.len(), "core index uploaded");

        Ok(BuiltBatch {
            anchor: AnchorString {
                core_index: core_address,
                operation_count: batch.len() as u32,
            },
            provisional_index,
            chunk,
        })
    }
}

fn signed_reference(suffix: &UniqueSuffix, reveal_value: &str, signed_data: &str) -> SignedReference {
    SignedReference {
        did_suffix: suffix.clone(),
        reveal_value: reveal_value.to_string(),
        signed_data: signed_data.to_string(),
    }
}

/// Position of an operation class in anchored order.
fn class_rank(request: &OperationRequest) -> u8 {
    match request {
        OperationRequest::Create { .. } => 0,
        OperationRequest::Recover { .. } => 1,
        OperationRequest::Deactivate { .. } => 2,
        OperationRequest::Update { .. } => 3,
    }
}
