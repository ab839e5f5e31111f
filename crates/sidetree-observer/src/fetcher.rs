use std::sync::Arc;

use bytes::Bytes;
use sidetree_cas::{CasClient, CasError};
use sidetree_protocol::{
    unique_suffix, ArtifactCodec, ProtocolError, ProtocolParameters, ProtocolRegistry,
};
use sidetree_types::{
    AnchorString, CasAddress, Delta, Namespace, Operation, OperationRequest, TxnPosition,
    UniqueSuffix,
};
use tracing::debug;

use crate::error::{ObserverError, ObserverResult};

/// Where an anchor sits on the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnchorLocation {
    pub block: u64,
    pub anchor_index: u32,
}

fn malformed(e: ProtocolError) -> ObserverError {
    ObserverError::AnchorMalformed(e.to_string())
}

/// Downloads the artifact graph behind an anchor and reconstructs its
/// operations in anchored order: core index creates, recovers, deactivates,
/// then provisional index updates.
#[derive(Clone)]
pub struct AnchorFetcher {
    cas: Arc<dyn CasClient>,
}

impl AnchorFetcher {
    pub fn new(cas: Arc<dyn CasClient>) -> Self {
        Self { cas }
    }

    /// Empty content counts as missing.
    async fn download(&self, address: &CasAddress) -> ObserverResult<Bytes> {
        let content = self.cas.get(address).await?;
        if content.is_empty() {
            return Err(CasError::NotFound(address.clone()).into());
        }
        Ok(content)
    }

    pub async fn fetch(
        &self,
        protocols: &ProtocolRegistry,
        location: AnchorLocation,
        anchor_string: &str,
    ) -> ObserverResult<Vec<Operation>> {
        let anchor: AnchorString = anchor_string
            .parse()
            .map_err(|e| ObserverError::AnchorMalformed(format!("{anchor_string}: {e}")))?;
        let params = protocols.at(location.block).map_err(malformed)?;
        let codec = ArtifactCodec::new(params);

        let core = codec
            .decode_core_index(&self.download(&anchor.core_index).await?)
            .map_err(malformed)?;

        let (updates, deltas) = match &core.provisional_index_file_uri {
            Some(address) => {
                let provisional = codec
                    .decode_provisional_index(&self.download(address).await?)
                    .map_err(malformed)?;
                let mut deltas = Vec::new();
                for chunk in &provisional.chunks {
                    let file = codec
                        .decode_chunk(&self.download(&chunk.chunk_file_uri).await?)
                        .map_err(malformed)?;
                    deltas.extend(file.deltas);
                }
                (provisional.operations.update, deltas)
            }
            None => (Vec::new(), Vec::new()),
        };

        let total = core.operation_count() + updates.len();
        if total != anchor.operation_count as usize {
            return Err(ObserverError::BatchInconsistent(format!(
                "anchor declares {} operations, artifacts hold {total}",
                anchor.operation_count
            )));
        }

        let mut out = Reconstruct {
            namespace: protocols.namespace(),
            params,
            origin: &anchor.core_index,
            location,
            deltas: deltas.into_iter(),
            ops: Vec::with_capacity(total),
        };
        for create in core.operations.create {
            let delta = out.next_delta()?;
            let suffix = unique_suffix(params, &create.suffix_data).map_err(malformed)?;
            out.push(
                suffix,
                OperationRequest::Create {
                    suffix_data: create.suffix_data,
                    delta,
                },
            );
        }
        for r in core.operations.recover {
            let delta = out.next_delta()?;
            out.push(
                r.did_suffix.clone(),
                OperationRequest::Recover {
                    did_suffix: r.did_suffix,
                    reveal_value: r.reveal_value,
                    delta,
                    signed_data: r.signed_data,
                },
            );
        }
        for d in core.operations.deactivate {
            out.push(
                d.did_suffix.clone(),
                OperationRequest::Deactivate {
                    did_suffix: d.did_suffix,
                    reveal_value: d.reveal_value,
                    signed_data: d.signed_data,
                },
            );
        }
        for u in updates {
            let delta = out.next_delta()?;
            out.push(
                u.did_suffix.clone(),
                OperationRequest::Update {
                    did_suffix: u.did_suffix,
                    reveal_value: u.reveal_value,
                    delta,
                    signed_data: u.signed_data,
                },
            );
        }
        let leftover = out.deltas.len();
        if leftover > 0 {
            return Err(ObserverError::BatchInconsistent(format!(
                "{leftover} unreferenced deltas in chunks"
            )));
        }

        debug!(
            block = location.block,
            anchor = location.anchor_index,
            ops = out.ops.len(),
            "anchor reconstructed"
        );
        Ok(out.ops)
    }
}

struct Reconstruct<'a> {
    namespace: &'a Namespace,
    params: &'a ProtocolParameters,
    origin: &'a CasAddress,
    location: AnchorLocation,
    deltas: std::vec::IntoIter<Delta>,
    ops: Vec<Operation>,
}

impl Reconstruct<'_> {
    fn next_delta(&mut self) -> ObserverResult<Delta> {
        self.deltas.next().ok_or_else(|| {
            ObserverError::BatchInconsistent("chunks hold fewer deltas than operations".into())
        })
    }

    fn push(&mut self, unique_suffix: UniqueSuffix, request: OperationRequest) {
        let position = TxnPosition::new(
            self.location.block,
            self.location.anchor_index,
            self.ops.len() as u32,
        );
        self.ops.push(Operation {
            namespace: self.namespace.clone(),
            unique_suffix,
            position,
            protocol_generation: self.params.generation_time,
            anchor_origin: self.origin.clone(),
            request,
        });
    }
}
