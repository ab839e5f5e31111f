use serde_json::Value;
use sidetree_crypto::verify_commitment;
use sidetree_protocol::{
    check_multihash, delta_hash_matches, open_signed, unique_suffix, validate_delta, verify_signed,
    ProtocolError, ProtocolParameters, ProtocolRegistry,
};
use sidetree_types::{
    DeactivateSignedPayload, Delta, Operation, OperationRequest, RecoverSignedPayload, SuffixData,
    TxnPosition, UniqueSuffix, UpdateSignedPayload,
};
use tracing::{debug, warn};

use crate::composer::{DocumentComposer, PatchError};
use crate::error::{ResolveError, ResolveResult};

/// Why a single operation was not applied. Never fatal to the log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("no {0} commitment is active")]
    NoCommitment(&'static str),

    #[error("reveal value does not match the {0} commitment")]
    CommitmentMismatch(&'static str),

    #[error("delta does not match its signed hash")]
    DeltaHashMismatch,

    #[error("signed suffix {0} does not match the operation")]
    SuffixMismatch(UniqueSuffix),

    #[error("document already created")]
    DuplicateCreate,

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("patch rejected: {0}")]
    Patch(#[from] PatchError),
}

/// Replayed state of one document.
#[derive(Clone, Debug, PartialEq)]
pub struct DocumentState {
    /// Internal document model, before presentation.
    pub document: Value,
    /// Commitment the next update must reveal; `None` once unusable.
    pub update_commitment: Option<String>,
    /// Commitment the next recover or deactivate must reveal.
    pub recovery_commitment: Option<String>,
    /// `None` for an unpublished long-form document.
    pub created: Option<TxnPosition>,
    pub updated: Option<TxnPosition>,
    pub deactivated: Option<TxnPosition>,
}

impl DocumentState {
    pub fn is_deactivated(&self) -> bool {
        self.deactivated.is_some()
    }
}

/// Replays a suffix log under the protocol in effect at each operation.
pub struct OperationApplier<'a> {
    protocols: &'a ProtocolRegistry,
}

impl<'a> OperationApplier<'a> {
    pub fn new(protocols: &'a ProtocolRegistry) -> Self {
        Self { protocols }
    }

    /// Replay a full log. The first entry must be the create.
    pub fn replay(&self, log: &[Operation]) -> ResolveResult<DocumentState> {
        let (first, rest) = log
            .split_first()
            .ok_or_else(|| ResolveError::NotFound("empty operation log".into()))?;
        let mut state = self.create(first)?;

        for op in rest {
            if state.is_deactivated() {
                debug!(
                    suffix = %op.unique_suffix,
                    position = %op.position,
                    op = %op.operation_type(),
                    "operation after deactivation ignored"
                );
                continue;
            }
            match self.apply(&state, op) {
                Ok(next) => state = next,
                Err(rejection) => debug!(
                    suffix = %op.unique_suffix,
                    position = %op.position,
                    op = %op.operation_type(),
                    reason = %rejection,
                    "operation rejected"
                ),
            }
        }
        Ok(state)
    }

    /// Initial state from an anchored create.
    pub fn create(&self, op: &Operation) -> ResolveResult<DocumentState> {
        let OperationRequest::Create { suffix_data, delta } = &op.request else {
            return Err(ResolveError::Malformed(format!(
                "log for {} starts with {} instead of create",
                op.unique_suffix,
                op.operation_type()
            )));
        };
        let params = self.protocols.at(op.transaction_time())?;
        if unique_suffix(params, suffix_data)? != op.unique_suffix {
            return Err(ResolveError::Malformed(format!(
                "create at {} does not hash to {}",
                op.position, op.unique_suffix
            )));
        }
        Ok(self.initial(params, suffix_data, delta, Some(op.position)))
    }

    /// State established by create data. An unusable delta still creates the
    /// document, empty and without an update commitment.
    pub fn initial(
        &self,
        params: &ProtocolParameters,
        suffix_data: &SuffixData,
        delta: &Delta,
        created: Option<TxnPosition>,
    ) -> DocumentState {
        let (document, update_commitment) = match compose_fresh(params, delta, &suffix_data.delta_hash) {
            Ok(document) => (document, Some(delta.update_commitment.clone())),
            Err(rejection) => {
                warn!(reason = %rejection, "create delta rejected; document starts empty");
                (DocumentComposer::empty_document(), None)
            }
        };
        DocumentState {
            document,
            update_commitment,
            recovery_commitment: Some(suffix_data.recovery_commitment.clone()),
            created,
            updated: None,
            deactivated: None,
        }
    }

    /// Apply one operation to `state`, returning the successor state.
    pub fn apply(&self, state: &DocumentState, op: &Operation) -> Result<DocumentState, Rejection> {
        let params = self.protocols.at(op.transaction_time())?;
        match &op.request {
            OperationRequest::Create { .. } => Err(Rejection::DuplicateCreate),
            OperationRequest::Update {
                reveal_value,
                delta,
                signed_data,
                ..
            } => {
                check_reveal(params, reveal_value, state.update_commitment.as_deref(), "update")?;
                let (jws, payload): (_, UpdateSignedPayload) = open_signed(params, signed_data)?;
                verify_signed(params, &jws, &payload.update_key, reveal_value)?;
                validate_delta(params, delta)?;
                if !delta_hash_matches(delta, &payload.delta_hash)? {
                    return Err(Rejection::DeltaHashMismatch);
                }
                let document = DocumentComposer::new(params).compose(&state.document, &delta.patches)?;
                Ok(DocumentState {
                    document,
                    update_commitment: Some(delta.update_commitment.clone()),
                    updated: Some(op.position),
                    ..state.clone()
                })
            }
            OperationRequest::Recover {
                reveal_value,
                delta,
                signed_data,
                ..
            } => {
                check_reveal(params, reveal_value, state.recovery_commitment.as_deref(), "recovery")?;
                let (jws, payload): (_, RecoverSignedPayload) = open_signed(params, signed_data)?;
                verify_signed(params, &jws, &payload.recovery_key, reveal_value)?;
                check_multihash(params, &payload.recovery_commitment, "recovery commitment")?;

                let (document, update_commitment) =
                    match compose_fresh(params, delta, &payload.delta_hash) {
                        Ok(document) => (document, Some(delta.update_commitment.clone())),
                        Err(rejection) => {
                            warn!(
                                suffix = %op.unique_suffix,
                                reason = %rejection,
                                "recover delta rejected; document reset"
                            );
                            (DocumentComposer::empty_document(), None)
                        }
                    };
                Ok(DocumentState {
                    document,
                    update_commitment,
                    recovery_commitment: Some(payload.recovery_commitment),
                    updated: Some(op.position),
                    ..state.clone()
                })
            }
            OperationRequest::Deactivate {
                reveal_value,
                signed_data,
                ..
            } => {
                check_reveal(params, reveal_value, state.recovery_commitment.as_deref(), "recovery")?;
                let (jws, payload): (_, DeactivateSignedPayload) = open_signed(params, signed_data)?;
                if payload.did_suffix != op.unique_suffix {
                    return Err(Rejection::SuffixMismatch(payload.did_suffix));
                }
                verify_signed(params, &jws, &payload.recovery_key, reveal_value)?;
                Ok(DocumentState {
                    update_commitment: None,
                    recovery_commitment: None,
                    deactivated: Some(op.position),
                    ..state.clone()
                })
            }
        }
    }
}

fn check_reveal(
    params: &ProtocolParameters,
    reveal: &str,
    commitment: Option<&str>,
    class: &'static str,
) -> Result<(), Rejection> {
    let commitment = commitment.ok_or(Rejection::NoCommitment(class))?;
    check_multihash(params, reveal, "reveal value")?;
    let matches = verify_commitment(reveal, commitment)
        .map_err(|e| ProtocolError::Malformed(format!("{class} commitment: {e}")))?;
    if !matches {
        return Err(Rejection::CommitmentMismatch(class));
    }
    Ok(())
}

/// Compose a delta over an empty document after checking it against its hash.
fn compose_fresh(
    params: &ProtocolParameters,
    delta: &Delta,
    expected_hash: &str,
) -> Result<Value, Rejection> {
    validate_delta(params, delta)?;
    if !delta_hash_matches(delta, expected_hash)? {
        return Err(Rejection::DeltaHashMismatch);
    }
    Ok(DocumentComposer::new(params).compose(&DocumentComposer::empty_document(), &delta.patches)?)
}
