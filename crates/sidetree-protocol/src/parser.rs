use sidetree_types::{
    DeactivateSignedPayload, Delta, OperationRequest, OperationType, RecoverSignedPayload,
    UniqueSuffix, UpdateSignedPayload,
};
use tracing::debug;

use crate::error::{ProtocolError, ProtocolResult};
use crate::params::ProtocolParameters;
use crate::validation::{
    check_multihash, delta_hash_matches, open_signed, unique_suffix, validate_delta, verify_signed,
};

/// A client request that passed ingress validation.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedOperation {
    pub unique_suffix: UniqueSuffix,
    pub request: OperationRequest,
}

impl ParsedOperation {
    pub fn operation_type(&self) -> OperationType {
        self.request.operation_type()
    }
}

/// Ingress validator bound to one protocol generation.
///
/// Validation is stateless: it checks structure, bounds, algorithms, that
/// the reveal value matches the signing key, and the signature. Whether the
/// reveal matches the document's current commitment is only known at
/// resolution time.
pub struct OperationParser<'a> {
    params: &'a ProtocolParameters,
}

impl<'a> OperationParser<'a> {
    pub fn new(params: &'a ProtocolParameters) -> Self {
        Self { params }
    }

    pub fn parse(&self, bytes: &[u8]) -> ProtocolResult<ParsedOperation> {
        if bytes.len() > self.params.max_operation_size {
            return Err(ProtocolError::TooLarge {
                what: "operation",
                size: bytes.len(),
                limit: self.params.max_operation_size,
            });
        }
        let request: OperationRequest = serde_json::from_slice(bytes)
            .map_err(|e| ProtocolError::Malformed(format!("operation request: {e}")))?;
        let parsed = self.validate(request)?;
        debug!(
            suffix = %parsed.unique_suffix,
            op = %parsed.operation_type(),
            "operation accepted at ingress"
        );
        Ok(parsed)
    }

    pub fn validate(&self, request: OperationRequest) -> ProtocolResult<ParsedOperation> {
        let p = self.params;
        let unique_suffix = match &request {
            OperationRequest::Create { suffix_data, delta } => {
                check_multihash(p, &suffix_data.recovery_commitment, "recovery commitment")?;
                check_multihash(p, &suffix_data.delta_hash, "delta hash")?;
                self.check_delta(delta, &suffix_data.delta_hash)?;
                unique_suffix(p, suffix_data)?
            }
            OperationRequest::Update {
                did_suffix,
                reveal_value,
                delta,
                signed_data,
            } => {
                check_multihash(p, reveal_value, "reveal value")?;
                let (jws, payload): (_, UpdateSignedPayload) = open_signed(p, signed_data)?;
                verify_signed(p, &jws, &payload.update_key, reveal_value)?;
                self.check_delta(delta, &payload.delta_hash)?;
                did_suffix.clone()
            }
            OperationRequest::Recover {
                did_suffix,
                reveal_value,
                delta,
                signed_data,
            } => {
                check_multihash(p, reveal_value, "reveal value")?;
                let (jws, payload): (_, RecoverSignedPayload) = open_signed(p, signed_data)?;
                verify_signed(p, &jws, &payload.recovery_key, reveal_value)?;
                check_multihash(p, &payload.recovery_commitment, "recovery commitment")?;
                self.check_delta(delta, &payload.delta_hash)?;
                did_suffix.clone()
            }
            OperationRequest::Deactivate {
                did_suffix,
                reveal_value,
                signed_data,
            } => {
                check_multihash(p, reveal_value, "reveal value")?;
                let (jws, payload): (_, DeactivateSignedPayload) = open_signed(p, signed_data)?;
                if &payload.did_suffix != did_suffix {
                    return Err(ProtocolError::Violation(
                        "signed suffix does not match the request".into(),
                    ));
                }
                verify_signed(p, &jws, &payload.recovery_key, reveal_value)?;
                did_suffix.clone()
            }
        };
        Ok(ParsedOperation {
            unique_suffix,
            request,
        })
    }

    fn check_delta(&self, delta: &Delta, expected_hash: &str) -> ProtocolResult<()> {
        validate_delta(self.params, delta)?;
        if !delta_hash_matches(delta, expected_hash)? {
            return Err(ProtocolError::Violation(
                "delta does not match its committed hash".into(),
            ));
        }
        Ok(())
    }
}
