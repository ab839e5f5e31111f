use serde::{Deserialize, Serialize};
use sidetree_crypto::{base64url_decode, base64url_encode, canonicalize};
use sidetree_types::{Delta, Namespace, OperationRequest, SuffixData, UniqueSuffix};

use crate::error::{ProtocolError, ProtocolResult};
use crate::params::ProtocolParameters;
use crate::validation::unique_suffix;

/// Create data embedded in a long-form DID.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub suffix_data: SuffixData,
    pub delta: Delta,
}

impl InitialState {
    /// Extract the initial state of a create request; `None` otherwise.
    pub fn from_request(request: &OperationRequest) -> Option<Self> {
        match request {
            OperationRequest::Create { suffix_data, delta } => Some(Self {
                suffix_data: suffix_data.clone(),
                delta: delta.clone(),
            }),
            _ => None,
        }
    }

    /// Base64url of the canonical JSON.
    pub fn encode(&self) -> ProtocolResult<String> {
        let json = canonicalize(self).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
        Ok(base64url_encode(json))
    }

    pub fn decode(encoded: &str) -> ProtocolResult<Self> {
        let json = base64url_decode(encoded)
            .map_err(|e| ProtocolError::Malformed(format!("initial state: {e}")))?;
        serde_json::from_slice(&json)
            .map_err(|e| ProtocolError::Malformed(format!("initial state: {e}")))
    }

    pub fn unique_suffix(&self, params: &ProtocolParameters) -> ProtocolResult<UniqueSuffix> {
        unique_suffix(params, &self.suffix_data)
    }

    pub fn into_request(self) -> OperationRequest {
        OperationRequest::Create {
            suffix_data: self.suffix_data,
            delta: self.delta,
        }
    }

    /// `<namespace>:<suffix>:<encoded initial state>`.
    pub fn long_form_did(
        &self,
        params: &ProtocolParameters,
        namespace: &Namespace,
    ) -> ProtocolResult<String> {
        let suffix = self.unique_suffix(params)?;
        Ok(format!("{}:{}", namespace.did(&suffix), self.encode()?))
    }
}
