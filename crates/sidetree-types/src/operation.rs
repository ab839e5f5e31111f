use std::fmt;

use serde::{Deserialize, Serialize};

use crate::address::CasAddress;
use crate::id::{Namespace, UniqueSuffix};
use crate::patch::{Patch, PublicKeyJwk};
use crate::position::TxnPosition;

/// Protocol-level operation tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    Create,
    Update,
    Recover,
    Deactivate,
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Recover => "recover",
            Self::Deactivate => "deactivate",
        };
        f.write_str(s)
    }
}

/// Create data whose hash is the document's unique suffix.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuffixData {
    pub delta_hash: String,
    pub recovery_commitment: String,
}

/// Patch set plus the commitment that constrains the next update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub patches: Vec<Patch>,
    pub update_commitment: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSignedPayload {
    pub update_key: PublicKeyJwk,
    pub delta_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoverSignedPayload {
    pub recovery_commitment: String,
    pub recovery_key: PublicKeyJwk,
    pub delta_hash: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeactivateSignedPayload {
    pub did_suffix: UniqueSuffix,
    pub recovery_key: PublicKeyJwk,
}

/// A client-submitted operation, as carried on the wire and in artifacts.
///
/// `signed_data` is a compact JWS over the matching `*SignedPayload`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OperationRequest {
    Create {
        #[serde(rename = "suffixData")]
        suffix_data: SuffixData,
        delta: Delta,
    },
    Update {
        #[serde(rename = "didSuffix")]
        did_suffix: UniqueSuffix,
        #[serde(rename = "revealValue")]
        reveal_value: String,
        delta: Delta,
        #[serde(rename = "signedData")]
        signed_data: String,
    },
    Recover {
        #[serde(rename = "didSuffix")]
        did_suffix: UniqueSuffix,
        #[serde(rename = "revealValue")]
        reveal_value: String,
        delta: Delta,
        #[serde(rename = "signedData")]
        signed_data: String,
    },
    Deactivate {
        #[serde(rename = "didSuffix")]
        did_suffix: UniqueSuffix,
        #[serde(rename = "revealValue")]
        reveal_value: String,
        #[serde(rename = "signedData")]
        signed_data: String,
    },
}

impl OperationRequest {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::Create { .. } => OperationType::Create,
            Self::Update { .. } => OperationType::Update,
            Self::Recover { .. } => OperationType::Recover,
            Self::Deactivate { .. } => OperationType::Deactivate,
        }
    }

    /// The targeted suffix; `None` for creates, whose suffix is derived.
    pub fn did_suffix(&self) -> Option<&UniqueSuffix> {
        match self {
            Self::Create { .. } => None,
            Self::Update { did_suffix, .. }
            | Self::Recover { did_suffix, .. }
            | Self::Deactivate { did_suffix, .. } => Some(did_suffix),
        }
    }

    pub fn reveal_value(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Update { reveal_value, .. }
            | Self::Recover { reveal_value, .. }
            | Self::Deactivate { reveal_value, .. } => Some(reveal_value),
        }
    }

    pub fn delta(&self) -> Option<&Delta> {
        match self {
            Self::Create { delta, .. } | Self::Update { delta, .. } | Self::Recover { delta, .. } => {
                Some(delta)
            }
            Self::Deactivate { .. } => None,
        }
    }

    pub fn signed_data(&self) -> Option<&str> {
        match self {
            Self::Create { .. } => None,
            Self::Update { signed_data, .. }
            | Self::Recover { signed_data, .. }
            | Self::Deactivate { signed_data, .. } => Some(signed_data),
        }
    }
}

/// An operation sealed into the ledger by an anchor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub namespace: Namespace,
    pub unique_suffix: UniqueSuffix,
    pub position: TxnPosition,
    /// Generation time of the protocol the anchor was parsed under.
    pub protocol_generation: u64,
    /// Core index address of the anchor that carried this operation.
    pub anchor_origin: CasAddress,
    pub request: OperationRequest,
}

impl Operation {
    pub fn operation_type(&self) -> OperationType {
        self.request.operation_type()
    }

    pub fn transaction_time(&self) -> u64 {
        self.position.transaction_time
    }

    pub fn transaction_number(&self) -> u32 {
        self.position.transaction_number
    }

    pub fn operation_index(&self) -> u32 {
        self.position.operation_index
    }

    pub fn reveal_value(&self) -> Option<&str> {
        self.request.reveal_value()
    }

    pub fn delta(&self) -> Option<&Delta> {
        self.request.delta()
    }

    pub fn signed_data(&self) -> Option<&str> {
        self.request.signed_data()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn update_json() -> serde_json::Value {
        json!({
            "type": "update",
            "didSuffix": "EiAsuffix",
            "revealValue": "EiAreveal",
            "delta": {
                "patches": [{"action": "remove-services", "ids": ["s"]}],
                "updateCommitment": "EiAnext"
            },
            "signedData": "h.p.s"
        })
    }

    #[test]
    fn request_parses_type_tag() {
        let req: OperationRequest = serde_json::from_value(update_json()).unwrap();
        assert_eq!(req.operation_type(), OperationType::Update);
        assert_eq!(req.did_suffix().unwrap().as_str(), "EiAsuffix");
        assert_eq!(req.reveal_value(), Some("EiAreveal"));
        assert_eq!(req.delta().unwrap().update_commitment, "EiAnext");
        assert_eq!(req.signed_data(), Some("h.p.s"));
    }

    #[test]
    fn create_has_no_target() {
        let req: OperationRequest = serde_json::from_value(json!({
            "type": "create",
            "suffixData": {"deltaHash": "EiAd", "recoveryCommitment": "EiAr"},
            "delta": {"patches": [], "updateCommitment": "EiAu"}
        }))
        .unwrap();
        assert_eq!(req.operation_type(), OperationType::Create);
        assert!(req.did_suffix().is_none());
        assert!(req.reveal_value().is_none());
    }

    #[test]
    fn deactivate_has_no_delta() {
        let req: OperationRequest = serde_json::from_value(json!({
            "type": "deactivate",
            "didSuffix": "EiAs",
            "revealValue": "EiAr",
            "signedData": "a.b.c"
        }))
        .unwrap();
        assert!(req.delta().is_none());
    }

    #[test]
    fn unknown_type_rejected() {
        let mut v = update_json();
        v["type"] = json!("transfer");
        assert!(serde_json::from_value::<OperationRequest>(v).is_err());
    }

    #[test]
    fn operation_type_display() {
        assert_eq!(OperationType::Recover.to_string(), "recover");
        assert_eq!(
            serde_json::to_string(&OperationType::Deactivate).unwrap(),
            "\"deactivate\""
        );
    }
}
