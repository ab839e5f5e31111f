use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;

/// Public key in JSON Web Key form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyJwk {
    pub kty: String,
    pub crv: String,
    pub x: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// A verification method entry added to a DID document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub key_type: String,
    #[serde(rename = "publicKeyJwk")]
    pub public_key_jwk: PublicKeyJwk,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub purposes: Vec<String>,
}

/// A service endpoint entry added to a DID document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ServiceEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub service_type: String,
    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: Value,
}

/// One RFC 6902 operation. `move` and `copy` are not accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum JsonPatchOp {
    Add { path: String, value: Value },
    Remove { path: String },
    Replace { path: String, value: Value },
    Test { path: String, value: Value },
}

/// A document patch carried in an operation delta.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Patch {
    Replace {
        document: Value,
    },
    AddPublicKeys {
        #[serde(rename = "publicKeys")]
        public_keys: Vec<PublicKeyEntry>,
    },
    RemovePublicKeys {
        ids: Vec<String>,
    },
    AddServices {
        services: Vec<ServiceEntry>,
    },
    RemoveServices {
        ids: Vec<String>,
    },
    IetfJsonPatch {
        patches: Vec<JsonPatchOp>,
    },
}

impl Patch {
    pub fn action(&self) -> PatchAction {
        match self {
            Self::Replace { .. } => PatchAction::Replace,
            Self::AddPublicKeys { .. } => PatchAction::AddPublicKeys,
            Self::RemovePublicKeys { .. } => PatchAction::RemovePublicKeys,
            Self::AddServices { .. } => PatchAction::AddServices,
            Self::RemoveServices { .. } => PatchAction::RemoveServices,
            Self::IetfJsonPatch { .. } => PatchAction::IetfJsonPatch,
        }
    }
}

/// Patch action tag, used by protocol parameters to allow-list patches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PatchAction {
    Replace,
    AddPublicKeys,
    RemovePublicKeys,
    AddServices,
    RemoveServices,
    IetfJsonPatch,
}

impl PatchAction {
    pub const ALL: [PatchAction; 6] = [
        Self::Replace,
        Self::AddPublicKeys,
        Self::RemovePublicKeys,
        Self::AddServices,
        Self::RemoveServices,
        Self::IetfJsonPatch,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::AddPublicKeys => "add-public-keys",
            Self::RemovePublicKeys => "remove-public-keys",
            Self::AddServices => "add-services",
            Self::RemoveServices => "remove-services",
            Self::IetfJsonPatch => "ietf-json-patch",
        }
    }
}

impl fmt::Display for PatchAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PatchAction {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| TypeError::UnknownPatchAction(s.to_string()))
    }
}
