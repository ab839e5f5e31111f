use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the composed document is presented to callers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocumentType {
    /// DID document; gains an `id` of the resolved identifier.
    #[default]
    Did,
    /// File index document; returned as composed.
    FileIndex,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodMetadata {
    /// `false` for a long-form DID resolved from its embedded initial state.
    pub published: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical_id: Option<String>,
}

/// Transaction times are block numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub method: MethodMetadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated: Option<u64>,
    pub deactivated: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DidDocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_commitment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_commitment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub document: Value,
    pub document_metadata: DocumentMetadata,
    pub did_document_metadata: DidDocumentMetadata,
}

impl ResolutionResult {
    pub fn is_deactivated(&self) -> bool {
        self.document_metadata.deactivated
    }

    pub fn is_published(&self) -> bool {
        self.document_metadata.method.published
    }
}
