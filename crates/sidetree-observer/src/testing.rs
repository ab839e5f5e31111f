//! Shared fixtures for unit tests.

use serde_json::json;
use sidetree_batch::{ArtifactBuilder, PendingOperation, QueuedOperation};
use sidetree_cas::CasClient;
use sidetree_crypto::SigningKey;
use sidetree_protocol::{
    DocumentKeys, OperationParser, ProtocolParameters, ProtocolRegistry, RequestBuilder,
};
use sidetree_types::{AnchorString, Namespace, OperationRequest, Patch, UniqueSuffix};

pub fn ns() -> Namespace {
    Namespace::new("did:sidetree").unwrap()
}

pub fn registry() -> ProtocolRegistry {
    ProtocolRegistry::new(ns(), vec![ProtocolParameters::default()]).unwrap()
}

fn patches(tag: &str) -> Vec<Patch> {
    vec![Patch::Replace {
        document: json!({"services": [{"id": tag, "type": "Tag", "serviceEndpoint": "https://example.com"}]}),
    }]
}

fn pending(request: OperationRequest) -> PendingOperation {
    let params = ProtocolParameters::default();
    let parsed = OperationParser::new(&params).validate(request).unwrap();
    PendingOperation::new(parsed.unique_suffix, parsed.request)
}

/// A document with its current keys.
pub struct Doc {
    pub keys: DocumentKeys,
    pub suffix: UniqueSuffix,
    pub create: PendingOperation,
}

impl Doc {
    pub fn new() -> Self {
        let keys = DocumentKeys::generate();
        let create = pending(RequestBuilder::default().create(&keys, patches("c")).unwrap());
        Self {
            keys,
            suffix: create.unique_suffix.clone(),
            create,
        }
    }

    /// Valid update; rotates the update key.
    pub fn update(&mut self) -> PendingOperation {
        let next = SigningKey::generate();
        let op = pending(
            RequestBuilder::default()
                .update(&self.suffix, &self.keys.update, &next, patches("u"))
                .unwrap(),
        );
        self.keys.update = next;
        op
    }

    pub fn deactivate(&self) -> PendingOperation {
        pending(
            RequestBuilder::default()
                .deactivate(&self.suffix, &self.keys.recovery)
                .unwrap(),
        )
    }

    /// Well-formed deactivate signed by a key that holds no commitment.
    pub fn forged_deactivate(&self) -> PendingOperation {
        pending(
            RequestBuilder::default()
                .deactivate(&self.suffix, &SigningKey::generate())
                .unwrap(),
        )
    }
}

/// Upload `ops` as one batch and return its anchor.
pub async fn anchor_batch(cas: &dyn CasClient, ops: Vec<PendingOperation>) -> AnchorString {
    let params = ProtocolParameters::default();
    let queued = ops
        .into_iter()
        .enumerate()
        .map(|(i, operation)| QueuedOperation {
            seq: i as u64,
            operation,
        })
        .collect();
    let builder = ArtifactBuilder::new(&params, cas);
    let parts = builder.partition(queued);
    assert!(parts.dropped.is_empty());
    assert!(parts.deferred.is_empty());
    builder.upload(&parts).await.unwrap().anchor
}
