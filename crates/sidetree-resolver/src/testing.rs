//! Shared fixtures for unit tests.

use serde_json::{json, Value};
use sidetree_crypto::{commitment_for_key, SigningKey};
use sidetree_protocol::{
    DocumentKeys, OperationParser, ProtocolParameters, ProtocolRegistry, RequestBuilder,
};
use sidetree_types::{
    CasAddress, HashAlgorithm, Namespace, Operation, OperationRequest, Patch, TxnPosition,
    UniqueSuffix,
};

pub fn ns() -> Namespace {
    Namespace::new("did:sidetree").unwrap()
}

pub fn registry() -> ProtocolRegistry {
    ProtocolRegistry::new(ns(), vec![ProtocolParameters::default()]).unwrap()
}

pub fn services(tag: &str) -> Value {
    json!({"services": [{"id": tag, "type": "Tag", "serviceEndpoint": "https://example.com"}]})
}

pub fn patches(tag: &str) -> Vec<Patch> {
    vec![Patch::Replace {
        document: services(tag),
    }]
}

/// Wrap a request as if anchored at `position`.
pub fn anchored(request: OperationRequest, position: TxnPosition) -> Operation {
    let params = ProtocolParameters::default();
    let parsed = OperationParser::new(&params).validate(request).unwrap();
    Operation {
        namespace: ns(),
        unique_suffix: parsed.unique_suffix,
        position,
        protocol_generation: 0,
        anchor_origin: CasAddress::new("EiAanchor").unwrap(),
        request: parsed.request,
    }
}

/// A document with its current keys; each builder call rotates them.
pub struct TestDoc {
    pub keys: DocumentKeys,
    pub suffix: UniqueSuffix,
    pub create: OperationRequest,
    /// Update keys already consumed, oldest first.
    pub retired: Vec<SigningKey>,
}

impl TestDoc {
    pub fn new() -> Self {
        let keys = DocumentKeys::generate();
        let create = RequestBuilder::default().create(&keys, patches("create")).unwrap();
        let suffix = anchored(create.clone(), TxnPosition::new(0, 0, 0)).unique_suffix;
        Self {
            keys,
            suffix,
            create,
            retired: Vec::new(),
        }
    }

    pub fn create_at(&self, t: u64) -> Operation {
        anchored(self.create.clone(), TxnPosition::new(t, 0, 0))
    }

    pub fn update_at(&mut self, t: u64, tag: &str) -> Operation {
        let next = SigningKey::generate();
        let request = RequestBuilder::default()
            .update(&self.suffix, &self.keys.update, &next, patches(tag))
            .unwrap();
        self.retired.push(std::mem::replace(&mut self.keys.update, next));
        anchored(request, TxnPosition::new(t, 0, 0))
    }

    pub fn recover_at(&mut self, t: u64, tag: &str) -> Operation {
        let next = DocumentKeys::generate();
        let request = RequestBuilder::default()
            .recover(&self.suffix, &self.keys.recovery, &next, patches(tag))
            .unwrap();
        let old = std::mem::replace(&mut self.keys, next);
        self.retired.push(old.update);
        anchored(request, TxnPosition::new(t, 0, 0))
    }

    pub fn deactivate_at(&self, t: u64) -> Operation {
        let request = RequestBuilder::default()
            .deactivate(&self.suffix, &self.keys.recovery)
            .unwrap();
        anchored(request, TxnPosition::new(t, 0, 0))
    }

    pub fn update_commitment(&self) -> String {
        commitment_for_key(HashAlgorithm::Sha2_256, &self.keys.update.public_jwk()).unwrap()
    }

    pub fn recovery_commitment(&self) -> String {
        commitment_for_key(HashAlgorithm::Sha2_256, &self.keys.recovery.public_jwk()).unwrap()
    }
}
