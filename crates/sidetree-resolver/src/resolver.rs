use std::sync::Arc;

use serde_json::Value;
use sidetree_protocol::{InitialState, OperationParser, ProtocolRegistry};
use sidetree_store::OperationStore;
use sidetree_types::{Did, Namespace, OperationRequest, UniqueSuffix};
use tracing::debug;

use crate::applier::{DocumentState, OperationApplier};
use crate::document::{
    DidDocumentMetadata, DocumentMetadata, DocumentType, MethodMetadata, ResolutionResult,
};
use crate::error::{ResolveError, ResolveResult};

/// Resolves identifiers of one namespace against the operation store.
///
/// Runs on the caller's thread; the only I/O is the store read.
#[derive(Clone)]
pub struct Resolver {
    protocols: Arc<ProtocolRegistry>,
    store: Arc<dyn OperationStore>,
    document_type: DocumentType,
}

impl Resolver {
    pub fn new(
        protocols: Arc<ProtocolRegistry>,
        store: Arc<dyn OperationStore>,
        document_type: DocumentType,
    ) -> Self {
        Self {
            protocols,
            store,
            document_type,
        }
    }

    pub fn namespace(&self) -> &Namespace {
        self.protocols.namespace()
    }

    pub fn document_type(&self) -> DocumentType {
        self.document_type
    }

    /// Resolve a bare suffix, a short-form DID, or a long-form DID.
    pub fn resolve(&self, input: &str) -> ResolveResult<ResolutionResult> {
        let did = Did::parse(self.namespace(), input)
            .map_err(|e| ResolveError::Malformed(e.to_string()))?;
        match &did.initial_state {
            None => self.resolve_suffix(&did.suffix),
            Some(encoded) => self.resolve_long_form(&did, encoded),
        }
    }

    /// Replay the published log of `suffix`.
    pub fn resolve_suffix(&self, suffix: &UniqueSuffix) -> ResolveResult<ResolutionResult> {
        let log = self.store.get(self.namespace(), suffix)?;
        if log.is_empty() {
            return Err(ResolveError::NotFound(self.namespace().did(suffix)));
        }
        let state = OperationApplier::new(&self.protocols).replay(&log)?;
        debug!(
            namespace = %self.namespace(),
            suffix = %suffix,
            ops = log.len(),
            deactivated = state.is_deactivated(),
            "document resolved"
        );
        let id = self.namespace().did(suffix);
        Ok(self.render(&id, Some(id.clone()), &state))
    }

    /// Published state if the suffix is anchored, otherwise the state
    /// carried by the identifier itself.
    fn resolve_long_form(&self, did: &Did, encoded: &str) -> ResolveResult<ResolutionResult> {
        let initial = InitialState::decode(encoded)?;
        let params = self.protocols.current();
        if initial.unique_suffix(params)? != did.suffix {
            return Err(ResolveError::Malformed(format!(
                "initial state of {did} does not hash to its suffix"
            )));
        }
        match self.resolve_suffix(&did.suffix) {
            Err(ResolveError::NotFound(_)) => {}
            published => return published,
        }

        let parsed = OperationParser::new(params).validate(initial.into_request())?;
        let OperationRequest::Create { suffix_data, delta } = &parsed.request else {
            return Err(ResolveError::Malformed("initial state is not a create".into()));
        };
        let state = OperationApplier::new(&self.protocols).initial(params, suffix_data, delta, None);
        Ok(self.render(&did.to_string(), None, &state))
    }

    fn render(&self, id: &str, canonical_id: Option<String>, state: &DocumentState) -> ResolutionResult {
        let document = match (self.document_type, &state.document) {
            (DocumentType::Did, Value::Object(map)) => {
                let mut map = map.clone();
                map.insert("id".into(), Value::String(id.to_string()));
                Value::Object(map)
            }
            (_, document) => document.clone(),
        };
        ResolutionResult {
            document,
            document_metadata: DocumentMetadata {
                method: MethodMetadata {
                    published: state.created.is_some(),
                    canonical_id,
                },
                created: state.created.map(|p| p.transaction_time),
                updated: state.updated.map(|p| p.transaction_time),
                deactivated: state.is_deactivated(),
            },
            did_document_metadata: DidDocumentMetadata {
                update_commitment: state.update_commitment.clone(),
                recovery_commitment: state.recovery_commitment.clone(),
            },
        }
    }
}
