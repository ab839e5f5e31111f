use sidetree_crypto::{commitment_for_key, hash_canonical, reveal_value, CryptoError, SigningKey};
use sidetree_types::{
    DeactivateSignedPayload, Delta, HashAlgorithm, OperationRequest, Patch, RecoverSignedPayload,
    SuffixData, UniqueSuffix, UpdateSignedPayload,
};

use crate::error::{ProtocolError, ProtocolResult};

/// Update and recovery key pair controlling one document.
pub struct DocumentKeys {
    pub update: SigningKey,
    pub recovery: SigningKey,
}

impl DocumentKeys {
    pub fn generate() -> Self {
        Self {
            update: SigningKey::generate(),
            recovery: SigningKey::generate(),
        }
    }
}

fn crypto(e: CryptoError) -> ProtocolError {
    ProtocolError::Malformed(e.to_string())
}

/// Builds signed operation requests the way a wallet would.
///
/// Each request commits to the *next* key: the caller keeps the key passed
/// as `next_*` to authorize the following operation.
#[derive(Clone, Copy, Debug)]
pub struct RequestBuilder {
    algorithm: HashAlgorithm,
}

impl Default for RequestBuilder {
    fn default() -> Self {
        Self::new(HashAlgorithm::Sha2_256)
    }
}

impl RequestBuilder {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    fn delta(&self, patches: Vec<Patch>, next_update: &SigningKey) -> ProtocolResult<Delta> {
        Ok(Delta {
            patches,
            update_commitment: commitment_for_key(self.algorithm, &next_update.public_jwk())
                .map_err(crypto)?,
        })
    }

    pub fn create(&self, keys: &DocumentKeys, patches: Vec<Patch>) -> ProtocolResult<OperationRequest> {
        let delta = self.delta(patches, &keys.update)?;
        let suffix_data = SuffixData {
            delta_hash: hash_canonical(self.algorithm, &delta).map_err(crypto)?,
            recovery_commitment: commitment_for_key(self.algorithm, &keys.recovery.public_jwk())
                .map_err(crypto)?,
        };
        Ok(OperationRequest::Create { suffix_data, delta })
    }

    pub fn update(
        &self,
        suffix: &UniqueSuffix,
        current: &SigningKey,
        next_update: &SigningKey,
        patches: Vec<Patch>,
    ) -> ProtocolResult<OperationRequest> {
        let delta = self.delta(patches, next_update)?;
        let signed_data = current
            .sign_compact(&UpdateSignedPayload {
                update_key: current.public_jwk(),
                delta_hash: hash_canonical(self.algorithm, &delta).map_err(crypto)?,
            })
            .map_err(crypto)?;
        Ok(OperationRequest::Update {
            did_suffix: suffix.clone(),
            reveal_value: reveal_value(self.algorithm, &current.public_jwk()).map_err(crypto)?,
            delta,
            signed_data,
        })
    }

    pub fn recover(
        &self,
        suffix: &UniqueSuffix,
        current_recovery: &SigningKey,
        next: &DocumentKeys,
        patches: Vec<Patch>,
    ) -> ProtocolResult<OperationRequest> {
        let delta = self.delta(patches, &next.update)?;
        let signed_data = current_recovery
            .sign_compact(&RecoverSignedPayload {
                recovery_commitment: commitment_for_key(
                    self.algorithm,
                    &next.recovery.public_jwk(),
                )
                .map_err(crypto)?,
                recovery_key: current_recovery.public_jwk(),
                delta_hash: hash_canonical(self.algorithm, &delta).map_err(crypto)?,
            })
            .map_err(crypto)?;
        Ok(OperationRequest::Recover {
            did_suffix: suffix.clone(),
            reveal_value: reveal_value(self.algorithm, &current_recovery.public_jwk())
                .map_err(crypto)?,
            delta,
            signed_data,
        })
    }

    pub fn deactivate(
        &self,
        suffix: &UniqueSuffix,
        current_recovery: &SigningKey,
    ) -> ProtocolResult<OperationRequest> {
        let signed_data = current_recovery
            .sign_compact(&DeactivateSignedPayload {
                did_suffix: suffix.clone(),
                recovery_key: current_recovery.public_jwk(),
            })
            .map_err(crypto)?;
        Ok(OperationRequest::Deactivate {
            did_suffix: suffix.clone(),
            reveal_value: reveal_value(self.algorithm, &current_recovery.public_jwk())
                .map_err(crypto)?,
            signed_data,
        })
    }
}
