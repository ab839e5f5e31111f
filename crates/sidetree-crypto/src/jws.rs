use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sidetree_types::PublicKeyJwk;

use crate::encoding::{base64url_decode, base64url_encode, canonicalize};
use crate::error::{CryptoError, CryptoResult};
use crate::signer::{Signature, SigningKey, VerifyingKey};

/// JWS algorithm name for Ed25519 signatures.
pub const EDDSA: &str = "EdDSA";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwsHeader {
    pub alg: String,
}

/// Parsed `<header>.<payload>.<signature>` envelope carried in `signedData`.
#[derive(Clone, Debug)]
pub struct CompactJws {
    header: JwsHeader,
    payload: Vec<u8>,
    signature: Vec<u8>,
    signing_input: String,
}

impl CompactJws {
    pub fn sign<T: Serialize>(key: &SigningKey, payload: &T) -> CryptoResult<String> {
        let header = canonicalize(&JwsHeader {
            alg: EDDSA.to_string(),
        })?;
        let signing_input = format!(
            "{}.{}",
            base64url_encode(header),
            base64url_encode(canonicalize(payload)?)
        );
        let signature = key.sign(signing_input.as_bytes());
        Ok(format!(
            "{signing_input}.{}",
            base64url_encode(signature.to_bytes())
        ))
    }

    pub fn parse(compact: &str) -> CryptoResult<Self> {
        let mut parts = compact.split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(CryptoError::MalformedJws("expected three segments"));
        };

        let header: JwsHeader = serde_json::from_slice(&base64url_decode(header_b64)?)
            .map_err(|_| CryptoError::MalformedJws("header is not JSON"))?;
        let payload = base64url_decode(payload_b64)?;
        let signature = base64url_decode(signature_b64)?;

        Ok(Self {
            header,
            payload,
            signature,
            signing_input: format!("{header_b64}.{payload_b64}"),
        })
    }

    pub fn algorithm(&self) -> &str {
        &self.header.alg
    }

    pub fn payload<T: DeserializeOwned>(&self) -> CryptoResult<T> {
        serde_json::from_slice(&self.payload).map_err(|e| CryptoError::Serialization(e.to_string()))
    }

    /// Verify the envelope signature with `jwk`.
    pub fn verify(&self, jwk: &PublicKeyJwk) -> CryptoResult<()> {
        if self.header.alg != EDDSA {
            return Err(CryptoError::UnsupportedAlgorithm(self.header.alg.clone()));
        }
        let key = VerifyingKey::from_jwk(jwk)?;
        let signature = Signature::from_slice(&self.signature)?;
        key.verify(self.signing_input.as_bytes(), &signature)
    }
}
