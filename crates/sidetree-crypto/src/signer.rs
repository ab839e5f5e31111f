use serde::{Deserialize, Serialize};
use sidetree_types::PublicKeyJwk;

use crate::encoding::{base64url_decode, base64url_encode};
use crate::error::{CryptoError, CryptoResult};
use crate::jws::CompactJws;

pub const OKP_KEY_TYPE: &str = "OKP";
pub const ED25519_CURVE: &str = "Ed25519";

/// Ed25519 signing key (private).
pub struct SigningKey(ed25519_dalek::SigningKey);

/// Ed25519 verifying key (public).
#[derive(Clone, PartialEq, Eq)]
pub struct VerifyingKey(ed25519_dalek::VerifyingKey);

/// Ed25519 signature.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(#[serde(with = "signature_serde")] ed25519_dalek::Signature);

impl SigningKey {
    /// Generate a new random signing key.
    pub fn generate() -> Self {
        let mut csprng = rand::thread_rng();
        Self(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Create from raw 32-byte secret.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(ed25519_dalek::SigningKey::from_bytes(&bytes))
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey(self.0.verifying_key())
    }

    /// The public half in JWK form, as embedded in signed payloads.
    pub fn public_jwk(&self) -> PublicKeyJwk {
        self.verifying_key().to_jwk()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        use ed25519_dalek::Signer;
        Signature(self.0.sign(message))
    }

    /// Sign `payload` as a compact JWS with an `EdDSA` header.
    pub fn sign_compact<T: Serialize>(&self, payload: &T) -> CryptoResult<String> {
        CompactJws::sign(self, payload)
    }
}

impl VerifyingKey {
    pub fn verify(&self, message: &[u8], signature: &Signature) -> CryptoResult<()> {
        use ed25519_dalek::Verifier;
        self.0
            .verify(message, &signature.0)
            .map_err(|_| CryptoError::InvalidSignature)
    }

    pub fn as_bytes(&self) -> [u8; 32] {
        self.0.to_bytes()
    }

    pub fn from_bytes(bytes: [u8; 32]) -> CryptoResult<Self> {
        let key =
            ed25519_dalek::VerifyingKey::from_bytes(&bytes).map_err(|_| CryptoError::InvalidKey)?;
        Ok(Self(key))
    }

    pub fn to_jwk(&self) -> PublicKeyJwk {
        PublicKeyJwk {
            kty: OKP_KEY_TYPE.to_string(),
            crv: ED25519_CURVE.to_string(),
            x: base64url_encode(self.0.to_bytes()),
            y: None,
        }
    }

    /// Parse an `OKP`/`Ed25519` JWK. Other curves are unsupported.
    pub fn from_jwk(jwk: &PublicKeyJwk) -> CryptoResult<Self> {
        if jwk.kty != OKP_KEY_TYPE || jwk.crv != ED25519_CURVE {
            return Err(CryptoError::UnsupportedAlgorithm(format!(
                "{}/{}",
                jwk.kty, jwk.crv
            )));
        }
        if jwk.y.is_some() {
            return Err(CryptoError::InvalidKey);
        }
        let bytes: [u8; 32] = base64url_decode(&jwk.x)?
            .try_into()
            .map_err(|_| CryptoError::InvalidKey)?;
        Self::from_bytes(bytes)
    }
}

impl Signature {
    pub fn to_bytes(&self) -> [u8; 64] {
        self.0.to_bytes()
    }

    pub fn from_slice(bytes: &[u8]) -> CryptoResult<Self> {
        let arr: [u8; 64] = bytes.try_into().map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(ed25519_dalek::Signature::from_bytes(&arr)))
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningKey(<redacted>)")
    }
}

impl std::fmt::Debug for VerifyingKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VerifyingKey({})", hex::encode(self.0.to_bytes()))
    }
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Signature({}...)", hex::encode(&self.0.to_bytes()[..8]))
    }
}

mod signature_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(sig: &ed25519_dalek::Signature, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&sig.to_bytes())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ed25519_dalek::Signature, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bytes: Vec<u8> = Vec::deserialize(deserializer)?;
        let arr: [u8; 64] = bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("expected 64-byte signature"))?;
        Ok(ed25519_dalek::Signature::from_bytes(&arr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify() {
        let sk = SigningKey::generate();
        let sig = sk.sign(b"hello world");
        assert!(sk.verifying_key().verify(b"hello world", &sig).is_ok());
    }

    #[test]
    fn verify_fails_with_wrong_key() {
        let sig = SigningKey::generate().sign(b"message");
        let other = SigningKey::generate().verifying_key();
        assert_eq!(other.verify(b"message", &sig), Err(CryptoError::InvalidSignature));
    }

    #[test]
    fn jwk_round_trip() {
        let sk = SigningKey::from_bytes([7u8; 32]);
        let jwk = sk.public_jwk();
        assert_eq!(jwk.kty, "OKP");
        assert_eq!(jwk.crv, "Ed25519");
        let vk = VerifyingKey::from_jwk(&jwk).unwrap();
        assert_eq!(vk, sk.verifying_key());
    }

    #[test]
    fn jwk_rejects_other_curves() {
        let mut jwk = SigningKey::generate().public_jwk();
        jwk.crv = "secp256k1".into();
        assert!(matches!(
            VerifyingKey::from_jwk(&jwk),
            Err(CryptoError::UnsupportedAlgorithm(_))
        ));
    }

    #[test]
    fn jwk_rejects_short_x() {
        let mut jwk = SigningKey::generate().public_jwk();
        jwk.x = base64url_encode([1u8; 16]);
        assert_eq!(VerifyingKey::from_jwk(&jwk), Err(CryptoError::InvalidKey));
    }

    #[test]
    fn debug_redacts_secret() {
        let sk = SigningKey::generate();
        assert_eq!(format!("{sk:?}"), "SigningKey(<redacted>)");
    }
}
