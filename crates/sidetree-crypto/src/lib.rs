//! Cryptographic primitives for the Sidetree pipeline.
//!
//! Provides multihash computation (SHA2-256 and BLAKE3), base64url encoding,
//! canonical JSON hashing, commitment/reveal derivation, and Ed25519 signing
//! with compact JWS envelopes for operation signed data.
//!
//! All crypto operations wrap established libraries.

pub mod commitment;
pub mod encoding;
pub mod error;
pub mod jws;
pub mod multihash;
pub mod signer;

pub use commitment::{
    commitment_for_key, commitment_from_reveal, reveal_matches_key, reveal_value,
    verify_commitment,
};
pub use encoding::{base64url_decode, base64url_encode, canonicalize};
pub use error::{CryptoError, CryptoResult};
pub use jws::{CompactJws, JwsHeader, EDDSA};
pub use multihash::{hash_canonical, hash_encoded, Multihash};
pub use signer::{Signature, SigningKey, VerifyingKey, ED25519_CURVE, OKP_KEY_TYPE};
