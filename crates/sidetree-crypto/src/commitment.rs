//! Commitment chain derivation.
//!
//! The reveal value for a key is the multihash of its canonical JWK. The
//! commitment is the multihash of the reveal value's raw bytes, so revealing
//! a value proves knowledge of the preimage the previous operation committed to.

use sidetree_types::{HashAlgorithm, PublicKeyJwk};

use crate::encoding::canonicalize;
use crate::error::CryptoResult;
use crate::multihash::Multihash;

pub fn reveal_value(algorithm: HashAlgorithm, key: &PublicKeyJwk) -> CryptoResult<String> {
    Ok(Multihash::compute(algorithm, &canonicalize(key)?).encode())
}

pub fn commitment_from_reveal(reveal: &str) -> CryptoResult<String> {
    let reveal = Multihash::decode(reveal)?;
    Ok(Multihash::compute(reveal.algorithm(), &reveal.to_bytes()).encode())
}

pub fn commitment_for_key(algorithm: HashAlgorithm, key: &PublicKeyJwk) -> CryptoResult<String> {
    commitment_from_reveal(&reveal_value(algorithm, key)?)
}

/// `true` if `hash(reveal) == commitment` under the commitment's algorithm.
pub fn verify_commitment(reveal: &str, commitment: &str) -> CryptoResult<bool> {
    let commitment = Multihash::decode(commitment)?;
    let reveal = Multihash::decode(reveal)?;
    Ok(commitment.matches(&reveal.to_bytes()))
}

/// `true` if `reveal` is the reveal value of `key`.
pub fn reveal_matches_key(reveal: &str, key: &PublicKeyJwk) -> CryptoResult<bool> {
    let reveal = Multihash::decode(reveal)?;
    Ok(reveal.matches(&canonicalize(key)?))
}
