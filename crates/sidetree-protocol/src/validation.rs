//! Checks shared by ingress parsing and the resolver.

use serde::de::DeserializeOwned;
use sidetree_crypto::{canonicalize, hash_canonical, CompactJws, Multihash};
use sidetree_types::{Delta, Patch, PublicKeyJwk, SuffixData, UniqueSuffix};

use crate::error::{ProtocolError, ProtocolResult};
use crate::params::ProtocolParameters;

/// Require `value` to be a multihash under the generation's hash algorithm.
pub fn check_multihash(
    params: &ProtocolParameters,
    value: &str,
    what: &str,
) -> ProtocolResult<Multihash> {
    let mh = Multihash::decode(value)
        .map_err(|e| ProtocolError::Malformed(format!("{what}: {e}")))?;
    if mh.algorithm() != params.hash_algorithm {
        return Err(ProtocolError::Violation(format!(
            "{what} uses {} but the protocol requires {}",
            mh.algorithm(),
            params.hash_algorithm
        )));
    }
    Ok(mh)
}

/// Unique suffix of a create: the multihash of its canonical suffix data.
pub fn unique_suffix(
    params: &ProtocolParameters,
    suffix_data: &SuffixData,
) -> ProtocolResult<UniqueSuffix> {
    let encoded = hash_canonical(params.hash_algorithm, suffix_data)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    UniqueSuffix::new(encoded).map_err(|e| ProtocolError::Malformed(e.to_string()))
}

/// `true` if the canonical delta hashes to `expected` (under its algorithm).
pub fn delta_hash_matches(delta: &Delta, expected: &str) -> ProtocolResult<bool> {
    let expected = Multihash::decode(expected)
        .map_err(|e| ProtocolError::Malformed(format!("delta hash: {e}")))?;
    let bytes = canonicalize(delta).map_err(|e| ProtocolError::Malformed(e.to_string()))?;
    Ok(expected.matches(&bytes))
}

/// Bounds on a delta: size, allowed patch actions, key algorithms, and a
/// well-formed next commitment.
pub fn validate_delta(params: &ProtocolParameters, delta: &Delta) -> ProtocolResult<()> {
    let size = canonicalize(delta)
        .map_err(|e| ProtocolError::Malformed(e.to_string()))?
        .len();
    if size > params.max_delta_size {
        return Err(ProtocolError::TooLarge {
            what: "delta",
            size,
            limit: params.max_delta_size,
        });
    }
    check_multihash(params, &delta.update_commitment, "update commitment")?;

    for patch in &delta.patches {
        let action = patch.action();
        if !params.allows_patch(action) {
            return Err(ProtocolError::Violation(format!(
                "patch action {action} is not allowed"
            )));
        }
        if let Patch::AddPublicKeys { public_keys } = patch {
            if let Some(key) = public_keys
                .iter()
                .find(|k| !params.allows_key(&k.public_key_jwk.crv))
            {
                return Err(ProtocolError::Violation(format!(
                    "key {} uses disallowed curve {}",
                    key.id, key.public_key_jwk.crv
                )));
            }
        }
    }
    Ok(())
}

/// Parse `signed_data`, check its algorithm is allowed, and decode the payload.
pub fn open_signed<P: DeserializeOwned>(
    params: &ProtocolParameters,
    signed_data: &str,
) -> ProtocolResult<(CompactJws, P)> {
    let jws = CompactJws::parse(signed_data)
        .map_err(|e| ProtocolError::Malformed(format!("signed data: {e}")))?;
    if !params.allows_signature(jws.algorithm()) {
        return Err(ProtocolError::Violation(format!(
            "signature algorithm {} is not allowed",
            jws.algorithm()
        )));
    }
    let payload = jws
        .payload()
        .map_err(|e| ProtocolError::Malformed(format!("signed payload: {e}")))?;
    Ok((jws, payload))
}

/// Verify `jws` under `key`, which must use an allowed curve and match `reveal`.
pub fn verify_signed(
    params: &ProtocolParameters,
    jws: &CompactJws,
    key: &PublicKeyJwk,
    reveal: &str,
) -> ProtocolResult<()> {
    if !params.allows_key(&key.crv) {
        return Err(ProtocolError::Violation(format!(
            "signing key curve {} is not allowed",
            key.crv
        )));
    }
    let matches = sidetree_crypto::reveal_matches_key(reveal, key)
        .map_err(|e| ProtocolError::Malformed(format!("reveal value: {e}")))?;
    if !matches {
        return Err(ProtocolError::Unauthorized(
            "reveal value does not match the signing key".into(),
        ));
    }
    jws.verify(key)
        .map_err(|e| ProtocolError::Unauthorized(format!("signature: {e}")))
}
