use std::fmt;

use serde::Serialize;
use sha2::{Digest, Sha256};
use sidetree_types::HashAlgorithm;

use crate::encoding::{base64url_decode, base64url_encode, canonicalize};
use crate::error::{CryptoError, CryptoResult};

/// Self-describing digest: `varint(code) || varint(len) || digest`.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Multihash {
    algorithm: HashAlgorithm,
    digest: Vec<u8>,
}

impl Multihash {
    pub fn compute(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let digest = match algorithm {
            HashAlgorithm::Sha2_256 => Sha256::digest(data).to_vec(),
            HashAlgorithm::Blake3 => blake3::hash(data).as_bytes().to_vec(),
        };
        Self { algorithm, digest }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.digest.len() + 2);
        encode_varint(&mut buf, self.algorithm.code());
        encode_varint(&mut buf, self.digest.len() as u64);
        buf.extend_from_slice(&self.digest);
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> CryptoResult<Self> {
        let (code, used) = decode_varint(bytes)?;
        let algorithm = HashAlgorithm::from_code(code).map_err(|_| CryptoError::UnknownHash(code))?;
        let (len, used_len) = decode_varint(&bytes[used..])?;
        let digest = &bytes[used + used_len..];
        let expected = algorithm.digest_len();
        if len as usize != expected || digest.len() != expected {
            return Err(CryptoError::DigestLength {
                expected,
                actual: digest.len(),
            });
        }
        Ok(Self {
            algorithm,
            digest: digest.to_vec(),
        })
    }

    /// Base64url string form, as used for suffixes, commitments, and addresses.
    pub fn encode(&self) -> String {
        base64url_encode(self.to_bytes())
    }

    pub fn decode(encoded: &str) -> CryptoResult<Self> {
        Self::from_bytes(&base64url_decode(encoded)?)
    }

    /// `true` if `data` hashes to this multihash under its own algorithm.
    pub fn matches(&self, data: &[u8]) -> bool {
        Self::compute(self.algorithm, data) == *self
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({}:{})", self.algorithm, hex::encode(&self.digest[..4]))
    }
}

/// Hash `data` and return the base64url multihash string.
pub fn hash_encoded(algorithm: HashAlgorithm, data: &[u8]) -> String {
    Multihash::compute(algorithm, data).encode()
}

/// Hash the canonical JSON form of `value`.
pub fn hash_canonical<T: Serialize + ?Sized>(
    algorithm: HashAlgorithm,
    value: &T,
) -> CryptoResult<String> {
    Ok(hash_encoded(algorithm, &canonicalize(value)?))
}

fn encode_varint(buf: &mut Vec<u8>, mut value: u64) {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value > 0 {
            byte |= 0x80;
        }
        buf.push(byte);
        if value == 0 {
            break;
        }
    }
}

fn decode_varint(data: &[u8]) -> CryptoResult<(u64, usize)> {
    let mut value: u64 = 0;
    let mut shift = 0;
    for (i, &byte) in data.iter().enumerate() {
        value |= ((byte & 0x7F) as u64) << shift;
        shift += 7;
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
        if shift >= 64 {
            return Err(CryptoError::InvalidMultihash("varint overflow"));
        }
    }
    Err(CryptoError::InvalidMultihash("truncated varint"))
}
