use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::Serialize;

use crate::error::{CryptoError, CryptoResult};

pub fn base64url_encode(data: impl AsRef<[u8]>) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

pub fn base64url_decode(encoded: &str) -> CryptoResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| CryptoError::InvalidEncoding(e.to_string()))
}

/// Canonical JSON bytes of a value: object keys sorted, no whitespace.
///
/// Routing through `serde_json::Value` sorts keys, so two structurally equal
/// values always hash the same regardless of field declaration order.
pub fn canonicalize<T: Serialize + ?Sized>(value: &T) -> CryptoResult<Vec<u8>> {
    let value =
        serde_json::to_value(value).map_err(|e| CryptoError::Serialization(e.to_string()))?;
    serde_json::to_vec(&value).map_err(|e| CryptoError::Serialization(e.to_string()))
}
