use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::id::is_base64url;

/// Content address of an artifact held in CAS.
///
/// Addresses are the base64url encoding of a multihash over the artifact
/// bytes, so they never contain `.` and can be embedded in anchor strings.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CasAddress(String);

impl CasAddress {
    pub fn new(value: impl Into<String>) -> Result<Self, TypeError> {
        let value = value.into();
        if !is_base64url(&value) {
            return Err(TypeError::InvalidAddress(value));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log output.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl TryFrom<String> for CasAddress {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CasAddress> for String {
    fn from(addr: CasAddress) -> Self {
        addr.0
    }
}

impl fmt::Debug for CasAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CasAddress({})", self.short())
    }
}

impl fmt::Display for CasAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
