use std::fmt;
use std::str::FromStr;

use crate::address::CasAddress;
use crate::error::TypeError;

/// Ledger payload referencing a batch: `<core_index_address>.<op_count>`.
///
/// The ledger treats the string as opaque. Parsing is strict: any other
/// shape is malformed and the observer skips the anchor.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AnchorString {
    pub core_index: CasAddress,
    pub operation_count: u32,
}

impl AnchorString {
    pub fn new(core_index: CasAddress, operation_count: u32) -> Self {
        Self {
            core_index,
            operation_count,
        }
    }
}

impl fmt::Display for AnchorString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.core_index, self.operation_count)
    }
}

impl FromStr for AnchorString {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = |reason| TypeError::InvalidAnchor {
            input: s.to_string(),
            reason,
        };

        let (address, count) = s.split_once('.').ok_or_else(|| malformed("missing '.'"))?;
        if count.contains('.') {
            return Err(malformed("more than one '.'"));
        }
        let core_index = CasAddress::new(address).map_err(|_| malformed("bad CAS address"))?;

        if count.is_empty() || !count.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed("operation count is not a decimal number"));
        }
        if count.len() > 1 && count.starts_with('0') {
            return Err(malformed("operation count has leading zeros"));
        }
        let operation_count: u32 = count
            .parse()
            .map_err(|_| malformed("operation count out of range"))?;
        if operation_count == 0 {
            return Err(malformed("operation count is zero"));
        }

        Ok(Self {
            core_index,
            operation_count,
        })
    }
}
