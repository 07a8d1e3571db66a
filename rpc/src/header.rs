//! Block header as returned by `chain_getHeader` / `chain_newHead`.

use serde::Deserialize;

use crate::RpcError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHeader {
    number: String,
    #[serde(default)]
    parent_hash: String,
}

/// The fields of a header the indexer cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Header {
    pub number: u32,
    pub parent_hash: String,
}

impl Header {
    pub fn from_value(value: serde_json::Value) -> Result<Self, RpcError> {
        let raw: RawHeader = serde_json::from_value(value)?;
        let digits = raw.number.strip_prefix("0x").unwrap_or(&raw.number);
        let number = u32::from_str_radix(digits, 16).map_err(|e| {
            RpcError::InvalidResponse(format!("header number {:?}: {e}", raw.number))
        })?;
        Ok(Self {
            number,
            parent_hash: raw.parent_hash,
        })
    }
}
