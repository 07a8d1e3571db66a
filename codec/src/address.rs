//! Deterministic storage addresses.
//!
//! Address format for a plain item: `twox128(pallet) ++ twox128(item)`.
//! Map entries append the hashed key. The Referenda pallet keys
//! `ReferendumInfoFor` with `Blake2_128Concat`, so every enumerated address
//! ends with the raw little-endian `u32` referendum index.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::hashing::{blake2_128, blake2_128_concat, twox_128};
use crate::DecodeError;

pub const REFERENDA_PALLET: &str = "Referenda";
pub const REFERENDUM_INFO_FOR: &str = "ReferendumInfoFor";
pub const REFERENDUM_COUNT: &str = "ReferendumCount";

/// Length of `twox128(pallet) ++ twox128(item)`.
pub const PREFIX_LEN: usize = 32;

/// A raw storage key, rendered as `0x`-prefixed hex on the wire.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StorageAddress(Vec<u8>);

impl StorageAddress {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &StorageAddress) -> bool {
        self.0.starts_with(&prefix.0)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.0))
    }

    /// Parse a `0x`-prefixed (or bare) hex key as returned by the node.
    pub fn from_hex(s: &str) -> Result<Self, DecodeError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        Ok(Self(hex::decode(s)?))
    }
}

impl fmt::Debug for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageAddress({})", self.to_hex())
    }
}

impl fmt::Display for StorageAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compute the storage address of `pallet.item`, optionally keyed.
///
/// The key is hashed with `Blake2_128Concat`. No chain round trip is needed.
pub fn derive_address(pallet: &str, item: &str, key: Option<&[u8]>) -> StorageAddress {
    let mut bytes = Vec::with_capacity(PREFIX_LEN + key.map_or(0, |k| 16 + k.len()));
    bytes.extend_from_slice(&twox_128(pallet.as_bytes()));
    bytes.extend_from_slice(&twox_128(item.as_bytes()));
    if let Some(key) = key {
        bytes.extend_from_slice(&blake2_128_concat(key));
    }
    StorageAddress(bytes)
}

/// Prefix shared by every `Referenda.ReferendumInfoFor` entry.
pub fn referendum_info_prefix() -> StorageAddress {
    derive_address(REFERENDA_PALLET, REFERENDUM_INFO_FOR, None)
}

/// Address of one referendum's `ReferendumInfoFor` entry.
pub fn referendum_info_address(ref_id: u32) -> StorageAddress {
    derive_address(REFERENDA_PALLET, REFERENDUM_INFO_FOR, Some(&ref_id.to_le_bytes()))
}

/// Address of the `Referenda.ReferendumCount` counter.
pub fn referendum_count_address() -> StorageAddress {
    derive_address(REFERENDA_PALLET, REFERENDUM_COUNT, None)
}

/// Recover the referendum index from an enumerated `ReferendumInfoFor` key.
///
/// Returns `None` when the address is not a well-formed entry of that map:
/// wrong prefix, wrong length, or a hash part that does not match the key.
pub fn referendum_id_from_address(address: &StorageAddress) -> Option<u32> {
    let bytes = address.as_bytes();
    if bytes.len() != PREFIX_LEN + 16 + 4 {
        return None;
    }
    if !address.starts_with(&referendum_info_prefix()) {
        return None;
    }
    let raw: [u8; 4] = bytes[PREFIX_LEN + 16..].try_into().ok()?;
    if blake2_128(&raw) != bytes[PREFIX_LEN..PREFIX_LEN + 16] {
        return None;
    }
    Some(u32::from_le_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn referenda_prefixes() {
        assert_eq!(
            referendum_info_prefix().to_hex(),
            "0x0f6738a0ee80c8e74cd2c7417c1e25569613e9bbc07e304aa9a1af9b85898e5a"
        );
        assert_eq!(
            referendum_count_address().to_hex(),
            "0x0f6738a0ee80c8e74cd2c7417c1e25567f17cdfbfa73331856cca0acddd7842e"
        );
    }

    #[test]
    fn keyed_address_layout() {
        let addr = referendum_info_address(42);
        assert_eq!(addr.len(), 52);
        assert!(addr.starts_with(&referendum_info_prefix()));
        assert_eq!(
            hex::encode(&addr.as_bytes()[32..48]),
            "9017d1c733ec2aeaa6fd0230614e397e"
        );
        assert_eq!(&addr.as_bytes()[48..], &42u32.to_le_bytes());
    }

    #[test]
    fn id_recovered_from_enumerated_key() {
        for id in [0u32, 1, 255, 1_000_000, u32::MAX] {
            assert_eq!(referendum_id_from_address(&referendum_info_address(id)), Some(id));
        }
    }

    #[test]
    fn malformed_keys_are_rejected() {
        assert_eq!(referendum_id_from_address(&referendum_info_prefix()), None);
        assert_eq!(referendum_id_from_address(&referendum_count_address()), None);

        let mut tampered = referendum_info_address(7).as_bytes().to_vec();
        tampered[40] ^= 0xff;
        assert_eq!(referendum_id_from_address(&StorageAddress::new(tampered)), None);

        let other_map = derive_address("Balances", "Locks", Some(&7u32.to_le_bytes()));
        assert_eq!(referendum_id_from_address(&other_map), None);
    }

    #[test]
    fn hex_parsing_accepts_prefix() {
        let addr = referendum_info_address(3);
        assert_eq!(StorageAddress::from_hex(&addr.to_hex()).unwrap(), addr);
        assert_eq!(
            StorageAddress::from_hex(addr.to_hex().trim_start_matches("0x")).unwrap(),
            addr
        );
        assert!(StorageAddress::from_hex("0xzz").is_err());
    }
}
