//! Record key layout.
//!
//! `network_id (BE u16) ++ ref_id (BE u32)`. Big-endian keeps LMDB's
//! lexicographic order equal to numeric order, so a network's rows form one
//! contiguous, id-ordered range.

use govmirror_types::NetworkId;

pub const KEY_LEN: usize = 6;

pub fn record_key(network: NetworkId, ref_id: u32) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..2].copy_from_slice(&network.to_be_bytes());
    key[2..].copy_from_slice(&ref_id.to_be_bytes());
    key
}

/// Inclusive first and last possible key of a network.
pub fn network_range(network: NetworkId) -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
    (record_key(network, 0), record_key(network, u32::MAX))
}

/// Recover the id from a record key.
pub fn ref_id_from_key(key: &[u8]) -> Option<u32> {
    let tail: [u8; 4] = key.get(2..KEY_LEN)?.try_into().ok()?;
    Some(u32::from_be_bytes(tail))
}
