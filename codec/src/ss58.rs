//! SS58 account rendering.
//!
//! Format: `base58(prefix_bytes ++ account_id ++ checksum)`.
//!
//! Prefixes below 64 take one byte; prefixes up to 16383 take two bytes in
//! the packed layout below. Checksum: first 2 bytes of
//! Blake2b-512(`"SS58PRE"` ++ prefix_bytes ++ account_id).

use govmirror_types::AccountId32;

use crate::hashing::blake2_512;

/// Bitcoin base58 alphabet.
const BASE58_ALPHABET: &[u8; 58] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

const CHECKSUM_PREFIX: &[u8] = b"SS58PRE";
const CHECKSUM_LEN: usize = 2;

/// Largest prefix the two-byte form can carry.
pub const MAX_PREFIX: u16 = 0x3fff;

fn prefix_bytes(prefix: u16) -> Vec<u8> {
    let prefix = prefix & MAX_PREFIX;
    if prefix < 64 {
        vec![prefix as u8]
    } else {
        let first = (((prefix & 0b0000_0000_1111_1100) >> 2) as u8) | 0b0100_0000;
        let second = ((prefix >> 8) as u8) | (((prefix & 0b0000_0000_0000_0011) as u8) << 6);
        vec![first, second]
    }
}

/// Encode a byte slice as base58. Leading zero bytes become `1`s.
fn encode_base58(bytes: &[u8]) -> String {
    let zeros = bytes.iter().take_while(|b| **b == 0).count();

    // Little-endian base-58 digits of the big-endian input.
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for &byte in &bytes[zeros..] {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            carry += (*digit as u32) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }

    let mut result = String::with_capacity(zeros + digits.len());
    result.extend(std::iter::repeat('1').take(zeros));
    result.extend(digits.iter().rev().map(|d| BASE58_ALPHABET[*d as usize] as char));
    result
}

/// Render an account id as SS58 under the given network prefix.
pub fn ss58_encode(prefix: u16, account: &AccountId32) -> String {
    let mut payload = prefix_bytes(prefix);
    payload.extend_from_slice(account.as_bytes());

    let mut preimage = Vec::with_capacity(CHECKSUM_PREFIX.len() + payload.len());
    preimage.extend_from_slice(CHECKSUM_PREFIX);
    preimage.extend_from_slice(&payload);
    let checksum = blake2_512(&preimage);

    payload.extend_from_slice(&checksum[..CHECKSUM_LEN]);
    encode_base58(&payload)
}
