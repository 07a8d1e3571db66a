//! Storage key hashers.
//!
//! `twox_128` is xxHash64 run with seeds 0 and 1 and concatenated
//! little-endian. It spreads keys uniformly and is not collision resistant,
//! which is why map keys chosen by users go through Blake2 instead.

use std::hash::Hasher;

use blake2::digest::consts::U16;
use blake2::{Blake2b, Blake2b512, Digest};
use twox_hash::XxHash64;

type Blake2b128 = Blake2b<U16>;

/// 128-bit xxHash of `data`.
pub fn twox_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    for (seed, chunk) in out.chunks_exact_mut(8).enumerate() {
        let mut h = XxHash64::with_seed(seed as u64);
        h.write(data);
        chunk.copy_from_slice(&h.finish().to_le_bytes());
    }
    out
}

/// 128-bit Blake2b digest.
pub fn blake2_128(data: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    out.copy_from_slice(&Blake2b128::digest(data));
    out
}

/// `blake2_128(data) ++ data`: the hash keeps the trie balanced while the
/// raw key stays recoverable from the storage address.
pub fn blake2_128_concat(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + data.len());
    out.extend_from_slice(&blake2_128(data));
    out.extend_from_slice(data);
    out
}

/// 512-bit Blake2b digest (SS58 checksums).
pub fn blake2_512(data: &[u8]) -> [u8; 64] {
    let mut out = [0u8; 64];
    out.copy_from_slice(&Blake2b512::digest(data));
    out
}
