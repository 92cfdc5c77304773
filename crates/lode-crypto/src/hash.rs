//! BLAKE3 hashing utilities for Lode
//!
//! All content identifiers and transaction digests are 256-bit BLAKE3.
//! Addresses use the first 160 bits of the same hash.

/// Hash data using BLAKE3 (256-bit output)
pub fn hash_blake3(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple items together
pub fn hash_concat(items: &[&[u8]]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for item in items {
        hasher.update(item);
    }
    *hasher.finalize().as_bytes()
}

/// 160-bit hash used for account and contract addresses
pub fn hash160(data: &[u8]) -> [u8; 20] {
    let full = hash_blake3(data);
    let mut out = [0u8; 20];
    out.copy_from_slice(&full[..20]);
    out
}
