//! Account and contract addresses
//!
//! Address = first 20 bytes of BLAKE3(verification script). Contract
//! hashes use the same 20-byte space.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CryptoError, Result};
use crate::hash::hash160;
use crate::keys::PublicKey;
use crate::script::VerificationScript;

/// Address size in bytes
pub const ADDRESS_SIZE: usize = 20;

/// 160-bit account or contract address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    /// All-zero address
    pub const ZERO: Self = Self([0u8; ADDRESS_SIZE]);

    pub fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidAddress(format!("expected {} bytes, got {}", ADDRESS_SIZE, bytes.len()))
        })?;
        Ok(Self(raw))
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| CryptoError::InvalidAddress(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Hash an arbitrary script or seed into an address
    pub fn from_script(script: &[u8]) -> Self {
        Self(hash160(script))
    }

    /// Standard single-key account
    pub fn from_public_key(key: &PublicKey) -> Self {
        VerificationScript::single(*key).address()
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
