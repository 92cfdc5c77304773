//! Verification scripts and multisignature address derivation
//!
//! A verification script names the keys that may authorize an address and
//! how many of them must sign:
//!
//! ```text
//! single:   "lode/single" || pubkey
//! multisig: "lode/multi"  || m (u32 BE) || n (u32 BE) || pubkey_1 .. pubkey_n
//! ```
//!
//! The address is `hash160(script)`, so the same keys in a different order
//! produce a different address.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::keys::PublicKey;

const SINGLE_TAG: &[u8] = b"lode/single";
const MULTI_TAG: &[u8] = b"lode/multi";

/// Signature threshold policy for a key set
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThresholdMode {
    /// ⌊2n/3⌋ + 1 signatures (Byzantine quorum of the Alphabet)
    Alphabet,
    /// ⌊n/2⌋ + 1 signatures (simple majority of the committee)
    Committee,
}

impl ThresholdMode {
    /// Required signatures for a set of `n` keys
    pub fn threshold(&self, n: usize) -> usize {
        match self {
            ThresholdMode::Alphabet => n * 2 / 3 + 1,
            ThresholdMode::Committee => n / 2 + 1,
        }
    }
}

/// Script describing which signatures authorize an address
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationScript {
    /// One key, one signature
    Single(PublicKey),
    /// `threshold` distinct signatures out of `keys`
    Multisig { threshold: u32, keys: Vec<PublicKey> },
}

impl VerificationScript {
    pub fn single(key: PublicKey) -> Self {
        VerificationScript::Single(key)
    }

    /// Multisig script over `keys` in the given order
    pub fn multisig(keys: &[PublicKey], mode: ThresholdMode) -> Self {
        VerificationScript::Multisig {
            threshold: mode.threshold(keys.len()) as u32,
            keys: keys.to_vec(),
        }
    }

    /// Canonical byte encoding hashed into the address
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            VerificationScript::Single(key) => {
                let mut out = Vec::with_capacity(SINGLE_TAG.len() + 32);
                out.extend_from_slice(SINGLE_TAG);
                out.extend_from_slice(key.as_bytes());
                out
            }
            VerificationScript::Multisig { threshold, keys } => {
                let mut out = Vec::with_capacity(MULTI_TAG.len() + 8 + keys.len() * 32);
                out.extend_from_slice(MULTI_TAG);
                out.extend_from_slice(&threshold.to_be_bytes());
                out.extend_from_slice(&(keys.len() as u32).to_be_bytes());
                for key in keys {
                    out.extend_from_slice(key.as_bytes());
                }
                out
            }
        }
    }

    pub fn address(&self) -> Address {
        Address::from_script(&self.to_bytes())
    }

    /// Number of distinct valid signatures needed
    pub fn threshold(&self) -> usize {
        match self {
            VerificationScript::Single(_) => 1,
            VerificationScript::Multisig { threshold, .. } => *threshold as usize,
        }
    }

    pub fn keys(&self) -> &[PublicKey] {
        match self {
            VerificationScript::Single(key) => std::slice::from_ref(key),
            VerificationScript::Multisig { keys, .. } => keys,
        }
    }
}

/// Deterministic multisignature address for `keys` under `mode`
///
/// An empty key set yields an address no witness can ever satisfy.
pub fn derive_multisig_address(keys: &[PublicKey], mode: ThresholdMode) -> Address {
    VerificationScript::multisig(keys, mode).address()
}
