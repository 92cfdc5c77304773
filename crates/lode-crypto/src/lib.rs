//! # Lode Cryptography
//!
//! Authorization primitives shared by every Lode contract:
//! - Ed25519 key pairs and signature verification
//! - 160-bit account addresses derived from verification scripts
//! - Alphabet / Committee multisignature address derivation
//! - The `Witness` capability that answers "did this transaction carry a
//!   valid signature from that address?"
//!
//! ## Threshold Modes
//!
//! | Mode | Threshold for n keys | Used by |
//! |------|----------------------|---------|
//! | Alphabet | ⌊2n/3⌋ + 1 | epoch, ledger, container and config writes |
//! | Committee | ⌊n/2⌋ + 1 | contract updates and deployment |
//!
//! Key order is significant: callers must pass keys in the order returned by
//! the role-designation query, otherwise a different address comes out.

pub mod address;
pub mod error;
pub mod hash;
pub mod keys;
pub mod script;
pub mod witness;

pub use address::*;
pub use error::*;
pub use hash::*;
pub use keys::*;
pub use script::*;
pub use witness::*;

/// Cryptographic prelude
pub mod prelude {
    pub use crate::address::Address;
    pub use crate::error::{CryptoError, Result};
    pub use crate::hash::{hash160, hash_blake3};
    pub use crate::keys::{KeyPair, PublicKey};
    pub use crate::script::{derive_multisig_address, ThresholdMode, VerificationScript};
    pub use crate::witness::{SignedWitness, StaticWitness, Witness};
}
