//! Transaction witnesses
//!
//! The host chain attaches verification scripts and signatures to every
//! transaction. Contracts never look at signatures directly; they ask the
//! `Witness` whether a given address authorized the transaction and abort
//! when the answer is no.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};

use crate::address::Address;
use crate::keys::{KeyPair, PublicKey};
use crate::script::{derive_multisig_address, ThresholdMode, VerificationScript};

/// Witness-checking capability supplied by the execution environment
pub trait Witness: Send + Sync {
    /// True when the current transaction is authorized by `address`
    fn verify(&self, address: &Address) -> bool;

    /// Derive the multisignature address for `keys`
    fn derive_address(&self, keys: &[PublicKey], mode: ThresholdMode) -> Address {
        derive_multisig_address(keys, mode)
    }
}

/// Deterministic witness stub: a fixed set of authorizing addresses
#[derive(Clone, Debug, Default)]
pub struct StaticWitness {
    witnessed: HashSet<Address>,
}

impl StaticWitness {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, address: Address) -> Self {
        self.witnessed.insert(address);
        self
    }

    pub fn insert(&mut self, address: Address) {
        self.witnessed.insert(address);
    }
}

impl Witness for StaticWitness {
    fn verify(&self, address: &Address) -> bool {
        self.witnessed.contains(address)
    }
}

/// Signature by one key over the transaction digest
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySignature {
    pub key: PublicKey,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

/// A verification script and the signatures offered for it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptWitness {
    pub script: VerificationScript,
    pub signatures: Vec<KeySignature>,
}

/// Witness backed by real Ed25519 signatures over a transaction digest
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SignedWitness {
    digest: [u8; 32],
    scripts: Vec<ScriptWitness>,
}

impl SignedWitness {
    pub fn new(digest: [u8; 32]) -> Self {
        Self {
            digest,
            scripts: Vec::new(),
        }
    }

    pub fn digest(&self) -> &[u8; 32] {
        &self.digest
    }

    pub fn scripts(&self) -> &[ScriptWitness] {
        &self.scripts
    }

    /// Sign as the single-key account of `keypair`
    pub fn sign_single(mut self, keypair: &KeyPair) -> Self {
        let signature = keypair.sign(&self.digest).to_vec();
        self.scripts.push(ScriptWitness {
            script: VerificationScript::single(keypair.public_key()),
            signatures: vec![KeySignature {
                key: keypair.public_key(),
                signature,
            }],
        });
        self
    }

    /// Sign for a multisig `script` with each of `signers`
    pub fn sign_multisig(mut self, script: VerificationScript, signers: &[&KeyPair]) -> Self {
        let signatures = signers
            .iter()
            .map(|kp| KeySignature {
                key: kp.public_key(),
                signature: kp.sign(&self.digest).to_vec(),
            })
            .collect();
        self.scripts.push(ScriptWitness { script, signatures });
        self
    }

    pub fn push(&mut self, witness: ScriptWitness) {
        self.scripts.push(witness);
    }

    fn satisfied(&self, witness: &ScriptWitness) -> bool {
        let allowed = witness.script.keys();
        let valid: BTreeSet<PublicKey> = witness
            .signatures
            .iter()
            .filter(|s| allowed.contains(&s.key))
            .filter(|s| s.key.verify(&self.digest, &s.signature).is_ok())
            .map(|s| s.key)
            .collect();
        valid.len() >= witness.script.threshold()
    }
}

impl Witness for SignedWitness {
    fn verify(&self, address: &Address) -> bool {
        self.scripts
            .iter()
            .any(|w| w.script.address() == *address && self.satisfied(w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alphabet(n: u8) -> Vec<KeyPair> {
        (1..=n).map(|i| KeyPair::from_seed([i; 32])).collect()
    }

    #[test]
    fn test_static_witness() {
        let addr = Address::from_script(b"a");
        let witness = StaticWitness::new().with(addr);
        assert!(witness.verify(&addr));
        assert!(!witness.verify(&Address::from_script(b"b")));
    }

    #[test]
    fn test_single_signature_witness() {
        let kp = KeyPair::from_seed([9u8; 32]);
        let witness = SignedWitness::new([1u8; 32]).sign_single(&kp);
        assert!(witness.verify(&kp.address()));
        assert!(!witness.verify(&KeyPair::from_seed([8u8; 32]).address()));
    }

    #[test]
    fn test_multisig_threshold_met() {
        let members = alphabet(4);
        let keys: Vec<_> = members.iter().map(|k| k.public_key()).collect();
        let script = VerificationScript::multisig(&keys, ThresholdMode::Alphabet);
        let addr = script.address();

        let signers: Vec<&KeyPair> = members.iter().take(3).collect();
        let witness = SignedWitness::new([2u8; 32]).sign_multisig(script, &signers);
        assert!(witness.verify(&addr));
    }

    #[test]
    fn test_multisig_threshold_not_met() {
        let members = alphabet(4);
        let keys: Vec<_> = members.iter().map(|k| k.public_key()).collect();
        let script = VerificationScript::multisig(&keys, ThresholdMode::Alphabet);
        let addr = script.address();

        let signers: Vec<&KeyPair> = members.iter().take(2).collect();
        let witness = SignedWitness::new([2u8; 32]).sign_multisig(script, &signers);
        assert!(!witness.verify(&addr));
    }

    #[test]
    fn test_duplicate_signatures_count_once() {
        let members = alphabet(4);
        let keys: Vec<_> = members.iter().map(|k| k.public_key()).collect();
        let script = VerificationScript::multisig(&keys, ThresholdMode::Alphabet);
        let addr = script.address();

        let first = &members[0];
        let witness = SignedWitness::new([3u8; 32]).sign_multisig(script, &[first, first, first]);
        assert!(!witness.verify(&addr));
    }

    #[test]
    fn test_outsider_signature_ignored() {
        let members = alphabet(4);
        let keys: Vec<_> = members.iter().map(|k| k.public_key()).collect();
        let script = VerificationScript::multisig(&keys, ThresholdMode::Committee);
        let addr = script.address();

        let outsider = KeyPair::from_seed([200u8; 32]);
        let signers = [&members[0], &members[1], &outsider];
        let witness = SignedWitness::new([4u8; 32]).sign_multisig(script, &signers);
        assert!(!witness.verify(&addr));
    }
}
