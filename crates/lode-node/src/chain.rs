//! # Local Chain
//!
//! Single-process host for the contract suite. Each call is one transaction
//! in its own block:
//!
//! ```text
//! invoke(op, signer, f)
//!   height += 1
//!   digest  = BLAKE3(height || op)
//!   witness = signatures of `signer` over digest
//!   f(ctx) ── Ok  ──► writes applied, events appended to the log
//!          └─ Err ──► nothing written
//! ```
//!
//! Role designation is kept per activation height. Contracts in block `h`
//! check the Alphabet designated for `h + 1`, so a rotation requested now
//! binds the transaction after the next one.

use lode_core::{
    invoke, query, Context, Environment, Event, GovError, Hash256, MemoryStore, Receipt,
};
use lode_crypto::{
    derive_multisig_address, hash_concat, Address, KeyPair, PublicKey, SignedWitness,
    ThresholdMode, VerificationScript, Witness,
};
use std::collections::VecDeque;
use tracing::{debug, warn};

/// Who signs a transaction
pub enum Signer<'a> {
    /// Threshold of the Alphabet designated for the next block
    Alphabet,
    /// Majority of the committee
    Committee,
    /// Single-key account
    Account(&'a KeyPair),
    /// Unsigned transaction
    Nobody,
}

struct ChainEnv {
    witness: SignedWitness,
    height: u64,
    designations: Vec<(u64, Vec<PublicKey>)>,
    committee: Vec<PublicKey>,
    tx_hash: Hash256,
}

impl Environment for ChainEnv {
    fn witness(&self) -> &dyn Witness {
        &self.witness
    }

    fn block_height(&self) -> u64 {
        self.height
    }

    fn designated_alphabet(&self, height: u64) -> Vec<PublicKey> {
        designated(&self.designations, height)
    }

    fn committee(&self) -> Vec<PublicKey> {
        self.committee.clone()
    }

    fn tx_hash(&self) -> Hash256 {
        self.tx_hash
    }
}

fn designated<K: Clone>(designations: &[(u64, Vec<K>)], height: u64) -> Vec<K> {
    designations
        .iter()
        .rev()
        .find(|(from, _)| *from <= height)
        .map(|(_, keys)| keys.clone())
        .unwrap_or_default()
}

/// In-memory chain with devnet key custody
pub struct LocalChain {
    store: MemoryStore,
    height: u64,
    /// Alphabet key pairs by activation height
    alphabet: Vec<(u64, Vec<KeyPair>)>,
    committee: Vec<KeyPair>,
    log: Vec<Event>,
    pending: VecDeque<Event>,
}

impl LocalChain {
    /// Fresh chain whose committee is also the initial Alphabet
    pub fn new(alphabet: Vec<KeyPair>) -> Self {
        Self {
            store: MemoryStore::new(),
            height: 0,
            committee: alphabet.clone(),
            alphabet: vec![(0, alphabet)],
            log: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    /// Alphabet key pairs in effect at `height`
    fn alphabet_at(&self, height: u64) -> Vec<&KeyPair> {
        self.alphabet
            .iter()
            .rev()
            .find(|(from, _)| *from <= height)
            .map(|(_, keys)| keys.iter().collect())
            .unwrap_or_default()
    }

    /// Public keys of the Alphabet the next transaction is checked against
    pub fn alphabet_keys(&self) -> Vec<PublicKey> {
        self.alphabet_at(self.height + 2)
            .iter()
            .map(|k| k.public_key())
            .collect()
    }

    pub fn committee_keys(&self) -> Vec<PublicKey> {
        self.committee.iter().map(|k| k.public_key()).collect()
    }

    pub fn alphabet_address(&self) -> Address {
        derive_multisig_address(&self.alphabet_keys(), ThresholdMode::Alphabet)
    }

    pub fn committee_address(&self) -> Address {
        derive_multisig_address(&self.committee_keys(), ThresholdMode::Committee)
    }

    /// Designate a new Alphabet, effective from the transaction after the next one
    pub fn designate_alphabet(&mut self, keys: Vec<KeyPair>) {
        let from = self.height + 3;
        debug!(from, size = keys.len(), "alphabet designated");
        self.alphabet.push((from, keys));
    }

    /// Execute one transaction
    pub fn invoke<T>(
        &mut self,
        op: &str,
        signer: Signer<'_>,
        f: impl FnOnce(&mut Context<'_>) -> Result<T, GovError>,
    ) -> Result<Receipt<T>, GovError> {
        self.height += 1;
        let height = self.height;
        let digest = hash_concat(&[&height.to_be_bytes(), op.as_bytes()]);
        let env = ChainEnv {
            witness: self.sign(digest, &signer, height),
            height,
            designations: self.designations(),
            committee: self.committee_keys(),
            tx_hash: digest,
        };

        match invoke(&self.store, &env, f) {
            Ok(receipt) => {
                debug!(height, op, writes = receipt.writes, events = receipt.events.len(), "tx applied");
                self.log.extend(receipt.events.iter().cloned());
                self.pending.extend(receipt.events.iter().cloned());
                Ok(receipt)
            }
            Err(err) => {
                warn!(height, op, error = %err, code = err.code(), "tx aborted");
                Err(err)
            }
        }
    }

    /// Run a read-only accessor against the current state
    pub fn query<T>(&self, f: impl FnOnce(&Context<'_>) -> Result<T, GovError>) -> Result<T, GovError> {
        let env = ChainEnv {
            witness: SignedWitness::new([0u8; 32]),
            height: self.height,
            designations: self.designations(),
            committee: self.committee_keys(),
            tx_hash: [0u8; 32],
        };
        query(&self.store, &env, f)
    }

    /// Every notification emitted so far
    pub fn events(&self) -> &[Event] {
        &self.log
    }

    /// Notifications not yet handed to a processor
    pub fn take_pending(&mut self) -> Vec<Event> {
        self.pending.drain(..).collect()
    }

    fn designations(&self) -> Vec<(u64, Vec<PublicKey>)> {
        self.alphabet
            .iter()
            .map(|(from, keys)| (*from, keys.iter().map(|k| k.public_key()).collect()))
            .collect()
    }

    fn sign(&self, digest: Hash256, signer: &Signer<'_>, height: u64) -> SignedWitness {
        let witness = SignedWitness::new(digest);
        match signer {
            Signer::Alphabet => {
                // contracts check the Alphabet designated for height + 1
                let keys = self.alphabet_at(height + 1);
                multisig(witness, &keys, ThresholdMode::Alphabet)
            }
            Signer::Committee => {
                let keys: Vec<&KeyPair> = self.committee.iter().collect();
                multisig(witness, &keys, ThresholdMode::Committee)
            }
            Signer::Account(keypair) => witness.sign_single(keypair),
            Signer::Nobody => witness,
        }
    }
}

fn multisig(witness: SignedWitness, keys: &[&KeyPair], mode: ThresholdMode) -> SignedWitness {
    let public: Vec<PublicKey> = keys.iter().map(|k| k.public_key()).collect();
    let script = VerificationScript::multisig(&public, mode);
    let signers = &keys[..mode.threshold(keys.len()).min(keys.len())];
    witness.sign_multisig(script, signers)
}
