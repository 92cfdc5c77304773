//! Shared harness for contract integration tests
#![allow(dead_code)]

use lode_contracts::{ContractSet, DeployParams, NodeInfo};
use lode_core::{invoke, query, Context, Environment, Epoch, Hash256, MemoryStore, Receipt, Result};
use lode_crypto::{
    derive_multisig_address, hash_blake3, Address, KeyPair, PublicKey, StaticWitness, ThresholdMode,
    Witness,
};
use std::cell::Cell;

pub struct TestEnv {
    witness: StaticWitness,
    alphabet: Vec<PublicKey>,
    height: u64,
}

impl Environment for TestEnv {
    fn witness(&self) -> &dyn Witness {
        &self.witness
    }

    fn block_height(&self) -> u64 {
        self.height
    }

    fn designated_alphabet(&self, _height: u64) -> Vec<PublicKey> {
        self.alphabet.clone()
    }

    fn committee(&self) -> Vec<PublicKey> {
        self.alphabet.clone()
    }

    fn tx_hash(&self) -> Hash256 {
        hash_blake3(&self.height.to_be_bytes())
    }
}

/// Deployed contract suite over an in-memory store
pub struct Harness {
    pub store: MemoryStore,
    pub contracts: ContractSet,
    pub alphabet: Vec<KeyPair>,
    height: Cell<u64>,
}

impl Harness {
    pub fn new() -> Self {
        let alphabet: Vec<KeyPair> = (1..=7u8).map(|i| KeyPair::from_seed([i; 32])).collect();
        let harness = Self {
            store: MemoryStore::new(),
            contracts: ContractSet::derive("test"),
            alphabet,
            height: Cell::new(1),
        };
        let params = DeployParams::new(harness.alphabet_keys());
        let contracts = harness.contracts;
        harness
            .as_committee(|ctx| contracts.deploy(ctx, &params))
            .expect("deploy");
        harness
            .as_alphabet(|ctx| contracts.netmap.init_config(ctx, &[]))
            .expect("init config");
        harness
    }

    pub fn alphabet_keys(&self) -> Vec<PublicKey> {
        self.alphabet.iter().map(|k| k.public_key()).collect()
    }

    pub fn alphabet_address(&self) -> Address {
        derive_multisig_address(&self.alphabet_keys(), ThresholdMode::Alphabet)
    }

    pub fn committee_address(&self) -> Address {
        derive_multisig_address(&self.alphabet_keys(), ThresholdMode::Committee)
    }

    fn env(&self, witnessed: &[Address]) -> TestEnv {
        let mut witness = StaticWitness::new();
        for addr in witnessed {
            witness.insert(*addr);
        }
        let height = self.height.get();
        self.height.set(height + 1);
        TestEnv {
            witness,
            alphabet: self.alphabet_keys(),
            height,
        }
    }

    /// Run one transaction witnessed by `witnessed`
    pub fn invoke<T>(
        &self,
        witnessed: &[Address],
        op: impl FnOnce(&mut Context<'_>) -> Result<T>,
    ) -> Result<Receipt<T>> {
        let env = self.env(witnessed);
        invoke(&self.store, &env, op)
    }

    pub fn as_alphabet<T>(&self, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        self.invoke(&[self.alphabet_address()], op).map(|r| r.value)
    }

    pub fn as_committee<T>(&self, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        self.invoke(&[self.committee_address()], op).map(|r| r.value)
    }

    pub fn as_account<T>(&self, account: Address, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        self.invoke(&[account], op).map(|r| r.value)
    }

    pub fn anonymous<T>(&self, op: impl FnOnce(&mut Context<'_>) -> Result<T>) -> Result<T> {
        self.invoke(&[], op).map(|r| r.value)
    }

    pub fn read<T>(&self, op: impl FnOnce(&Context<'_>) -> Result<T>) -> Result<T> {
        let env = TestEnv {
            witness: StaticWitness::new(),
            alphabet: self.alphabet_keys(),
            height: self.height.get(),
        };
        query(&self.store, &env, op)
    }

    // === Shortcuts ===

    pub fn epoch(&self) -> Epoch {
        let netmap = self.contracts.netmap;
        self.read(|ctx| netmap.epoch(ctx)).expect("epoch")
    }

    pub fn advance_epoch(&self) -> Epoch {
        let next = self.epoch() + 1;
        let netmap = self.contracts.netmap;
        self.as_alphabet(|ctx| netmap.new_epoch(ctx, next))
            .expect("new epoch");
        next
    }

    pub fn balance_of(&self, account: &Address) -> u128 {
        let balance = self.contracts.balance;
        self.read(|ctx| balance.balance_of(ctx, account)).expect("balance")
    }

    pub fn mint(&self, to: Address, amount: u128) {
        let balance = self.contracts.balance;
        let details = format!("mint:{}:{}:{}", to, amount, self.height.get());
        self.as_alphabet(|ctx| balance.mint(ctx, to, amount, details.as_bytes()))
            .expect("mint");
    }

    pub fn set_config(&self, key: &[u8], value: &[u8]) {
        let netmap = self.contracts.netmap;
        self.as_alphabet(|ctx| netmap.set_config(ctx, b"cfg", key, value))
            .expect("set config");
    }

    /// Register a storage node; it joins the snapshot of the next epoch
    pub fn register_node(&self, node: &KeyPair) -> Result<()> {
        let raw = node_info(node).encode()?;
        let signature = node.sign(&raw);
        let netmap = self.contracts.netmap;
        self.anonymous(|ctx| netmap.add_peer(ctx, &raw, &signature))
    }
}

pub fn node_info(node: &KeyPair) -> NodeInfo {
    NodeInfo {
        public_key: node.public_key(),
        addresses: vec![format!("/dns4/{}.lode/tcp/8080", &node.public_key().to_hex()[..8])],
        attributes: vec![("Continent".into(), "Europe".into())],
        capacity: 1024,
    }
}

pub fn account(seed: u8) -> KeyPair {
    KeyPair::from_seed([seed.wrapping_add(100); 32])
}
