//! Invocation context
//!
//! A [`Context`] is the explicit store handle every contract entry point
//! receives. It buffers writes and notifications for one transaction and
//! exposes the host's witness and role-designation capabilities.
//!
//! ```text
//! invoke(store, env, op)
//!   ├── op(&mut Context) -> Ok(v)   ──► apply write set, return Receipt
//!   └── op(&mut Context) -> Err(e)  ──► discard everything, return e
//! ```

use lode_crypto::{derive_multisig_address, Address, PublicKey, ThresholdMode, Witness};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::codec;
use crate::error::{GovError, Result};
use crate::notification::{Event, Notification};
use crate::store::{Entries, KvStore, Overlay};
use crate::types::Hash256;

/// Host-chain capabilities visible to one transaction
pub trait Environment {
    /// Witness checker for the executing transaction
    fn witness(&self) -> &dyn Witness;

    /// Height of the block being built
    fn block_height(&self) -> u64;

    /// Alphabet keys designated for `height`, in canonical order
    fn designated_alphabet(&self, height: u64) -> Vec<PublicKey>;

    /// Committee keys in canonical order
    fn committee(&self) -> Vec<PublicKey>;

    /// Hash of the executing transaction
    fn tx_hash(&self) -> Hash256;
}

/// Result of a committed invocation
#[derive(Debug)]
pub struct Receipt<T> {
    pub value: T,
    pub events: Vec<Event>,
    /// Keys written or deleted
    pub writes: usize,
}

/// Per-transaction state handle
pub struct Context<'a> {
    overlay: Overlay<'a>,
    env: &'a dyn Environment,
    events: Vec<Event>,
    read_only: bool,
}

impl<'a> Context<'a> {
    pub fn new(store: &'a dyn KvStore, env: &'a dyn Environment) -> Self {
        Self {
            overlay: Overlay::new(store),
            env,
            events: Vec::new(),
            read_only: false,
        }
    }

    /// Context that rejects writes and notifications
    pub fn read_only(store: &'a dyn KvStore, env: &'a dyn Environment) -> Self {
        Self {
            read_only: true,
            ..Self::new(store, env)
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    // === Storage ===

    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.overlay.get(key)
    }

    pub fn get_decoded<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>> {
        self.get(key).map(|raw| codec::decode(&raw)).transpose()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    pub fn scan(&self, prefix: &[u8]) -> Entries {
        self.overlay.scan_prefix(prefix)
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) -> Result<()> {
        self.ensure_writable()?;
        self.overlay.put(key, value);
        Ok(())
    }

    pub fn put_encoded<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> Result<()> {
        let raw = codec::encode(value)?;
        self.put(key, raw)
    }

    pub fn delete(&mut self, key: Vec<u8>) -> Result<()> {
        self.ensure_writable()?;
        self.overlay.delete(key);
        Ok(())
    }

    pub fn notify(&mut self, contract: Address, notification: Notification) -> Result<()> {
        self.ensure_writable()?;
        debug!(event = notification.name(), contract = %contract, "notification");
        self.events.push(Event {
            contract,
            notification,
        });
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(GovError::ReadOnly);
        }
        Ok(())
    }

    // === Host ===

    pub fn block_height(&self) -> u64 {
        self.env.block_height()
    }

    pub fn tx_hash(&self) -> Hash256 {
        self.env.tx_hash()
    }

    pub fn check_witness(&self, address: &Address) -> bool {
        self.env.witness().verify(address)
    }

    /// Alphabet designated for the next block
    pub fn alphabet_keys(&self) -> Vec<PublicKey> {
        self.env.designated_alphabet(self.env.block_height() + 1)
    }

    pub fn committee_keys(&self) -> Vec<PublicKey> {
        self.env.committee()
    }

    pub fn alphabet_address(&self) -> Address {
        derive_multisig_address(&self.alphabet_keys(), ThresholdMode::Alphabet)
    }

    pub fn committee_address(&self) -> Address {
        derive_multisig_address(&self.committee_keys(), ThresholdMode::Committee)
    }

    pub fn is_alphabet_key(&self, key: &PublicKey) -> bool {
        self.alphabet_keys().contains(key)
    }

    pub fn require_witness(&self, address: &Address, op: &str) -> Result<()> {
        if !self.check_witness(address) {
            return Err(GovError::AuthorizationFailure(format!(
                "{}: witness check failed for {}",
                op, address
            )));
        }
        Ok(())
    }

    pub fn require_alphabet(&self, op: &str) -> Result<()> {
        if !self.check_witness(&self.alphabet_address()) {
            return Err(GovError::AuthorizationFailure(format!(
                "{}: alphabet witness check failed",
                op
            )));
        }
        Ok(())
    }

    pub fn require_committee(&self, op: &str) -> Result<()> {
        if !self.check_witness(&self.committee_address()) {
            return Err(GovError::AuthorizationFailure(format!(
                "{}: committee witness check failed",
                op
            )));
        }
        Ok(())
    }

    fn finish(self) -> (crate::store::WriteBatch, Vec<Event>) {
        (self.overlay.into_batch(), self.events)
    }
}

/// Run `op` as one all-or-nothing transaction
pub fn invoke<T, F>(store: &dyn KvStore, env: &dyn Environment, op: F) -> Result<Receipt<T>>
where
    F: FnOnce(&mut Context<'_>) -> Result<T>,
{
    let mut ctx = Context::new(store, env);
    match op(&mut ctx) {
        Ok(value) => {
            let (batch, events) = ctx.finish();
            let writes = batch.len();
            store.apply(batch);
            debug!(writes, events = events.len(), "invocation committed");
            Ok(Receipt {
                value,
                events,
                writes,
            })
        }
        Err(err) => {
            debug!(error = %err, code = err.code(), "invocation aborted");
            Err(err)
        }
    }
}

/// Run a read-only accessor
pub fn query<T, F>(store: &dyn KvStore, env: &dyn Environment, op: F) -> Result<T>
where
    F: FnOnce(&Context<'_>) -> Result<T>,
{
    let ctx = Context::read_only(store, env);
    op(&ctx)
}
