//! # Mainchain Gateway
//!
//! Contract on the main chain that takes custody of deposited tokens and
//! hands requests over to the Inner Ring through notifications:
//!
//! ```text
//! user ──payment──► OnPayment ──Deposit──► Inner Ring ──Mint──► sidechain
//! user ──────────► Withdraw  ──Withdraw─► Inner Ring ──Lock/Cheque/Burn──► sidechain
//! Inner Ring ─────► Cheque    (custody paid back to the user)
//! ```
//!
//! The main chain has no role designation for the sidechain Alphabet, so the
//! gateway keeps its own copy of the Alphabet keys and derives the
//! multisignature address from it.

use lode_core::{Amount, Context, GovError, Namespace, Notification, Result};
use lode_crypto::{derive_multisig_address, Address, PublicKey, ThresholdMode};
use tracing::info;

use crate::common::{self, Migration};
use crate::config::ConfigTable;

const STATE_TABLE: u8 = 0x01;
const CHEQUE_TABLE: u8 = 0x02;
const CANDIDATE_TABLE: u8 = 0x03;
const CONFIG_TABLE: u8 = 0x04;

const ALPHABET_KEY: &[u8] = b"alphabet";
const CUSTODY_KEY: &[u8] = b"custody";

/// Handle to the deployed gateway
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MainchainGateway {
    hash: Address,
}

impl MainchainGateway {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    fn ns(&self, table: u8) -> Namespace {
        Namespace::new(&self.hash, table)
    }

    fn config_table(&self) -> ConfigTable {
        ConfigTable::new(&self.hash, CONFIG_TABLE)
    }

    pub(crate) fn deploy(&self, ctx: &mut Context<'_>, alphabet: &[PublicKey]) -> Result<()> {
        if alphabet.is_empty() {
            return Err(GovError::InvalidArgument("gateway: empty alphabet".into()));
        }
        common::install(ctx, &self.hash, &[])?;
        ctx.put_encoded(self.ns(STATE_TABLE).key(&[ALPHABET_KEY]), &alphabet.to_vec())?;
        ctx.put_encoded(self.ns(STATE_TABLE).key(&[CUSTODY_KEY]), &Amount::from(0u8))
    }

    // === Alphabet ===

    pub fn alphabet_list(&self, ctx: &Context<'_>) -> Result<Vec<PublicKey>> {
        ctx.get_decoded(&self.ns(STATE_TABLE).key(&[ALPHABET_KEY]))?
            .ok_or_else(|| GovError::NotFound("gateway is not deployed".into()))
    }

    pub fn alphabet_address(&self, ctx: &Context<'_>) -> Result<Address> {
        Ok(derive_multisig_address(&self.alphabet_list(ctx)?, ThresholdMode::Alphabet))
    }

    fn require_alphabet(&self, ctx: &Context<'_>, op: &str) -> Result<()> {
        if !ctx.check_witness(&self.alphabet_address(ctx)?) {
            return Err(GovError::AuthorizationFailure(format!(
                "{}: alphabet witness check failed",
                op
            )));
        }
        Ok(())
    }

    /// Rotate the stored Alphabet; at most ⌊n/3⌋ keys change per call
    pub fn alphabet_update(&self, ctx: &mut Context<'_>, id: &[u8], alphabet: Vec<PublicKey>) -> Result<()> {
        self.require_alphabet(ctx, "alphabetUpdate")?;
        if alphabet.is_empty() {
            return Err(GovError::InvalidArgument("alphabetUpdate: empty alphabet".into()));
        }
        let current = self.alphabet_list(ctx)?;
        let replaced = current.iter().filter(|k| !alphabet.contains(k)).count();
        let allowed = current.len() / 3;
        if replaced > allowed {
            return Err(GovError::InvalidArgument(format!(
                "alphabetUpdate: {} keys replaced, at most {} allowed",
                replaced, allowed
            )));
        }
        ctx.put_encoded(self.ns(STATE_TABLE).key(&[ALPHABET_KEY]), &alphabet)?;
        info!(size = alphabet.len(), replaced, "alphabet updated");
        ctx.notify(
            self.hash,
            Notification::AlphabetUpdate {
                id: id.to_vec(),
                alphabet,
            },
        )
    }

    // === Custody ===

    /// Tokens held by the gateway
    pub fn custody(&self, ctx: &Context<'_>) -> Result<Amount> {
        Ok(ctx
            .get_decoded(&self.ns(STATE_TABLE).key(&[CUSTODY_KEY]))?
            .unwrap_or(0))
    }

    fn set_custody(&self, ctx: &mut Context<'_>, amount: Amount) -> Result<()> {
        ctx.put_encoded(self.ns(STATE_TABLE).key(&[CUSTODY_KEY]), &amount)
    }

    /// Payment callback; `receiver` defaults to the payer
    pub fn on_payment(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        amount: Amount,
        receiver: Option<Address>,
    ) -> Result<()> {
        ctx.require_witness(&from, "onPayment")?;
        if amount == 0 {
            return Err(GovError::InvalidArgument("onPayment: zero amount".into()));
        }
        let custody = self
            .custody(ctx)?
            .checked_add(amount)
            .ok_or_else(|| GovError::InvalidArgument("custody overflow".into()))?;
        self.set_custody(ctx, custody)?;

        let receiver = receiver.unwrap_or(from);
        let tx_hash = ctx.tx_hash();
        info!(from = %from, receiver = %receiver, amount, "deposit");
        ctx.notify(
            self.hash,
            Notification::Deposit {
                from,
                amount,
                receiver,
                tx_hash,
            },
        )
    }

    /// Ask the Inner Ring to move `amount` back to the main chain
    pub fn withdraw(&self, ctx: &mut Context<'_>, user: Address, amount: Amount) -> Result<()> {
        ctx.require_witness(&user, "withdraw")?;
        if amount == 0 {
            return Err(GovError::InvalidArgument("withdraw: zero amount".into()));
        }
        let custody = self.custody(ctx)?;
        if amount > custody {
            return Err(GovError::InsufficientBalance {
                required: amount,
                available: custody,
            });
        }
        let tx_hash = ctx.tx_hash();
        info!(user = %user, amount, "withdraw requested");
        ctx.notify(
            self.hash,
            Notification::Withdraw {
                user,
                amount,
                tx_hash,
            },
        )
    }

    /// Pay out a settled withdrawal; each cheque id is honoured once
    pub fn cheque(
        &self,
        ctx: &mut Context<'_>,
        id: &[u8],
        user: Address,
        amount: Amount,
        lock_account: Address,
    ) -> Result<()> {
        self.require_alphabet(ctx, "cheque")?;
        let key = self.ns(CHEQUE_TABLE).key(&[id]);
        if ctx.contains(&key) {
            return Err(GovError::AlreadyResolved(format!("cheque {}", hex::encode(id))));
        }
        let custody = self.custody(ctx)?;
        if amount > custody {
            return Err(GovError::InsufficientBalance {
                required: amount,
                available: custody,
            });
        }
        self.set_custody(ctx, custody - amount)?;
        ctx.put(key, Vec::new())?;

        info!(id = %hex::encode(id), user = %user, amount, "cheque paid");
        ctx.notify(
            self.hash,
            Notification::Cheque {
                id: id.to_vec(),
                user,
                amount,
                lock_account,
            },
        )
    }

    // === Key binding ===

    pub fn bind(&self, ctx: &mut Context<'_>, user: Address, keys: Vec<PublicKey>) -> Result<()> {
        ctx.require_witness(&user, "bind")?;
        require_keys(&keys, "bind")?;
        ctx.notify(self.hash, Notification::Bind { user, keys })
    }

    pub fn unbind(&self, ctx: &mut Context<'_>, user: Address, keys: Vec<PublicKey>) -> Result<()> {
        ctx.require_witness(&user, "unbind")?;
        require_keys(&keys, "unbind")?;
        ctx.notify(self.hash, Notification::Unbind { user, keys })
    }

    // === Inner ring candidates ===

    pub fn inner_ring_candidate_add(&self, ctx: &mut Context<'_>, key: PublicKey) -> Result<()> {
        ctx.require_witness(&key.address(), "innerRingCandidateAdd")?;
        let entry = self.ns(CANDIDATE_TABLE).key(&[key.as_bytes()]);
        if ctx.contains(&entry) {
            return Err(GovError::Conflict(format!("candidate {} already listed", key)));
        }
        info!(candidate = %key, "inner ring candidate added");
        ctx.put(entry, Vec::new())
    }

    /// Removal by the candidate itself or by the Alphabet
    pub fn inner_ring_candidate_remove(&self, ctx: &mut Context<'_>, key: PublicKey) -> Result<()> {
        if !ctx.check_witness(&key.address()) {
            self.require_alphabet(ctx, "innerRingCandidateRemove")?;
        }
        let entry = self.ns(CANDIDATE_TABLE).key(&[key.as_bytes()]);
        if !ctx.contains(&entry) {
            return Err(GovError::NotFound(format!("candidate {}", key)));
        }
        info!(candidate = %key, "inner ring candidate removed");
        ctx.delete(entry)
    }

    pub fn inner_ring_candidates(&self, ctx: &Context<'_>) -> Result<Vec<PublicKey>> {
        let ns = self.ns(CANDIDATE_TABLE);
        ctx.scan(ns.prefix())
            .into_iter()
            .map(|(key, _)| Ok(PublicKey::from_slice(ns.strip(&key).unwrap_or_default())?))
            .collect()
    }

    // === Configuration mirror ===

    pub fn config(&self, ctx: &Context<'_>, key: &[u8]) -> Option<Vec<u8>> {
        self.config_table().get(ctx, key)
    }

    pub fn list_config(&self, ctx: &Context<'_>) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.config_table().list(ctx)
    }

    pub fn set_config(&self, ctx: &mut Context<'_>, id: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        self.require_alphabet(ctx, "setConfig")?;
        self.config_table().set(ctx, key, value)?;
        ctx.notify(
            self.hash,
            Notification::SetConfig {
                id: id.to_vec(),
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )
    }

    pub fn init_config(&self, ctx: &mut Context<'_>, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        self.require_alphabet(ctx, "initConfig")?;
        self.config_table().init(ctx, entries)
    }

    // === Maintenance ===

    pub fn version(&self, ctx: &Context<'_>) -> Result<u32> {
        common::version(ctx, &self.hash)
    }

    pub fn update(&self, ctx: &mut Context<'_>, migration: &Migration) -> Result<()> {
        self.require_alphabet(ctx, "update")?;
        common::apply_update(ctx, &self.hash, migration)
    }
}

fn require_keys(keys: &[PublicKey], op: &str) -> Result<()> {
    if keys.is_empty() {
        return Err(GovError::InvalidArgument(format!("{}: no keys given", op)));
    }
    Ok(())
}
