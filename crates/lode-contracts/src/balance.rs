//! # Balance - Internal Token Ledger
//!
//! Account-based ledger for the LODE token with timed escrow.
//!
//! ## Invariants
//!
//! - Σ balances == total supply == minted − burned, after every call
//! - No account ever goes negative; a failed debit aborts the whole call
//! - Escrowed funds sit on a derived lock account, so they still count
//!   towards the sum
//! - Each lock is resolved exactly once: by `cheque` or by reclaim
//!
//! ## Escrow
//!
//! ```text
//! lock(id, from, to, amount, until)     from ──amount──► lock account(id)
//!   ├── cheque(id, to, amount, lockAcc)  lock account ──► to      (Settled)
//!   └── reclaim(id) once epoch >= until  lock account ──► from    (Reclaimed)
//! ```

use lode_core::constants::{DECIMALS, SYMBOL};
use lode_core::{codec, Amount, Context, Epoch, GovError, Namespace, Notification, Result};
use lode_crypto::{hash_blake3, Address};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::common::{self, Link, Migration};
use crate::netmap::NetmapContract;

const ACCOUNT_TABLE: u8 = 0x01;
const SUPPLY_TABLE: u8 = 0x02;
const DETAILS_TABLE: u8 = 0x03;
const LOCK_TABLE: u8 = 0x04;
const PENDING_TABLE: u8 = 0x05;

const SUPPLY_KEY: &[u8] = b"total";

const LOCK_ACCOUNT_TAG: &[u8] = b"lode/lock";

/// Escrow resolution state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LockStatus {
    Pending,
    /// Paid out by a cheque
    Settled,
    /// Returned to the sender after expiry
    Reclaimed,
}

/// Escrow record keyed by its transaction details
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    #[serde(with = "serde_bytes")]
    pub id: Vec<u8>,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
    pub until: Epoch,
    pub status: LockStatus,
}

/// Account holding the funds of escrow `id`
pub fn lock_account(id: &[u8]) -> Address {
    let mut script = Vec::with_capacity(LOCK_ACCOUNT_TAG.len() + id.len());
    script.extend_from_slice(LOCK_ACCOUNT_TAG);
    script.extend_from_slice(id);
    Address::from_script(&script)
}

/// Handle to a deployed balance contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BalanceContract {
    hash: Address,
}

impl BalanceContract {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    fn ns(&self, table: u8) -> Namespace {
        Namespace::new(&self.hash, table)
    }

    fn netmap(&self, ctx: &Context<'_>) -> Result<NetmapContract> {
        Ok(NetmapContract::at(common::link(ctx, &self.hash, Link::Netmap)?))
    }

    pub(crate) fn deploy(&self, ctx: &mut Context<'_>, netmap: Address) -> Result<()> {
        common::install(ctx, &self.hash, &[(Link::Netmap, netmap)])?;
        ctx.put_encoded(self.ns(SUPPLY_TABLE).key(&[SUPPLY_KEY]), &Amount::from(0u8))
    }

    // === Accessors ===

    pub fn symbol(&self) -> &'static str {
        SYMBOL
    }

    pub fn decimals(&self) -> u32 {
        DECIMALS
    }

    /// Running mint − burn accumulator
    pub fn total_supply(&self, ctx: &Context<'_>) -> Result<Amount> {
        Ok(ctx
            .get_decoded(&self.ns(SUPPLY_TABLE).key(&[SUPPLY_KEY]))?
            .unwrap_or(0))
    }

    pub fn balance_of(&self, ctx: &Context<'_>, account: &Address) -> Result<Amount> {
        Ok(ctx
            .get_decoded(&self.ns(ACCOUNT_TABLE).key(&[account.as_bytes()]))?
            .unwrap_or(0))
    }

    /// Every account with a non-zero balance, lock accounts included
    pub fn accounts(&self, ctx: &Context<'_>) -> Result<Vec<(Address, Amount)>> {
        let ns = self.ns(ACCOUNT_TABLE);
        ctx.scan(ns.prefix())
            .into_iter()
            .map(|(key, raw)| {
                let account = Address::from_slice(ns.strip(&key).unwrap_or_default())?;
                Ok((account, codec::decode(&raw)?))
            })
            .collect()
    }

    pub fn lock_info(&self, ctx: &Context<'_>, id: &[u8]) -> Result<LockRecord> {
        ctx.get_decoded(&self.ns(LOCK_TABLE).key(&[id]))?
            .ok_or_else(|| GovError::NotFound(format!("lock {}", hex::encode(id))))
    }

    // === Supply ===

    pub fn mint(&self, ctx: &mut Context<'_>, to: Address, amount: Amount, tx_details: &[u8]) -> Result<()> {
        ctx.require_alphabet("mint")?;
        require_positive(amount, "mint")?;
        self.record_details(ctx, tx_details)?;

        self.credit(ctx, &to, amount)?;
        let supply = self.total_supply(ctx)?;
        let supply = supply
            .checked_add(amount)
            .ok_or_else(|| GovError::InvalidArgument("total supply overflow".into()))?;
        self.set_supply(ctx, supply)?;

        info!(to = %to, amount, supply, "minted");
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: None,
                to: Some(to),
                amount,
            },
        )?;
        ctx.notify(self.hash, Notification::Mint { to, amount })
    }

    pub fn burn(&self, ctx: &mut Context<'_>, from: Address, amount: Amount, tx_details: &[u8]) -> Result<()> {
        ctx.require_alphabet("burn")?;
        require_positive(amount, "burn")?;
        self.record_details(ctx, tx_details)?;

        self.debit(ctx, &from, amount)?;
        let supply = self.total_supply(ctx)?.saturating_sub(amount);
        self.set_supply(ctx, supply)?;

        info!(from = %from, amount, supply, "burned");
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: Some(from),
                to: None,
                amount,
            },
        )?;
        ctx.notify(self.hash, Notification::Burn { from, amount })
    }

    // === Transfers ===

    /// Move funds; authorized by `from` or by the Alphabet
    ///
    /// `data` is an opaque payload passed through by the caller.
    pub fn transfer(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        amount: Amount,
        data: &[u8],
    ) -> Result<()> {
        if !ctx.check_witness(&from) && !ctx.check_witness(&ctx.alphabet_address()) {
            return Err(GovError::AuthorizationFailure(format!(
                "transfer: witness check failed for {}",
                from
            )));
        }
        self.move_funds(ctx, &from, &to, amount)?;
        debug!(from = %from, to = %to, amount, data = data.len(), "transfer");
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: Some(from),
                to: Some(to),
                amount,
            },
        )
    }

    /// Alphabet transfer carrying settlement details
    pub fn transfer_x(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        amount: Amount,
        details: &[u8],
    ) -> Result<()> {
        ctx.require_alphabet("transferX")?;
        self.transfer_with_details(ctx, from, to, amount, details.to_vec())
    }

    /// Fee collection on behalf of another contract of the suite
    pub(crate) fn charge(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        amount: Amount,
        details: Vec<u8>,
    ) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        self.transfer_with_details(ctx, from, to, amount, details)
    }

    fn transfer_with_details(
        &self,
        ctx: &mut Context<'_>,
        from: Address,
        to: Address,
        amount: Amount,
        details: Vec<u8>,
    ) -> Result<()> {
        self.move_funds(ctx, &from, &to, amount)?;
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: Some(from),
                to: Some(to),
                amount,
            },
        )?;
        ctx.notify(
            self.hash,
            Notification::TransferX {
                from,
                to,
                amount,
                details,
            },
        )
    }

    // === Escrow ===

    /// Debit `from` into escrow until `until`
    pub fn lock(
        &self,
        ctx: &mut Context<'_>,
        id: &[u8],
        from: Address,
        to: Address,
        amount: Amount,
        until: Epoch,
    ) -> Result<()> {
        ctx.require_alphabet("lock")?;
        require_positive(amount, "lock")?;
        if id.is_empty() {
            return Err(GovError::InvalidArgument("lock: empty id".into()));
        }
        let key = self.ns(LOCK_TABLE).key(&[id]);
        if ctx.contains(&key) {
            return Err(GovError::Conflict(format!("lock {} already exists", hex::encode(id))));
        }
        let epoch = self.netmap(ctx)?.epoch(ctx)?;
        if until <= epoch {
            return Err(GovError::InvalidArgument(format!(
                "lock: bound {} is not after current epoch {}",
                until, epoch
            )));
        }

        let escrow = lock_account(id);
        self.move_funds(ctx, &from, &escrow, amount)?;
        let record = LockRecord {
            id: id.to_vec(),
            from,
            to,
            amount,
            until,
            status: LockStatus::Pending,
        };
        ctx.put_encoded(key, &record)?;
        ctx.put(self.pending_key(until, id), Vec::new())?;

        info!(id = %hex::encode(id), from = %from, amount, until, "funds locked");
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: Some(from),
                to: Some(escrow),
                amount,
            },
        )?;
        ctx.notify(
            self.hash,
            Notification::Lock {
                id: id.to_vec(),
                from,
                to,
                amount,
                until,
            },
        )
    }

    /// Settle escrow `id` to its beneficiary
    pub fn cheque(
        &self,
        ctx: &mut Context<'_>,
        id: &[u8],
        user: Address,
        amount: Amount,
        lock_account_addr: Address,
    ) -> Result<()> {
        ctx.require_alphabet("cheque")?;
        let mut record = self.pending_lock(ctx, id)?;
        if lock_account_addr != lock_account(id) {
            return Err(GovError::InvalidArgument(format!(
                "cheque: {} is not the lock account of {}",
                lock_account_addr,
                hex::encode(id)
            )));
        }
        if user != record.to {
            return Err(GovError::InvalidArgument(format!(
                "cheque: {} is not the beneficiary of {}",
                user,
                hex::encode(id)
            )));
        }
        if amount != record.amount {
            return Err(GovError::AmountMismatch {
                expected: record.amount,
                got: amount,
            });
        }

        self.move_funds(ctx, &lock_account_addr, &user, amount)?;
        record.status = LockStatus::Settled;
        self.close_lock(ctx, &record)?;

        info!(id = %hex::encode(id), user = %user, amount, "cheque settled");
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: Some(lock_account_addr),
                to: Some(user),
                amount,
            },
        )?;
        ctx.notify(
            self.hash,
            Notification::Cheque {
                id: id.to_vec(),
                user,
                amount,
                lock_account: lock_account_addr,
            },
        )
    }

    /// Return expired escrow `id` to its sender; callable by anyone
    pub fn reclaim(&self, ctx: &mut Context<'_>, id: &[u8]) -> Result<()> {
        let record = self.pending_lock(ctx, id)?;
        let epoch = self.netmap(ctx)?.epoch(ctx)?;
        if epoch < record.until {
            return Err(GovError::LockActive {
                until: record.until,
                epoch,
            });
        }
        self.unlock(ctx, record)
    }

    /// Expiry sweep run by the netmap on every epoch advance
    ///
    /// Only locks whose bound lies strictly before `epoch` are returned, so
    /// during epoch `until` itself the sender may still `reclaim` by hand.
    pub(crate) fn new_epoch(&self, ctx: &mut Context<'_>, epoch: Epoch) -> Result<()> {
        let ns = self.ns(PENDING_TABLE);
        let mut expired = Vec::new();
        for (key, _) in ctx.scan(ns.prefix()) {
            let suffix = ns.strip(&key).unwrap_or_default();
            if suffix.len() < 8 {
                continue;
            }
            let (until, id) = suffix.split_at(8);
            let mut bound = [0u8; 8];
            bound.copy_from_slice(until);
            if u64::from_be_bytes(bound) >= epoch {
                break;
            }
            expired.push(id.to_vec());
        }

        for id in &expired {
            let record = self.pending_lock(ctx, id)?;
            self.unlock(ctx, record)?;
        }
        if !expired.is_empty() {
            info!(epoch, count = expired.len(), "expired locks returned");
        }
        Ok(())
    }

    fn unlock(&self, ctx: &mut Context<'_>, mut record: LockRecord) -> Result<()> {
        let escrow = lock_account(&record.id);
        self.move_funds(ctx, &escrow, &record.from, record.amount)?;
        record.status = LockStatus::Reclaimed;
        self.close_lock(ctx, &record)?;

        info!(id = %hex::encode(&record.id), user = %record.from, amount = record.amount, "lock reclaimed");
        ctx.notify(
            self.hash,
            Notification::Transfer {
                from: Some(escrow),
                to: Some(record.from),
                amount: record.amount,
            },
        )?;
        ctx.notify(
            self.hash,
            Notification::Unlock {
                id: record.id,
                user: record.from,
                amount: record.amount,
            },
        )
    }

    fn pending_lock(&self, ctx: &Context<'_>, id: &[u8]) -> Result<LockRecord> {
        let record = self.lock_info(ctx, id)?;
        if record.status != LockStatus::Pending {
            return Err(GovError::AlreadyResolved(format!(
                "lock {} is {:?}",
                hex::encode(id),
                record.status
            )));
        }
        Ok(record)
    }

    fn close_lock(&self, ctx: &mut Context<'_>, record: &LockRecord) -> Result<()> {
        ctx.put_encoded(self.ns(LOCK_TABLE).key(&[&record.id]), record)?;
        ctx.delete(self.pending_key(record.until, &record.id))
    }

    fn pending_key(&self, until: Epoch, id: &[u8]) -> Vec<u8> {
        self.ns(PENDING_TABLE).key(&[&until.to_be_bytes(), id])
    }

    // === Internals ===

    /// Idempotence guard for external deposit / withdrawal events
    fn record_details(&self, ctx: &mut Context<'_>, tx_details: &[u8]) -> Result<()> {
        if tx_details.is_empty() {
            return Err(GovError::InvalidArgument("empty transaction details".into()));
        }
        let key = self.ns(DETAILS_TABLE).key(&[&hash_blake3(tx_details)]);
        if ctx.contains(&key) {
            warn!(details = %hex::encode(tx_details), "duplicate transaction details");
            return Err(GovError::Conflict(format!(
                "transaction details {} already processed",
                hex::encode(tx_details)
            )));
        }
        ctx.put(key, Vec::new())
    }

    fn move_funds(&self, ctx: &mut Context<'_>, from: &Address, to: &Address, amount: Amount) -> Result<()> {
        self.debit(ctx, from, amount)?;
        self.credit(ctx, to, amount)
    }

    fn debit(&self, ctx: &mut Context<'_>, account: &Address, amount: Amount) -> Result<()> {
        let available = self.balance_of(ctx, account)?;
        if available < amount {
            return Err(GovError::InsufficientBalance {
                required: amount,
                available,
            });
        }
        self.set_balance(ctx, account, available - amount)
    }

    fn credit(&self, ctx: &mut Context<'_>, account: &Address, amount: Amount) -> Result<()> {
        let balance = self
            .balance_of(ctx, account)?
            .checked_add(amount)
            .ok_or_else(|| GovError::InvalidArgument("balance overflow".into()))?;
        self.set_balance(ctx, account, balance)
    }

    fn set_balance(&self, ctx: &mut Context<'_>, account: &Address, balance: Amount) -> Result<()> {
        let key = self.ns(ACCOUNT_TABLE).key(&[account.as_bytes()]);
        if balance == 0 {
            ctx.delete(key)
        } else {
            ctx.put_encoded(key, &balance)
        }
    }

    fn set_supply(&self, ctx: &mut Context<'_>, supply: Amount) -> Result<()> {
        ctx.put_encoded(self.ns(SUPPLY_TABLE).key(&[SUPPLY_KEY]), &supply)
    }

    // === Maintenance ===

    pub fn version(&self, ctx: &Context<'_>) -> Result<u32> {
        common::version(ctx, &self.hash)
    }

    pub fn update(&self, ctx: &mut Context<'_>, migration: &Migration) -> Result<()> {
        ctx.require_committee("update")?;
        common::apply_update(ctx, &self.hash, migration)
    }
}

fn require_positive(amount: Amount, op: &str) -> Result<()> {
    if amount == 0 {
        return Err(GovError::InvalidArgument(format!("{}: zero amount", op)));
    }
    Ok(())
}
