//! # Inner Ring Processor
//!
//! Off-chain reactor that turns contract notifications into Alphabet
//! transactions:
//!
//! ```text
//! gateway  Deposit{from, amount, receiver, tx}  ──► balance.Mint(receiver, amount, tx)
//! gateway  Withdraw{user, amount, tx}           ──► balance.Lock(tx, user → custody)
//!                                                   balance.Cheque(tx)
//!                                                   balance.Burn(custody, amount)
//!                                                   gateway.Cheque(tx, user)
//! netmap   NewEpoch{n}                          ──► container.StopEstimation(n - 2)
//!                                                   container.StartEstimation(n - 1)
//! ```
//!
//! Every reaction is a single transaction, so a withdrawal either settles
//! completely or leaves no trace. Replayed deposits are refused by the
//! ledger's transaction-details guard and skipped.

use lode_contracts::{lock_account, ContractSet, WindowState};
use lode_core::constants::config_keys;
use lode_core::{Epoch, Event, GovError, Notification};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::chain::{LocalChain, Signer};
use crate::error::{NodeError, Result};

/// Outcome counters of one processing pass
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProcessStats {
    pub deposits: usize,
    pub withdrawals: usize,
    pub epochs: usize,
    pub skipped: usize,
    /// Notifications whose reaction transaction failed
    pub failed: usize,
}

/// Reactor bound to one deployed contract suite
pub struct InnerRingProcessor {
    contracts: ContractSet,
    stats: ProcessStats,
}

impl InnerRingProcessor {
    pub fn new(contracts: ContractSet) -> Self {
        Self {
            contracts,
            stats: ProcessStats::default(),
        }
    }

    pub fn stats(&self) -> &ProcessStats {
        &self.stats
    }

    /// Handle pending notifications until the chain goes quiet
    ///
    /// A failed reaction is logged and counted; later notifications in the
    /// queue are still processed.
    pub fn run(&mut self, chain: &mut LocalChain) -> usize {
        let mut handled = 0;
        loop {
            let batch = chain.take_pending();
            if batch.is_empty() {
                return handled;
            }
            for event in &batch {
                if let Err(e) = self.handle(chain, event) {
                    self.stats.failed += 1;
                    error!(
                        event = event.notification.name(),
                        code = e.code(),
                        error = %e,
                        "notification not processed"
                    );
                }
                handled += 1;
            }
        }
    }

    /// React to one notification
    pub fn handle(&mut self, chain: &mut LocalChain, event: &Event) -> Result<()> {
        let c = self.contracts;
        match &event.notification {
            Notification::Deposit {
                amount,
                receiver,
                tx_hash,
                ..
            } if event.contract == c.gateway.hash() => self.on_deposit(chain, *receiver, *amount, tx_hash),
            Notification::Withdraw {
                user,
                amount,
                tx_hash,
            } if event.contract == c.gateway.hash() => self.on_withdraw(chain, *user, *amount, tx_hash),
            Notification::NewEpoch { epoch } if event.contract == c.netmap.hash() => {
                self.on_new_epoch(chain, *epoch)
            }
            _ => Ok(()),
        }
    }

    fn on_deposit(
        &mut self,
        chain: &mut LocalChain,
        receiver: lode_crypto::Address,
        amount: u128,
        tx_hash: &[u8; 32],
    ) -> Result<()> {
        let balance = self.contracts.balance;
        match chain.invoke("balance.mint", Signer::Alphabet, |ctx| {
            balance.mint(ctx, receiver, amount, tx_hash)
        }) {
            Ok(_) => {
                self.stats.deposits += 1;
                info!(receiver = %receiver, amount, "deposit minted");
                Ok(())
            }
            Err(GovError::Conflict(reason)) => {
                self.stats.skipped += 1;
                warn!(tx = %hex::encode(tx_hash), %reason, "deposit already processed");
                Ok(())
            }
            Err(e) => Err(NodeError::contract("balance.mint", e)),
        }
    }

    fn on_withdraw(
        &mut self,
        chain: &mut LocalChain,
        user: lode_crypto::Address,
        amount: u128,
        tx_hash: &[u8; 32],
    ) -> Result<()> {
        let c = self.contracts;
        let id = tx_hash.to_vec();
        let mut burn_details = b"withdraw:".to_vec();
        burn_details.extend_from_slice(tx_hash);

        let lock_epochs = chain
            .query(|ctx| c.netmap.config_amount(ctx, config_keys::WITHDRAW_LOCK_EPOCHS))
            .map_err(|e| NodeError::contract("netmap.config", e))?;
        let lock_epochs = Epoch::try_from(lock_epochs).unwrap_or(Epoch::MAX).max(1);

        let result = chain.invoke("withdraw", Signer::Alphabet, |ctx| {
            let custody = ctx.alphabet_address();
            let escrow = lock_account(&id);
            let until = c.netmap.epoch(ctx)?.saturating_add(lock_epochs);
            c.balance.lock(ctx, &id, user, custody, amount, until)?;
            c.balance.cheque(ctx, &id, custody, amount, escrow)?;
            c.balance.burn(ctx, custody, amount, &burn_details)?;
            c.gateway.cheque(ctx, &id, user, amount, escrow)
        });
        match result {
            Ok(_) => {
                self.stats.withdrawals += 1;
                info!(user = %user, amount, "withdrawal settled");
                Ok(())
            }
            Err(e @ (GovError::Conflict(_) | GovError::AlreadyResolved(_))) => {
                self.stats.skipped += 1;
                warn!(tx = %hex::encode(tx_hash), error = %e, "withdrawal already processed");
                Ok(())
            }
            Err(e) => Err(NodeError::contract("withdraw", e)),
        }
    }

    fn on_new_epoch(&mut self, chain: &mut LocalChain, epoch: Epoch) -> Result<()> {
        let container = self.contracts.container;
        if let Some(stale) = epoch.checked_sub(2) {
            let window = chain
                .query(|ctx| container.estimation_window(ctx, stale))
                .map_err(|e| NodeError::contract("container.estimationWindow", e))?;
            if window == Some(WindowState::Open) {
                chain
                    .invoke("container.stopEstimation", Signer::Alphabet, |ctx| {
                        container.stop_estimation(ctx, stale)
                    })
                    .map_err(|e| NodeError::contract("container.stopEstimation", e))?;
            }
        }
        if let Some(previous) = epoch.checked_sub(1) {
            let window = chain
                .query(|ctx| container.estimation_window(ctx, previous))
                .map_err(|e| NodeError::contract("container.estimationWindow", e))?;
            if window.is_none() {
                chain
                    .invoke("container.startEstimation", Signer::Alphabet, |ctx| {
                        container.start_estimation(ctx, previous)
                    })
                    .map_err(|e| NodeError::contract("container.startEstimation", e))?;
            }
        }
        self.stats.epochs += 1;
        debug!(epoch, "epoch processed");
        Ok(())
    }
}

/// Advance the netmap by one epoch with the Alphabet signature
pub fn tick_epoch(chain: &mut LocalChain, contracts: &ContractSet) -> Result<Epoch> {
    let netmap = contracts.netmap;
    let next = chain
        .query(|ctx| netmap.epoch(ctx))
        .map_err(|e| NodeError::contract("netmap.epoch", e))?
        + 1;
    chain
        .invoke("netmap.newEpoch", Signer::Alphabet, |ctx| netmap.new_epoch(ctx, next))
        .map_err(|e| NodeError::contract("netmap.newEpoch", e))?;
    Ok(next)
}
