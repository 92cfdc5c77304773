//! Reputation ledger
//!
//! Append-only log of opaque trust values reported by peers about peers,
//! one bucket per epoch. Corrections are new entries in a later epoch.

use lode_core::{codec, Context, Epoch, GovError, Namespace, Result};
use lode_crypto::{Address, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{self, Migration};

const VALUE_TABLE: u8 = 0x01;

/// Length of an entry id: epoch (8) || peer key (32) || sequence (4)
pub const REPUTATION_ID_SIZE: usize = 44;

/// One reported value
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationEntry {
    pub epoch: Epoch,
    pub peer: PublicKey,
    pub reporter: PublicKey,
    #[serde(with = "serde_bytes")]
    pub value: Vec<u8>,
}

/// Handle to a deployed reputation contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReputationContract {
    hash: Address,
}

impl ReputationContract {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    fn values(&self) -> Namespace {
        Namespace::new(&self.hash, VALUE_TABLE)
    }

    pub(crate) fn deploy(&self, ctx: &mut Context<'_>) -> Result<()> {
        common::install(ctx, &self.hash, &[])
    }

    /// Append `value` about `peer`; returns the entry id
    pub fn put(
        &self,
        ctx: &mut Context<'_>,
        epoch: Epoch,
        peer: PublicKey,
        value: Vec<u8>,
        reporter: PublicKey,
    ) -> Result<Vec<u8>> {
        ctx.require_witness(&reporter.address(), "putReputation")?;
        let ns = self.values();
        let bucket = ns.key(&[&epoch.to_be_bytes(), peer.as_bytes()]);
        let seq = ctx.scan(&bucket).len() as u32;

        let mut id = Vec::with_capacity(REPUTATION_ID_SIZE);
        id.extend_from_slice(&epoch.to_be_bytes());
        id.extend_from_slice(peer.as_bytes());
        id.extend_from_slice(&seq.to_be_bytes());

        let entry = ReputationEntry {
            epoch,
            peer,
            reporter,
            value,
        };
        ctx.put_encoded(ns.key(&[&id]), &entry)?;
        debug!(epoch, peer = %peer, reporter = %reporter, seq, "reputation recorded");
        Ok(id)
    }

    /// Values reported about `peer` in `epoch`, in submission order
    pub fn get(&self, ctx: &Context<'_>, epoch: Epoch, peer: &PublicKey) -> Result<Vec<Vec<u8>>> {
        let bucket = self.values().key(&[&epoch.to_be_bytes(), peer.as_bytes()]);
        ctx.scan(&bucket)
            .into_iter()
            .map(|(_, raw)| Ok(codec::decode::<ReputationEntry>(&raw)?.value))
            .collect()
    }

    pub fn get_by_id(&self, ctx: &Context<'_>, id: &[u8]) -> Result<ReputationEntry> {
        if id.len() != REPUTATION_ID_SIZE {
            return Err(GovError::InvalidArgument(format!(
                "reputation id must be {} bytes, got {}",
                REPUTATION_ID_SIZE,
                id.len()
            )));
        }
        ctx.get_decoded(&self.values().key(&[id]))?
            .ok_or_else(|| GovError::NotFound(format!("reputation entry {}", hex::encode(id))))
    }

    /// Entry ids of `epoch`
    pub fn list_by_epoch(&self, ctx: &Context<'_>, epoch: Epoch) -> Vec<Vec<u8>> {
        let ns = self.values();
        ctx.scan(&ns.key(&[&epoch.to_be_bytes()]))
            .into_iter()
            .filter_map(|(key, _)| ns.strip(&key).map(<[u8]>::to_vec))
            .collect()
    }

    pub fn version(&self, ctx: &Context<'_>) -> Result<u32> {
        common::version(ctx, &self.hash)
    }

    pub fn update(&self, ctx: &mut Context<'_>, migration: &Migration) -> Result<()> {
        ctx.require_alphabet("update")?;
        common::apply_update(ctx, &self.hash, migration)
    }
}
