//! # Netmap - Epoch Engine
//!
//! Tracks the global epoch, the candidate storage nodes and one immutable
//! network-map snapshot per epoch.
//!
//! ## Node Lifecycle
//!
//! ```text
//! AddPeer ──► Candidate(Online) ──UpdateState──► Maintenance | Offline
//!                  │                                   │
//!                  └────────── NewEpoch(n) ────────────┤
//!                        snapshot[n] = candidates      └─ Offline: evicted
//! ```
//!
//! State changes only show up in the snapshot built by the next `NewEpoch`;
//! stored snapshots are never rewritten.

use lode_core::{
    codec, Amount, Context, Epoch, GovError, Namespace, NodeState, Notification, Result,
};
use lode_core::constants::config_keys;
use lode_crypto::{Address, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::balance::BalanceContract;
use crate::common::{self, Link, Migration};
use crate::config::ConfigTable;

const EPOCH_TABLE: u8 = 0x01;
const CANDIDATE_TABLE: u8 = 0x02;
const SNAPSHOT_TABLE: u8 = 0x03;
const CONFIG_TABLE: u8 = 0x04;
const INNER_RING_TABLE: u8 = 0x05;

const EPOCH_KEY: &[u8] = b"current";
const RETENTION_KEY: &[u8] = b"retention";
const INNER_RING_KEY: &[u8] = b"list";

/// Node descriptor submitted by a storage node
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub public_key: PublicKey,
    /// Announced network endpoints
    pub addresses: Vec<String>,
    pub attributes: Vec<(String, String)>,
    /// Declared capacity in GiB
    pub capacity: u64,
}

impl NodeInfo {
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }
}

/// Entry of the candidate set or of a snapshot
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetmapNode {
    pub public_key: PublicKey,
    /// Raw node info exactly as submitted
    #[serde(with = "serde_bytes")]
    pub info: Vec<u8>,
    pub state: NodeState,
}

impl NetmapNode {
    pub fn node_info(&self) -> Result<NodeInfo> {
        codec::decode(&self.info)
    }
}

/// Handle to a deployed netmap contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetmapContract {
    hash: Address,
}

impl NetmapContract {
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

    fn balance(&self, ctx: &Context<'_>) -> Result<BalanceContract> {
        Ok(BalanceContract::at(common::link(ctx, &self.hash, Link::Balance)?))
    }

    /// Epoch 0 with an empty snapshot
    pub(crate) fn deploy(&self, ctx: &mut Context<'_>, balance: Address, retention: u64) -> Result<()> {
        if retention == 0 {
            return Err(GovError::InvalidArgument("snapshot retention must be at least 1".into()));
        }
        common::install(ctx, &self.hash, &[(Link::Balance, balance)])?;
        ctx.put_encoded(self.ns(EPOCH_TABLE).key(&[EPOCH_KEY]), &0u64)?;
        ctx.put_encoded(self.ns(EPOCH_TABLE).key(&[RETENTION_KEY]), &retention)?;
        ctx.put_encoded(snapshot_key(&self.ns(SNAPSHOT_TABLE), 0), &Vec::<NetmapNode>::new())?;
        Ok(())
    }

    // === Peers ===

    /// Self-registration of a storage node
    ///
    /// `signature` must be the node key's signature over `node_info`. A
    /// previously unseen node pays `PeerRegistrationFee` (if configured) to
    /// the Alphabet.
    pub fn add_peer(&self, ctx: &mut Context<'_>, node_info: &[u8], signature: &[u8]) -> Result<()> {
        let info: NodeInfo = codec::decode_arg(node_info, "node info")?;
        if info.public_key.verify(node_info, signature).is_err() {
            return Err(GovError::AuthorizationFailure(
                "addPeer: node info signature does not match the embedded key".into(),
            ));
        }

        let key = self.ns(CANDIDATE_TABLE).key(&[info.public_key.as_bytes()]);
        if !ctx.contains(&key) {
            let fee = self.config_table().amount(ctx, config_keys::PEER_REGISTRATION_FEE)?;
            if fee > 0 {
                let alphabet = ctx.alphabet_address();
                self.balance(ctx)?.charge(
                    ctx,
                    info.public_key.address(),
                    alphabet,
                    fee,
                    b"peer registration".to_vec(),
                )?;
            }
        }

        let node = NetmapNode {
            public_key: info.public_key,
            info: node_info.to_vec(),
            state: NodeState::Online,
        };
        ctx.put_encoded(key, &node)?;
        debug!(node = %info.public_key, "candidate registered");
        ctx.notify(
            self.hash,
            Notification::AddPeer {
                node_info: node_info.to_vec(),
            },
        )
    }

    /// Change a candidate's declared state for the next snapshot
    pub fn update_state(&self, ctx: &mut Context<'_>, public_key: PublicKey, state: NodeState) -> Result<()> {
        ctx.require_alphabet("updateState")?;
        let key = self.ns(CANDIDATE_TABLE).key(&[public_key.as_bytes()]);
        let mut node: NetmapNode = ctx
            .get_decoded(&key)?
            .ok_or_else(|| GovError::NotFound(format!("candidate {}", public_key)))?;
        node.state = state;
        ctx.put_encoded(key, &node)?;
        info!(node = %public_key, %state, "node state updated");
        ctx.notify(self.hash, Notification::UpdateState { state, public_key })
    }

    pub fn netmap_candidates(&self, ctx: &Context<'_>) -> Result<Vec<NetmapNode>> {
        ctx.scan(self.ns(CANDIDATE_TABLE).prefix())
            .into_iter()
            .map(|(_, raw)| codec::decode(&raw))
            .collect()
    }

    // === Epochs ===

    /// Advance to `epoch`, which must be exactly `current + 1`
    pub fn new_epoch(&self, ctx: &mut Context<'_>, epoch: Epoch) -> Result<()> {
        ctx.require_alphabet("newEpoch")?;
        let current = self.epoch(ctx)?;
        if epoch != current + 1 {
            return Err(GovError::SequenceViolation {
                expected: current + 1,
                got: epoch,
            });
        }

        let candidates = self.ns(CANDIDATE_TABLE);
        let mut snapshot = Vec::new();
        let mut evicted = 0usize;
        for (key, raw) in ctx.scan(candidates.prefix()) {
            let node: NetmapNode = codec::decode(&raw)?;
            if node.state == NodeState::Offline {
                ctx.delete(key)?;
                evicted += 1;
            } else {
                snapshot.push(node);
            }
        }

        let snapshots = self.ns(SNAPSHOT_TABLE);
        let size = snapshot.len();
        ctx.put_encoded(snapshot_key(&snapshots, epoch), &snapshot)?;
        let retention = self.retention(ctx)?;
        if epoch >= retention {
            ctx.delete(snapshot_key(&snapshots, epoch - retention))?;
        }
        ctx.put_encoded(self.ns(EPOCH_TABLE).key(&[EPOCH_KEY]), &epoch)?;

        self.balance(ctx)?.new_epoch(ctx, epoch)?;

        info!(epoch, nodes = size, evicted, "new epoch");
        ctx.notify(self.hash, Notification::NewEpoch { epoch })
    }

    pub fn epoch(&self, ctx: &Context<'_>) -> Result<Epoch> {
        Ok(ctx
            .get_decoded(&self.ns(EPOCH_TABLE).key(&[EPOCH_KEY]))?
            .unwrap_or(0))
    }

    fn retention(&self, ctx: &Context<'_>) -> Result<u64> {
        ctx.get_decoded(&self.ns(EPOCH_TABLE).key(&[RETENTION_KEY]))?
            .ok_or_else(|| GovError::NotFound("netmap is not deployed".into()))
    }

    /// Snapshot of the current epoch
    pub fn netmap(&self, ctx: &Context<'_>) -> Result<Vec<NetmapNode>> {
        self.snapshot(ctx, 0)
    }

    /// Snapshot of `current - diff`
    pub fn snapshot(&self, ctx: &Context<'_>, diff: u64) -> Result<Vec<NetmapNode>> {
        let current = self.epoch(ctx)?;
        let epoch = current
            .checked_sub(diff)
            .ok_or_else(|| GovError::NotFound(format!("no epoch {} before {}", diff, current)))?;
        self.snapshot_by_epoch(ctx, epoch)
    }

    pub fn snapshot_by_epoch(&self, ctx: &Context<'_>, epoch: Epoch) -> Result<Vec<NetmapNode>> {
        ctx.get_decoded(&snapshot_key(&self.ns(SNAPSHOT_TABLE), epoch))?
            .ok_or_else(|| GovError::NotFound(format!("snapshot for epoch {}", epoch)))
    }

    /// Whether `key` is part of the snapshot for `epoch`
    pub fn in_snapshot(&self, ctx: &Context<'_>, epoch: Epoch, key: &PublicKey) -> Result<bool> {
        Ok(self
            .snapshot_by_epoch(ctx, epoch)?
            .iter()
            .any(|node| node.public_key == *key))
    }

    // === Inner Ring ===

    /// Stored Inner Ring keys; the designated Alphabet until the committee sets a list
    pub fn inner_ring_list(&self, ctx: &Context<'_>) -> Result<Vec<PublicKey>> {
        Ok(ctx
            .get_decoded(&self.ns(INNER_RING_TABLE).key(&[INNER_RING_KEY]))?
            .unwrap_or_else(|| ctx.alphabet_keys()))
    }

    pub fn update_inner_ring(&self, ctx: &mut Context<'_>, keys: Vec<PublicKey>) -> Result<()> {
        ctx.require_committee("updateInnerRing")?;
        if keys.is_empty() {
            return Err(GovError::InvalidArgument("inner ring list is empty".into()));
        }
        for (i, key) in keys.iter().enumerate() {
            if keys[..i].contains(key) {
                return Err(GovError::InvalidArgument(format!("duplicate inner ring key {}", key)));
            }
        }
        let size = keys.len();
        ctx.put_encoded(self.ns(INNER_RING_TABLE).key(&[INNER_RING_KEY]), &keys)?;
        info!(size, "inner ring updated");
        ctx.notify(self.hash, Notification::UpdateInnerRing { keys })
    }

    // === Configuration ===

    pub fn config(&self, ctx: &Context<'_>, key: &[u8]) -> Option<Vec<u8>> {
        self.config_table().get(ctx, key)
    }

    /// Numeric parameter, zero when unset
    pub fn config_amount(&self, ctx: &Context<'_>, key: &[u8]) -> Result<Amount> {
        self.config_table().amount(ctx, key)
    }

    pub fn list_config(&self, ctx: &Context<'_>) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.config_table().list(ctx)
    }

    pub fn set_config(&self, ctx: &mut Context<'_>, id: &[u8], key: &[u8], value: &[u8]) -> Result<()> {
        ctx.require_alphabet("setConfig")?;
        self.config_table().set(ctx, key, value)?;
        info!(key = %String::from_utf8_lossy(key), "config updated");
        ctx.notify(
            self.hash,
            Notification::SetConfig {
                id: id.to_vec(),
                key: key.to_vec(),
                value: value.to_vec(),
            },
        )
    }

    /// Bootstrap the configuration; runs once
    pub fn init_config(&self, ctx: &mut Context<'_>, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        ctx.require_alphabet("initConfig")?;
        self.config_table().init(ctx, entries)?;
        info!(entries = entries.len(), "config initialized");
        Ok(())
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

fn snapshot_key(ns: &Namespace, epoch: Epoch) -> Vec<u8> {
    ns.key(&[&epoch.to_be_bytes()])
}
