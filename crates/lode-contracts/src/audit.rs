//! Audit result ledger
//!
//! Inner Ring members publish the outcome of container audits. Results are
//! stored verbatim under their BLAKE3 id and indexed by
//! `epoch || container || auditor` for filtered listing.

use lode_core::{codec, ContainerId, Context, Epoch, GovError, Hash256, Namespace, Result};
use lode_crypto::{hash_blake3, Address, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::common::{self, Migration};

const RESULT_TABLE: u8 = 0x01;
const INDEX_TABLE: u8 = 0x02;

/// Audit outcome for one container in one epoch
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResult {
    pub epoch: Epoch,
    pub container_id: ContainerId,
    /// Inner Ring key that ran the audit
    pub auditor: PublicKey,
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
}

impl AuditResult {
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }
}

/// Handle to a deployed audit contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuditContract {
    hash: Address,
}

impl AuditContract {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    fn ns(&self, table: u8) -> Namespace {
        Namespace::new(&self.hash, table)
    }

    pub(crate) fn deploy(&self, ctx: &mut Context<'_>) -> Result<()> {
        common::install(ctx, &self.hash, &[])
    }

    /// Publish an encoded `AuditResult`; returns its id
    pub fn put(&self, ctx: &mut Context<'_>, raw: &[u8]) -> Result<Hash256> {
        let result: AuditResult = codec::decode_arg(raw, "audit result")?;
        if !ctx.is_alphabet_key(&result.auditor) {
            return Err(GovError::AuthorizationFailure(format!(
                "putAuditResult: {} is not an inner ring key",
                result.auditor
            )));
        }
        ctx.require_witness(&result.auditor.address(), "putAuditResult")?;

        let id = hash_blake3(raw);
        let key = self.ns(RESULT_TABLE).key(&[&id]);
        if ctx.contains(&key) {
            return Err(GovError::Conflict(format!(
                "audit result {} already stored",
                hex::encode(id)
            )));
        }
        ctx.put(key, raw.to_vec())?;
        ctx.put(
            self.ns(INDEX_TABLE).key(&[
                &result.epoch.to_be_bytes(),
                result.container_id.as_bytes(),
                result.auditor.as_bytes(),
                &id,
            ]),
            Vec::new(),
        )?;
        info!(
            epoch = result.epoch,
            container = %result.container_id,
            auditor = %result.auditor,
            "audit result stored"
        );
        Ok(id)
    }

    /// Raw result as published
    pub fn get(&self, ctx: &Context<'_>, id: &Hash256) -> Result<Vec<u8>> {
        ctx.get(&self.ns(RESULT_TABLE).key(&[id]))
            .ok_or_else(|| GovError::NotFound(format!("audit result {}", hex::encode(id))))
    }

    /// Every result id
    pub fn list(&self, ctx: &Context<'_>) -> Result<Vec<Hash256>> {
        let ns = self.ns(RESULT_TABLE);
        ctx.scan(ns.prefix())
            .into_iter()
            .map(|(key, _)| to_hash(ns.strip(&key).unwrap_or_default()))
            .collect()
    }

    pub fn list_by_epoch(&self, ctx: &Context<'_>, epoch: Epoch) -> Result<Vec<Hash256>> {
        self.list_index(ctx, &[&epoch.to_be_bytes()])
    }

    pub fn list_by_cid(&self, ctx: &Context<'_>, epoch: Epoch, cid: &ContainerId) -> Result<Vec<Hash256>> {
        self.list_index(ctx, &[&epoch.to_be_bytes(), cid.as_bytes()])
    }

    pub fn list_by_node(
        &self,
        ctx: &Context<'_>,
        epoch: Epoch,
        cid: &ContainerId,
        auditor: &PublicKey,
    ) -> Result<Vec<Hash256>> {
        self.list_index(ctx, &[&epoch.to_be_bytes(), cid.as_bytes(), auditor.as_bytes()])
    }

    fn list_index(&self, ctx: &Context<'_>, parts: &[&[u8]]) -> Result<Vec<Hash256>> {
        ctx.scan(&self.ns(INDEX_TABLE).key(parts))
            .into_iter()
            .map(|(key, _)| to_hash(&key[key.len().saturating_sub(32)..]))
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

fn to_hash(bytes: &[u8]) -> Result<Hash256> {
    bytes
        .try_into()
        .map_err(|_| GovError::Serialization(format!("corrupt audit key of {} bytes", bytes.len())))
}
