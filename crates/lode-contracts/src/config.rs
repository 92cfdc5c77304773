//! Generic key → value store of network parameters
//!
//! Used by the netmap contract (sidechain) and the mainchain gateway. Values
//! are opaque bytes; numeric parameters are stored as decimal ASCII.

use lode_core::{Amount, Context, Entries, GovError, Namespace, Result};
use lode_crypto::Address;

const INIT_MARKER: &[u8] = b"initialized";

pub(crate) struct ConfigTable {
    entries: Namespace,
    meta: Namespace,
}

impl ConfigTable {
    pub(crate) fn new(owner: &Address, table: u8) -> Self {
        Self {
            entries: Namespace::new(owner, table),
            meta: Namespace::new(owner, crate::common::META_TABLE),
        }
    }

    pub(crate) fn get(&self, ctx: &Context<'_>, key: &[u8]) -> Option<Vec<u8>> {
        ctx.get(&self.entries.key(&[key]))
    }

    pub(crate) fn set(&self, ctx: &mut Context<'_>, key: &[u8], value: &[u8]) -> Result<()> {
        if key.is_empty() {
            return Err(GovError::InvalidArgument("empty config key".into()));
        }
        ctx.put(self.entries.key(&[key]), value.to_vec())
    }

    /// All entries in key order
    pub(crate) fn list(&self, ctx: &Context<'_>) -> Entries {
        ctx.scan(self.entries.prefix())
            .into_iter()
            .filter_map(|(k, v)| self.entries.strip(&k).map(|key| (key.to_vec(), v)))
            .collect()
    }

    pub(crate) fn is_initialized(&self, ctx: &Context<'_>) -> bool {
        ctx.contains(&self.meta.key(&[INIT_MARKER]))
    }

    /// One-shot bootstrap
    pub(crate) fn init(&self, ctx: &mut Context<'_>, entries: &[(Vec<u8>, Vec<u8>)]) -> Result<()> {
        if self.is_initialized(ctx) {
            return Err(GovError::Conflict("configuration already initialized".into()));
        }
        for (key, value) in entries {
            self.set(ctx, key, value)?;
        }
        ctx.put(self.meta.key(&[INIT_MARKER]), vec![1])
    }

    /// Numeric parameter; unset means zero
    pub(crate) fn amount(&self, ctx: &Context<'_>, key: &[u8]) -> Result<Amount> {
        match self.get(ctx, key) {
            Some(raw) => parse_amount(&raw),
            None => Ok(0),
        }
    }
}

/// Parse a decimal ASCII config value
pub fn parse_amount(raw: &[u8]) -> Result<Amount> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<Amount>().ok())
        .ok_or_else(|| GovError::InvalidArgument(format!("not a decimal amount: {}", hex::encode(raw))))
}

/// Render an amount as a config value
pub fn amount_value(amount: Amount) -> Vec<u8> {
    amount.to_string().into_bytes()
}
