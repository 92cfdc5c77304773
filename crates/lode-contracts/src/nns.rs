//! Name registry collaborator
//!
//! Minimal `name.zone → container` binding used by `PutNamed`. Resolution
//! beyond exact lookups is not provided.

use lode_core::constants::MAX_NAME_LENGTH;
use lode_core::{ContainerId, Context, GovError, Namespace, Result};
use lode_crypto::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{self, Migration};

const NAME_TABLE: u8 = 0x01;

/// Holder of a bound name
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameRecord {
    pub owner: Address,
    pub container: ContainerId,
}

/// Check a container name label: 1-63 chars of `[a-z0-9-]`
pub fn validate_label(label: &str) -> Result<()> {
    let valid = !label.is_empty()
        && label.len() <= MAX_NAME_LENGTH
        && label
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
    if !valid {
        return Err(GovError::InvalidArgument(format!("invalid name label {:?}", label)));
    }
    Ok(())
}

/// Handle to a deployed name registry
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NameRegistry {
    hash: Address,
}

impl NameRegistry {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    fn names(&self) -> Namespace {
        Namespace::new(&self.hash, NAME_TABLE)
    }

    pub(crate) fn deploy(&self, ctx: &mut Context<'_>) -> Result<()> {
        common::install(ctx, &self.hash, &[])
    }

    /// Bind `name.zone` to `container`; a held name stays with its container
    /// until that container is deleted
    pub(crate) fn bind(
        &self,
        ctx: &mut Context<'_>,
        zone: &str,
        name: &str,
        owner: Address,
        container: ContainerId,
    ) -> Result<String> {
        validate_label(name)?;
        validate_label(zone)?;
        let fqdn = format!("{}.{}", name, zone);
        let key = self.names().key(&[fqdn.as_bytes()]);
        if let Some(existing) = ctx.get_decoded::<NameRecord>(&key)? {
            if existing.owner != owner {
                return Err(GovError::Conflict(format!("name {} is taken", fqdn)));
            }
            return Err(GovError::Conflict(format!(
                "name {} is bound to container {}",
                fqdn, existing.container
            )));
        }
        ctx.put_encoded(key, &NameRecord { owner, container })?;
        debug!(name = %fqdn, container = %container, "name bound");
        Ok(fqdn)
    }

    /// Release `fqdn` if it still points at `container`
    pub(crate) fn unbind(&self, ctx: &mut Context<'_>, fqdn: &str, container: &ContainerId) -> Result<()> {
        let key = self.names().key(&[fqdn.as_bytes()]);
        match ctx.get_decoded::<NameRecord>(&key)? {
            Some(record) if record.container == *container => ctx.delete(key),
            _ => Ok(()),
        }
    }

    pub fn resolve(&self, ctx: &Context<'_>, fqdn: &str) -> Result<NameRecord> {
        ctx.get_decoded(&self.names().key(&[fqdn.as_bytes()]))?
            .ok_or_else(|| GovError::NotFound(format!("name {}", fqdn)))
    }

    pub fn version(&self, ctx: &Context<'_>) -> Result<u32> {
        common::version(ctx, &self.hash)
    }

    pub fn update(&self, ctx: &mut Context<'_>, migration: &Migration) -> Result<()> {
        ctx.require_committee("update")?;
        common::apply_update(ctx, &self.hash, migration)
    }
}
