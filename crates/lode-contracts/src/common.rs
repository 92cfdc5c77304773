//! Deployment metadata shared by every contract
//!
//! Each contract keeps a version marker and the addresses of the contracts it
//! calls in its own meta table. Handles to collaborators are resolved from
//! these links on every call, so an `Update` that relinks takes effect for
//! the very next invocation.

use lode_core::{Context, GovError, Namespace, Result};
use lode_crypto::Address;
use serde::{Deserialize, Serialize};

/// Code version written at deployment
pub const VERSION: u32 = 1;

/// Meta table tag, reserved in every contract namespace
pub(crate) const META_TABLE: u8 = 0x00;

const VERSION_KEY: &[u8] = b"version";
const LINK_KEY: &[u8] = b"link";

/// Typed cross-contract dependency
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Link {
    Netmap,
    Balance,
    NameService,
}

impl Link {
    fn tag(&self) -> u8 {
        match self {
            Link::Netmap => 1,
            Link::Balance => 2,
            Link::NameService => 4,
        }
    }
}

/// Arguments of a contract `Update`
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Migration {
    /// Must exceed the stored version
    pub version: u32,
    /// Links to re-resolve
    pub relink: Vec<(Link, Address)>,
}

impl Migration {
    pub fn new(version: u32) -> Self {
        Self {
            version,
            relink: Vec::new(),
        }
    }

    pub fn relink(mut self, link: Link, hash: Address) -> Self {
        self.relink.push((link, hash));
        self
    }
}

fn meta(hash: &Address) -> Namespace {
    Namespace::new(hash, META_TABLE)
}

/// Write the version marker and initial links; fails if already deployed
pub(crate) fn install(ctx: &mut Context<'_>, hash: &Address, links: &[(Link, Address)]) -> Result<()> {
    let ns = meta(hash);
    if ctx.contains(&ns.key(&[VERSION_KEY])) {
        return Err(GovError::Conflict(format!("contract {} already deployed", hash)));
    }
    ctx.put_encoded(ns.key(&[VERSION_KEY]), &VERSION)?;
    for (link, target) in links {
        ctx.put_encoded(ns.key(&[LINK_KEY, &[link.tag()]]), target)?;
    }
    Ok(())
}

pub(crate) fn version(ctx: &Context<'_>, hash: &Address) -> Result<u32> {
    ctx.get_decoded(&meta(hash).key(&[VERSION_KEY]))?
        .ok_or_else(|| GovError::NotFound(format!("contract {} is not deployed", hash)))
}

/// Resolve a collaborator address
pub(crate) fn link(ctx: &Context<'_>, hash: &Address, link: Link) -> Result<Address> {
    ctx.get_decoded(&meta(hash).key(&[LINK_KEY, &[link.tag()]]))?
        .ok_or_else(|| GovError::NotFound(format!("{:?} link of contract {}", link, hash)))
}

/// Version gate and relinking; the caller checks the witness
pub(crate) fn apply_update(ctx: &mut Context<'_>, hash: &Address, migration: &Migration) -> Result<()> {
    let stored = version(ctx, hash)?;
    if migration.version <= stored {
        return Err(GovError::SequenceViolation {
            expected: u64::from(stored) + 1,
            got: u64::from(migration.version),
        });
    }
    let ns = meta(hash);
    ctx.put_encoded(ns.key(&[VERSION_KEY]), &migration.version)?;
    for (link, target) in &migration.relink {
        ctx.put_encoded(ns.key(&[LINK_KEY, &[link.tag()]]), target)?;
    }
    tracing::info!(contract = %hash, from = stored, to = migration.version, "contract updated");
    Ok(())
}
