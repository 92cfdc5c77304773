//! # Container Registry
//!
//! Container records keyed by the BLAKE3 hash of their descriptor, their
//! extended ACL, optional name bindings, and (see `estimation`) the
//! per-epoch size reports.
//!
//! ## Authorization
//!
//! Mutations are relayed by the Inner Ring, so every call needs the Alphabet
//! witness plus a proof from the owner:
//!
//! - a signature by the owner's own key, or
//! - a signature by the delegate of a `SessionToken` issued by the owner or
//!   by a current Alphabet member
//!
//! Creation fees (`ContainerFee`, plus `ContainerAliasFee` for named
//! containers) move from the owner's balance to the Alphabet.

use lode_core::constants::config_keys;
use lode_core::{codec, ContainerId, Context, Epoch, GovError, Namespace, Notification, Result};
use lode_crypto::{Address, KeyPair, PublicKey};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::balance::BalanceContract;
use crate::common::{self, Link, Migration};
use crate::netmap::NetmapContract;
use crate::nns::NameRegistry;

const CONTAINER_TABLE: u8 = 0x01;
const OWNER_TABLE: u8 = 0x02;
const EACL_TABLE: u8 = 0x03;
pub(crate) const WINDOW_TABLE: u8 = 0x04;
pub(crate) const SIZE_TABLE: u8 = 0x05;

/// Container descriptor as submitted by the owner
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub version: u32,
    pub owner: Address,
    /// Distinguishes otherwise identical descriptors
    pub nonce: [u8; 16],
    pub basic_acl: u32,
    pub placement_policy: String,
    pub attributes: Vec<(String, String)>,
}

impl ContainerDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        codec::encode(self)
    }

    pub fn id(&self) -> Result<ContainerId> {
        Ok(ContainerId::from_content(&self.encode()?))
    }
}

/// Delegation of container rights to another key
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    pub owner: Address,
    pub delegate: PublicKey,
    /// `None` authorizes creation
    pub container: Option<ContainerId>,
    /// Last epoch the token is valid for
    pub expires_epoch: Epoch,
    pub issuer: PublicKey,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
}

impl SessionToken {
    /// Build and sign a token with the issuer's key
    pub fn issue(
        issuer: &KeyPair,
        owner: Address,
        delegate: PublicKey,
        container: Option<ContainerId>,
        expires_epoch: Epoch,
    ) -> Result<Self> {
        let mut token = Self {
            owner,
            delegate,
            container,
            expires_epoch,
            issuer: issuer.public_key(),
            signature: Vec::new(),
        };
        token.signature = issuer.sign(&token.body()?).to_vec();
        Ok(token)
    }

    /// Signed portion of the token
    pub fn body(&self) -> Result<Vec<u8>> {
        codec::encode(&(
            &self.owner,
            &self.delegate,
            &self.container,
            self.expires_epoch,
            &self.issuer,
        ))
    }

    fn verify(&self) -> Result<()> {
        self.issuer.verify(&self.body()?, &self.signature)?;
        Ok(())
    }
}

/// Arguments of `Put` / `PutNamed`
#[derive(Clone, Debug)]
pub struct PutRequest {
    pub descriptor: Vec<u8>,
    pub signature: Vec<u8>,
    pub public_key: PublicKey,
    pub token: Option<SessionToken>,
}

impl PutRequest {
    /// Encode `descriptor` and sign it with `signer`
    pub fn signed(descriptor: &ContainerDescriptor, signer: &KeyPair) -> Result<Self> {
        let descriptor = descriptor.encode()?;
        let signature = signer.sign(&descriptor).to_vec();
        Ok(Self {
            descriptor,
            signature,
            public_key: signer.public_key(),
            token: None,
        })
    }

    pub fn with_token(mut self, token: SessionToken) -> Self {
        self.token = Some(token);
        self
    }
}

/// Stored container
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerRecord {
    #[serde(with = "serde_bytes")]
    pub descriptor: Vec<u8>,
    pub owner: Address,
    /// Key whose signature created the container
    pub creator: PublicKey,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub token: Option<SessionToken>,
    /// Bound `name.zone`, if any
    pub name: Option<String>,
}

impl ContainerRecord {
    pub fn decode_descriptor(&self) -> Result<ContainerDescriptor> {
        codec::decode(&self.descriptor)
    }
}

/// Stored extended ACL with its proof of ownership
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EaclRecord {
    /// 32-byte container id followed by opaque rules
    #[serde(with = "serde_bytes")]
    pub eacl: Vec<u8>,
    #[serde(with = "serde_bytes")]
    pub signature: Vec<u8>,
    pub public_key: PublicKey,
    pub token: Option<SessionToken>,
}

/// Handle to a deployed container contract
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerContract {
    hash: Address,
}

impl ContainerContract {
    pub fn at(hash: Address) -> Self {
        Self { hash }
    }

    pub fn hash(&self) -> Address {
        self.hash
    }

    pub(crate) fn ns(&self, table: u8) -> Namespace {
        Namespace::new(&self.hash, table)
    }

    pub(crate) fn netmap(&self, ctx: &Context<'_>) -> Result<NetmapContract> {
        Ok(NetmapContract::at(common::link(ctx, &self.hash, Link::Netmap)?))
    }

    fn balance(&self, ctx: &Context<'_>) -> Result<BalanceContract> {
        Ok(BalanceContract::at(common::link(ctx, &self.hash, Link::Balance)?))
    }

    fn nns(&self, ctx: &Context<'_>) -> Result<NameRegistry> {
        Ok(NameRegistry::at(common::link(ctx, &self.hash, Link::NameService)?))
    }

    pub(crate) fn deploy(
        &self,
        ctx: &mut Context<'_>,
        netmap: Address,
        balance: Address,
        nns: Address,
    ) -> Result<()> {
        common::install(
            ctx,
            &self.hash,
            &[
                (Link::Netmap, netmap),
                (Link::Balance, balance),
                (Link::NameService, nns),
            ],
        )
    }

    // === Lifecycle ===

    pub fn put(&self, ctx: &mut Context<'_>, request: &PutRequest) -> Result<ContainerId> {
        self.put_container(ctx, request, None)
    }

    /// `Put` plus a `name.zone` binding; an empty zone means the default one
    pub fn put_named(
        &self,
        ctx: &mut Context<'_>,
        request: &PutRequest,
        name: &str,
        zone: &str,
    ) -> Result<ContainerId> {
        let zone = if zone.is_empty() {
            lode_core::constants::DEFAULT_ZONE
        } else {
            zone
        };
        self.put_container(ctx, request, Some((name, zone)))
    }

    fn put_container(
        &self,
        ctx: &mut Context<'_>,
        request: &PutRequest,
        name: Option<(&str, &str)>,
    ) -> Result<ContainerId> {
        ctx.require_alphabet("put")?;
        if request
            .public_key
            .verify(&request.descriptor, &request.signature)
            .is_err()
        {
            return Err(GovError::AuthorizationFailure(
                "put: descriptor signature check failed".into(),
            ));
        }
        let descriptor: ContainerDescriptor = codec::decode_arg(&request.descriptor, "container descriptor")?;
        let owner = descriptor.owner;
        self.authorize(ctx, &owner, &request.public_key, request.token.as_ref(), None, "put")?;

        let id = ContainerId::from_content(&request.descriptor);
        let key = self.ns(CONTAINER_TABLE).key(&[id.as_bytes()]);
        if ctx.contains(&key) {
            return Err(GovError::Conflict(format!("container {} already exists", id)));
        }

        let netmap = self.netmap(ctx)?;
        let balance = self.balance(ctx)?;
        let alphabet = ctx.alphabet_address();
        let mut fee = netmap.config_amount(ctx, config_keys::CONTAINER_FEE)?;
        if name.is_some() {
            fee = fee
                .checked_add(netmap.config_amount(ctx, config_keys::CONTAINER_ALIAS_FEE)?)
                .ok_or_else(|| GovError::InvalidArgument("put: container fee overflow".into()))?;
        }
        balance.charge(ctx, owner, alphabet, fee, id.as_bytes().to_vec())?;

        let fqdn = match name {
            Some((name, zone)) => Some(self.nns(ctx)?.bind(ctx, zone, name, owner, id)?),
            None => None,
        };

        let record = ContainerRecord {
            descriptor: request.descriptor.clone(),
            owner,
            creator: request.public_key,
            signature: request.signature.clone(),
            token: request.token.clone(),
            name: fqdn,
        };
        ctx.put_encoded(key, &record)?;
        ctx.put(self.owner_key(&owner, &id), Vec::new())?;

        info!(container = %id, owner = %owner, fee, named = record.name.is_some(), "container created");
        ctx.notify(
            self.hash,
            Notification::PutSuccess {
                container_id: id,
                public_key: request.public_key,
            },
        )?;
        Ok(id)
    }

    /// Remove a container; `signature` covers the container id bytes
    pub fn delete(
        &self,
        ctx: &mut Context<'_>,
        id: ContainerId,
        signature: &[u8],
        token: Option<&SessionToken>,
    ) -> Result<()> {
        ctx.require_alphabet("delete")?;
        let record = self.get(ctx, &id)?;
        let signer = match token {
            Some(token) => {
                self.authorize(ctx, &record.owner, &token.delegate, Some(token), Some(id), "delete")?;
                token.delegate
            }
            None => {
                self.authorize(ctx, &record.owner, &record.creator, None, Some(id), "delete")?;
                record.creator
            }
        };
        if signer.verify(id.as_bytes(), signature).is_err() {
            return Err(GovError::AuthorizationFailure(format!(
                "delete: signature check failed for container {}",
                id
            )));
        }

        if let Some(fqdn) = &record.name {
            self.nns(ctx)?.unbind(ctx, fqdn, &id)?;
        }
        ctx.delete(self.ns(CONTAINER_TABLE).key(&[id.as_bytes()]))?;
        ctx.delete(self.ns(EACL_TABLE).key(&[id.as_bytes()]))?;
        ctx.delete(self.owner_key(&record.owner, &id))?;

        info!(container = %id, owner = %record.owner, "container deleted");
        ctx.notify(self.hash, Notification::DeleteSuccess { container_id: id })
    }

    // === Accessors ===

    pub fn get(&self, ctx: &Context<'_>, id: &ContainerId) -> Result<ContainerRecord> {
        ctx.get_decoded(&self.ns(CONTAINER_TABLE).key(&[id.as_bytes()]))?
            .ok_or_else(|| GovError::NotFound(format!("container {}", id)))
    }

    pub fn owner(&self, ctx: &Context<'_>, id: &ContainerId) -> Result<Address> {
        Ok(self.get(ctx, id)?.owner)
    }

    /// Container ids, all or of one owner
    pub fn list(&self, ctx: &Context<'_>, owner: Option<&Address>) -> Result<Vec<ContainerId>> {
        match owner {
            Some(owner) => {
                let ns = self.ns(OWNER_TABLE);
                let prefix = ns.key(&[owner.as_bytes()]);
                ctx.scan(&prefix)
                    .into_iter()
                    .map(|(key, _)| ContainerId::from_slice(&key[prefix.len()..]))
                    .collect()
            }
            None => {
                let ns = self.ns(CONTAINER_TABLE);
                ctx.scan(ns.prefix())
                    .into_iter()
                    .map(|(key, _)| ContainerId::from_slice(ns.strip(&key).unwrap_or_default()))
                    .collect()
            }
        }
    }

    fn owner_key(&self, owner: &Address, id: &ContainerId) -> Vec<u8> {
        self.ns(OWNER_TABLE).key(&[owner.as_bytes(), id.as_bytes()])
    }

    // === Extended ACL ===

    /// Stored eACL of an existing container, `None` if never set
    pub fn eacl(&self, ctx: &Context<'_>, id: &ContainerId) -> Result<Option<EaclRecord>> {
        self.get(ctx, id)?;
        ctx.get_decoded(&self.ns(EACL_TABLE).key(&[id.as_bytes()]))
    }

    /// Replace the eACL; `signature` covers the whole `eacl` payload
    pub fn set_eacl(
        &self,
        ctx: &mut Context<'_>,
        eacl: &[u8],
        signature: &[u8],
        public_key: PublicKey,
        token: Option<&SessionToken>,
    ) -> Result<()> {
        ctx.require_alphabet("setEACL")?;
        if eacl.len() < 32 {
            return Err(GovError::InvalidArgument(
                "setEACL: payload shorter than a container id".into(),
            ));
        }
        let id = ContainerId::from_slice(&eacl[..32])?;
        let record = self.get(ctx, &id)?;
        if public_key.verify(eacl, signature).is_err() {
            return Err(GovError::AuthorizationFailure(
                "setEACL: signature check failed".into(),
            ));
        }
        self.authorize(ctx, &record.owner, &public_key, token, Some(id), "setEACL")?;

        let stored = EaclRecord {
            eacl: eacl.to_vec(),
            signature: signature.to_vec(),
            public_key,
            token: token.cloned(),
        };
        ctx.put_encoded(self.ns(EACL_TABLE).key(&[id.as_bytes()]), &stored)?;
        info!(container = %id, "eACL updated");
        ctx.notify(
            self.hash,
            Notification::SetEACLSuccess {
                container_id: id,
                public_key,
            },
        )
    }

    // === Internals ===

    /// Check that `key` may act for `owner` on `scope`
    fn authorize(
        &self,
        ctx: &Context<'_>,
        owner: &Address,
        key: &PublicKey,
        token: Option<&SessionToken>,
        scope: Option<ContainerId>,
        op: &str,
    ) -> Result<()> {
        let deny = |reason: &str| Err(GovError::AuthorizationFailure(format!("{}: {}", op, reason)));
        let token = match token {
            None if key.address() == *owner => return Ok(()),
            None => return deny("key does not belong to the container owner"),
            Some(token) => token,
        };

        if token.owner != *owner {
            return deny("session token issued for another owner");
        }
        if token.delegate != *key {
            return deny("session token delegates to another key");
        }
        if token.container != scope {
            return deny("session token scope mismatch");
        }
        if token.issuer.address() != *owner && !ctx.is_alphabet_key(&token.issuer) {
            return deny("session token issuer is neither the owner nor an alphabet member");
        }
        if token.verify().is_err() {
            return deny("session token signature check failed");
        }
        let epoch = self.netmap(ctx)?.epoch(ctx)?;
        if epoch > token.expires_epoch {
            return deny("session token expired");
        }
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
