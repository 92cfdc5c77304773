//! Deployment wiring
//!
//! Derives the contract hashes of one network and deploys the whole suite in
//! a single committee-signed transaction, linking every contract to its
//! collaborators.

use lode_core::constants::DEFAULT_SNAPSHOT_RETENTION;
use lode_core::{Context, Result};
use lode_crypto::{Address, PublicKey};
use tracing::info;

use crate::alphabet::AlphabetContract;
use crate::audit::AuditContract;
use crate::balance::BalanceContract;
use crate::container::ContainerContract;
use crate::gateway::MainchainGateway;
use crate::netmap::NetmapContract;
use crate::nns::NameRegistry;
use crate::reputation::ReputationContract;

/// Deployment parameters
#[derive(Clone, Debug)]
pub struct DeployParams {
    /// Snapshots kept by the netmap, current epoch included
    pub snapshot_retention: u64,
    /// Alphabet keys stored by the mainchain gateway
    pub mainchain_alphabet: Vec<PublicKey>,
}

impl DeployParams {
    pub fn new(mainchain_alphabet: Vec<PublicKey>) -> Self {
        Self {
            snapshot_retention: DEFAULT_SNAPSHOT_RETENTION,
            mainchain_alphabet,
        }
    }
}

/// Handles of every contract of one network
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContractSet {
    pub netmap: NetmapContract,
    pub balance: BalanceContract,
    pub container: ContainerContract,
    pub nns: NameRegistry,
    pub reputation: ReputationContract,
    pub audit: AuditContract,
    pub gateway: MainchainGateway,
    pub alphabet: AlphabetContract,
}

impl ContractSet {
    /// Deterministic hashes for network `seed`
    pub fn derive(seed: &str) -> Self {
        let hash = |name: &str| Address::from_script(format!("lode/contract/{}/{}", seed, name).as_bytes());
        Self {
            netmap: NetmapContract::at(hash("netmap")),
            balance: BalanceContract::at(hash("balance")),
            container: ContainerContract::at(hash("container")),
            nns: NameRegistry::at(hash("nns")),
            reputation: ReputationContract::at(hash("reputation")),
            audit: AuditContract::at(hash("audit")),
            gateway: MainchainGateway::at(hash("gateway")),
            alphabet: AlphabetContract::at(hash("alphabet")),
        }
    }

    /// Deploy and link every contract; needs the committee witness
    pub fn deploy(&self, ctx: &mut Context<'_>, params: &DeployParams) -> Result<()> {
        ctx.require_committee("deploy")?;
        self.netmap
            .deploy(ctx, self.balance.hash(), params.snapshot_retention)?;
        self.balance.deploy(ctx, self.netmap.hash())?;
        self.nns.deploy(ctx)?;
        self.container.deploy(
            ctx,
            self.netmap.hash(),
            self.balance.hash(),
            self.nns.hash(),
        )?;
        self.reputation.deploy(ctx)?;
        self.audit.deploy(ctx)?;
        self.gateway.deploy(ctx, &params.mainchain_alphabet)?;
        self.alphabet.deploy(ctx, self.netmap.hash())?;
        info!(
            netmap = %self.netmap.hash(),
            balance = %self.balance.hash(),
            container = %self.container.hash(),
            retention = params.snapshot_retention,
            "contracts deployed"
        );
        Ok(())
    }
}
