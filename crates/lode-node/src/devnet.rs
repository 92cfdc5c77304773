//! Scripted local network
//!
//! Bootstraps a chain, registers storage nodes, runs a deposit, a container
//! creation, a few epochs of size estimations and a withdrawal, with the
//! Inner Ring processor reacting after every step.

use lode_contracts::{ContainerDescriptor, ContractSet, NodeInfo, PutRequest, WindowState};
use lode_core::constants::config_keys;
use lode_core::{Amount, ContainerId, Epoch};
use lode_crypto::KeyPair;
use serde::Serialize;
use tracing::info;

use crate::chain::{LocalChain, Signer};
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::genesis::{bootstrap, devnet_keys, Genesis};
use crate::processor::{tick_epoch, InnerRingProcessor, ProcessStats};

/// One aggregated size estimate
#[derive(Clone, Debug, Serialize)]
pub struct SizeLine {
    pub epoch: Epoch,
    pub container: String,
    pub size: u64,
    pub reports: usize,
}

/// Final state of a devnet run
#[derive(Clone, Debug, Serialize)]
pub struct DevnetReport {
    pub genesis: Genesis,
    pub height: u64,
    pub epoch: Epoch,
    pub netmap_size: usize,
    pub total_supply: Amount,
    pub custody: Amount,
    pub user_balance: Amount,
    pub containers: usize,
    pub estimations: Vec<SizeLine>,
    pub events: usize,
    pub processor: ProcessStats,
}

/// Run the scripted scenario described by `config.devnet`
pub fn run(config: &NodeConfig) -> Result<DevnetReport> {
    let devnet = &config.devnet;
    let mut chain = LocalChain::new(devnet_keys(devnet.seed, "alphabet", devnet.alphabet_size));
    let (contracts, genesis) = bootstrap(&mut chain, "devnet", config)?;
    let mut processor = InnerRingProcessor::new(contracts);

    let user = devnet_keys(devnet.seed, "user", 1).remove(0);
    let nodes = devnet_keys(devnet.seed, "storage", devnet.storage_nodes);

    deposit(&mut chain, &contracts, &user, Amount::from(devnet.deposit))?;
    processor.run(&mut chain);

    register_nodes(&mut chain, &contracts, &user, &nodes)?;
    let container = create_container(&mut chain, &contracts, &user)?;

    for _ in 0..devnet.epochs {
        let epoch = tick_epoch(&mut chain, &contracts)?;
        processor.run(&mut chain);
        if let Some(previous) = epoch.checked_sub(1) {
            report_sizes(&mut chain, &contracts, &nodes, previous, container)?;
        }
    }

    let balance = contracts.balance;
    let remaining = query(&chain, "balance.balanceOf", |ctx| balance.balance_of(ctx, &user.address()))?;
    let amount = remaining / 2;
    if amount > 0 {
        let gateway = contracts.gateway;
        let address = user.address();
        chain
            .invoke("gateway.withdraw", Signer::Account(&user), |ctx| {
                gateway.withdraw(ctx, address, amount)
            })
            .map_err(|e| NodeError::contract("gateway.withdraw", e))?;
        processor.run(&mut chain);
    }

    let report = summarize(&chain, &contracts, genesis, &user, processor.stats().clone())?;
    info!(
        height = report.height,
        epoch = report.epoch,
        supply = report.total_supply,
        "devnet finished"
    );
    Ok(report)
}

fn query<T>(
    chain: &LocalChain,
    op: &str,
    f: impl FnOnce(&lode_core::Context<'_>) -> lode_core::Result<T>,
) -> Result<T> {
    chain.query(f).map_err(|e| NodeError::contract(op, e))
}

fn deposit(chain: &mut LocalChain, contracts: &ContractSet, user: &KeyPair, amount: Amount) -> Result<()> {
    let gateway = contracts.gateway;
    let address = user.address();
    chain
        .invoke("gateway.onPayment", Signer::Account(user), |ctx| {
            gateway.on_payment(ctx, address, amount, None)
        })
        .map_err(|e| NodeError::contract("gateway.onPayment", e))?;
    Ok(())
}

fn register_nodes(chain: &mut LocalChain, contracts: &ContractSet, sponsor: &KeyPair, nodes: &[KeyPair]) -> Result<()> {
    let netmap = contracts.netmap;
    let balance = contracts.balance;
    let fee = query(chain, "netmap.config", |ctx| {
        netmap.config_amount(ctx, config_keys::PEER_REGISTRATION_FEE)
    })?;

    for (i, node) in nodes.iter().enumerate() {
        if fee > 0 {
            let (from, to) = (sponsor.address(), node.address());
            chain
                .invoke("balance.transfer", Signer::Account(sponsor), |ctx| {
                    balance.transfer(ctx, from, to, fee, b"registration")
                })
                .map_err(|e| NodeError::contract("balance.transfer", e))?;
        }
        let info = NodeInfo {
            public_key: node.public_key(),
            addresses: vec![format!("/ip4/127.0.0.1/tcp/{}", 8080 + i)],
            attributes: vec![("Node".into(), format!("storage-{}", i))],
            capacity: 100,
        };
        let raw = info.encode().map_err(|e| NodeError::contract("nodeInfo", e))?;
        let signature = node.sign(&raw);
        chain
            .invoke("netmap.addPeer", Signer::Nobody, |ctx| netmap.add_peer(ctx, &raw, &signature))
            .map_err(|e| NodeError::contract("netmap.addPeer", e))?;
    }
    Ok(())
}

fn create_container(chain: &mut LocalChain, contracts: &ContractSet, owner: &KeyPair) -> Result<ContainerId> {
    let descriptor = ContainerDescriptor {
        version: 1,
        owner: owner.address(),
        nonce: [1u8; 16],
        basic_acl: 0x1fbf_8cff,
        placement_policy: "REP 2".into(),
        attributes: vec![("Name".into(), "devnet".into())],
    };
    let request = PutRequest::signed(&descriptor, owner).map_err(|e| NodeError::contract("put", e))?;
    let container = contracts.container;
    let receipt = chain
        .invoke("container.put", Signer::Alphabet, |ctx| container.put(ctx, &request))
        .map_err(|e| NodeError::contract("container.put", e))?;
    Ok(receipt.value)
}

fn report_sizes(
    chain: &mut LocalChain,
    contracts: &ContractSet,
    nodes: &[KeyPair],
    epoch: Epoch,
    id: ContainerId,
) -> Result<()> {
    let container = contracts.container;
    let netmap = contracts.netmap;
    let window = query(chain, "container.estimationWindow", |ctx| {
        container.estimation_window(ctx, epoch)
    })?;
    if window != Some(WindowState::Open) {
        return Ok(());
    }
    for (i, node) in nodes.iter().enumerate() {
        let key = node.public_key();
        let listed = query(chain, "netmap.snapshotByEpoch", |ctx| netmap.in_snapshot(ctx, epoch, &key))?;
        if !listed {
            continue;
        }
        let size = 1024 * (i as u64 + 1) + epoch;
        chain
            .invoke("container.putContainerSize", Signer::Account(node), |ctx| {
                container.put_container_size(ctx, epoch, id, size, key)
            })
            .map_err(|e| NodeError::contract("container.putContainerSize", e))?;
    }
    Ok(())
}

fn summarize(
    chain: &LocalChain,
    contracts: &ContractSet,
    genesis: Genesis,
    user: &KeyPair,
    processor: ProcessStats,
) -> Result<DevnetReport> {
    let c = *contracts;
    let epoch = query(chain, "netmap.epoch", |ctx| c.netmap.epoch(ctx))?;
    let mut estimations = Vec::new();
    for e in 0..=epoch {
        for est in query(chain, "container.listContainerSizes", |ctx| {
            c.container.list_container_sizes(ctx, e)
        })? {
            estimations.push(SizeLine {
                epoch: e,
                container: est.container_id.to_hex(),
                size: est.size,
                reports: est.reports.len(),
            });
        }
    }
    Ok(DevnetReport {
        genesis,
        height: chain.height(),
        epoch,
        netmap_size: query(chain, "netmap.netmap", |ctx| c.netmap.netmap(ctx))?.len(),
        total_supply: query(chain, "balance.totalSupply", |ctx| c.balance.total_supply(ctx))?,
        custody: query(chain, "gateway.custody", |ctx| c.gateway.custody(ctx))?,
        user_balance: query(chain, "balance.balanceOf", |ctx| {
            c.balance.balance_of(ctx, &user.address())
        })?,
        containers: query(chain, "container.list", |ctx| c.container.list(ctx, None))?.len(),
        estimations,
        events: chain.events().len(),
        processor,
    })
}
