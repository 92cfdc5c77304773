//! Genesis bootstrap for a Lode network
//!
//! Deploys and links the contract suite with the committee signature, then
//! installs the network parameters on both the sidechain netmap and the
//! mainchain gateway through `InitConfig`.

use lode_contracts::{ContractSet, DeployParams};
use lode_crypto::{hash_concat, KeyPair};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chain::{LocalChain, Signer};
use crate::config::NodeConfig;
use crate::error::{NodeError, Result};

/// Summary of a bootstrapped network
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Genesis {
    /// Network label the contract hashes are derived from
    pub network: String,
    /// Alphabet public keys (hex)
    pub alphabet: Vec<String>,
    pub alphabet_address: String,
    pub committee_address: String,
    /// Contract name → hash (hex)
    pub contracts: Vec<(String, String)>,
    /// Installed config entries, values as text
    pub config: Vec<(String, String)>,
}

/// Deterministic devnet keys: BLAKE3(seed || role || index)
pub fn devnet_keys(seed: u64, role: &str, count: usize) -> Vec<KeyPair> {
    (0..count as u64)
        .map(|i| KeyPair::from_seed(hash_concat(&[&seed.to_be_bytes(), role.as_bytes(), &i.to_be_bytes()])))
        .collect()
}

/// Deploy the suite on `chain` and install `config.network`
pub fn bootstrap(chain: &mut LocalChain, network: &str, config: &NodeConfig) -> Result<(ContractSet, Genesis)> {
    config.validate()?;
    let contracts = ContractSet::derive(network);
    let params = DeployParams {
        snapshot_retention: config.network.snapshot_retention,
        mainchain_alphabet: chain.alphabet_keys(),
    };
    chain
        .invoke("deploy", Signer::Committee, |ctx| contracts.deploy(ctx, &params))
        .map_err(|e| NodeError::contract("deploy", e))?;

    let entries = config.network.config_entries();
    chain
        .invoke("netmap.initConfig", Signer::Alphabet, |ctx| {
            contracts.netmap.init_config(ctx, &entries)
        })
        .map_err(|e| NodeError::contract("netmap.initConfig", e))?;
    chain
        .invoke("gateway.initConfig", Signer::Alphabet, |ctx| {
            contracts.gateway.init_config(ctx, &entries)
        })
        .map_err(|e| NodeError::contract("gateway.initConfig", e))?;

    let genesis = Genesis {
        network: network.to_string(),
        alphabet: chain.alphabet_keys().iter().map(|k| k.to_hex()).collect(),
        alphabet_address: chain.alphabet_address().to_hex(),
        committee_address: chain.committee_address().to_hex(),
        contracts: vec![
            ("netmap".into(), contracts.netmap.hash().to_hex()),
            ("balance".into(), contracts.balance.hash().to_hex()),
            ("container".into(), contracts.container.hash().to_hex()),
            ("nns".into(), contracts.nns.hash().to_hex()),
            ("reputation".into(), contracts.reputation.hash().to_hex()),
            ("audit".into(), contracts.audit.hash().to_hex()),
            ("gateway".into(), contracts.gateway.hash().to_hex()),
            ("alphabet".into(), contracts.alphabet.hash().to_hex()),
        ],
        config: entries
            .iter()
            .map(|(k, v)| {
                (
                    String::from_utf8_lossy(k).into_owned(),
                    String::from_utf8_lossy(v).into_owned(),
                )
            })
            .collect(),
    };
    info!(
        network,
        alphabet = genesis.alphabet.len(),
        height = chain.height(),
        "genesis complete"
    );
    Ok((contracts, genesis))
}
