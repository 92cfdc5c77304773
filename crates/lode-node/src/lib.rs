//! # Lode Node
//!
//! Host side of a Lode network:
//! - `chain` - single-process chain that signs and executes transactions
//! - `genesis` - contract deployment and config bootstrap
//! - `processor` - Inner Ring reactions to contract notifications
//! - `devnet` - scripted end-to-end run
//! - `config` / `logging` - TOML configuration and tracing setup

pub mod chain;
pub mod config;
pub mod devnet;
pub mod error;
pub mod genesis;
pub mod logging;
pub mod processor;

pub use chain::{LocalChain, Signer};
pub use config::NodeConfig;
pub use devnet::DevnetReport;
pub use error::{NodeError, Result};
pub use genesis::{bootstrap, devnet_keys, Genesis};
pub use logging::init_logging;
pub use processor::{tick_epoch, InnerRingProcessor, ProcessStats};
