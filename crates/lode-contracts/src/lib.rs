//! # Lode Contracts
//!
//! The governance state machines of a Lode network. Every contract is a
//! `Copy` handle holding its deployment hash; all state lives in the
//! [`Context`](lode_core::Context) store under the contract's namespace.
//!
//! ## Contracts
//!
//! | Contract | Gate for mutations | Module |
//! |----------|--------------------|--------|
//! | Netmap (epoch engine, config) | Alphabet; `AddPeer` by the node itself; Inner Ring list by Committee | `netmap` |
//! | Alphabet ballots | Alphabet | `alphabet` |
//! | Balance (ledger, escrow) | Alphabet; `Transfer` by the sender | `balance` |
//! | Container (+ size estimations) | Alphabet + owner proof; reports by netmap nodes | `container`, `estimation` |
//! | Reputation | reporter | `reputation` |
//! | Audit | Inner Ring key | `audit` |
//! | Name registry | via Container only | `nns` |
//! | Mainchain gateway | user / stored Alphabet | `gateway` |
//!
//! ## Cross-contract links
//!
//! ```text
//! container ──► netmap ◄──► balance
//!     │    └──────────────────┘▲
//!     └──► nns                 │ fees
//! ```
//!
//! Links are stored at deployment and re-resolved on every call; `Update`
//! can repoint them.

pub mod alphabet;
pub mod audit;
pub mod balance;
pub mod common;
mod config;
pub mod container;
pub mod deployment;
pub mod estimation;
pub mod gateway;
pub mod netmap;
pub mod nns;
pub mod reputation;

pub use alphabet::{AlphabetContract, BallotEntry};
pub use audit::{AuditContract, AuditResult};
pub use balance::{lock_account, BalanceContract, LockRecord, LockStatus};
pub use common::{Link, Migration, VERSION};
pub use config::{amount_value, parse_amount};
pub use container::{
    ContainerContract, ContainerDescriptor, ContainerRecord, EaclRecord, PutRequest, SessionToken,
};
pub use deployment::{ContractSet, DeployParams};
pub use estimation::{aggregate_size, Estimation, SizeReport, WindowState};
pub use gateway::MainchainGateway;
pub use netmap::{NetmapContract, NetmapNode, NodeInfo};
pub use nns::{NameRecord, NameRegistry};
pub use reputation::{ReputationContract, ReputationEntry};
