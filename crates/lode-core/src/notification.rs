//! Notifications emitted by successful invocations
//!
//! Off-chain Inner Ring processes consume these and answer with further
//! transactions. Opaque payloads (`details`, `id`) are stored and re-emitted
//! verbatim.

use lode_crypto::{Address, PublicKey};
use serde::{Deserialize, Serialize};

use crate::types::{Amount, ContainerId, Epoch, Hash256, NodeState};

/// Event payloads
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Notification {
    // === Mainchain gateway ===
    Deposit {
        from: Address,
        amount: Amount,
        receiver: Address,
        tx_hash: Hash256,
    },
    Withdraw {
        user: Address,
        amount: Amount,
        tx_hash: Hash256,
    },
    Cheque {
        id: Vec<u8>,
        user: Address,
        amount: Amount,
        lock_account: Address,
    },
    Bind {
        user: Address,
        keys: Vec<PublicKey>,
    },
    Unbind {
        user: Address,
        keys: Vec<PublicKey>,
    },
    AlphabetUpdate {
        id: Vec<u8>,
        alphabet: Vec<PublicKey>,
    },
    SetConfig {
        id: Vec<u8>,
        key: Vec<u8>,
        value: Vec<u8>,
    },

    // === Netmap ===
    NewEpoch {
        epoch: Epoch,
    },
    AddPeer {
        node_info: Vec<u8>,
    },
    UpdateState {
        state: NodeState,
        public_key: PublicKey,
    },
    UpdateInnerRing {
        keys: Vec<PublicKey>,
    },

    // === Alphabet ===
    Vote {
        epoch: Epoch,
        candidates: Vec<PublicKey>,
    },

    // === Balance ===
    /// `None` on either side marks mint or burn
    Transfer {
        from: Option<Address>,
        to: Option<Address>,
        amount: Amount,
    },
    TransferX {
        from: Address,
        to: Address,
        amount: Amount,
        details: Vec<u8>,
    },
    Mint {
        to: Address,
        amount: Amount,
    },
    Burn {
        from: Address,
        amount: Amount,
    },
    Lock {
        id: Vec<u8>,
        from: Address,
        to: Address,
        amount: Amount,
        until: Epoch,
    },
    Unlock {
        id: Vec<u8>,
        user: Address,
        amount: Amount,
    },

    // === Container ===
    PutSuccess {
        container_id: ContainerId,
        public_key: PublicKey,
    },
    DeleteSuccess {
        container_id: ContainerId,
    },
    SetEACLSuccess {
        container_id: ContainerId,
        public_key: PublicKey,
    },
    StartEstimation {
        epoch: Epoch,
    },
    StopEstimation {
        epoch: Epoch,
    },
}

impl Notification {
    /// Event name as seen by subscribers
    pub fn name(&self) -> &'static str {
        match self {
            Notification::Deposit { .. } => "Deposit",
            Notification::Withdraw { .. } => "Withdraw",
            Notification::Cheque { .. } => "Cheque",
            Notification::Bind { .. } => "Bind",
            Notification::Unbind { .. } => "Unbind",
            Notification::AlphabetUpdate { .. } => "AlphabetUpdate",
            Notification::SetConfig { .. } => "SetConfig",
            Notification::NewEpoch { .. } => "NewEpoch",
            Notification::AddPeer { .. } => "AddPeer",
            Notification::UpdateState { .. } => "UpdateState",
            Notification::UpdateInnerRing { .. } => "UpdateInnerRing",
            Notification::Vote { .. } => "Vote",
            Notification::Transfer { .. } => "Transfer",
            Notification::TransferX { .. } => "TransferX",
            Notification::Mint { .. } => "Mint",
            Notification::Burn { .. } => "Burn",
            Notification::Lock { .. } => "Lock",
            Notification::Unlock { .. } => "Unlock",
            Notification::PutSuccess { .. } => "PutSuccess",
            Notification::DeleteSuccess { .. } => "DeleteSuccess",
            Notification::SetEACLSuccess { .. } => "SetEACLSuccess",
            Notification::StartEstimation { .. } => "StartEstimation",
            Notification::StopEstimation { .. } => "StopEstimation",
        }
    }
}

/// A notification tagged with the emitting contract
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub contract: Address,
    pub notification: Notification,
}

impl Event {
    pub fn name(&self) -> &'static str {
        self.notification.name()
    }
}
