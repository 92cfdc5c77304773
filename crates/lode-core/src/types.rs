//! Core type definitions for Lode
//!
//! Identifiers, epoch/amount aliases, node states and the protocol
//! constants shared by every contract.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GovError, Result};

/// Global epoch counter
pub type Epoch = u64;

/// Token amount in minor units (12 decimals)
pub type Amount = u128;

/// 256-bit digest (transaction hashes, audit ids)
pub type Hash256 = [u8; 32];

/// ContainerId - BLAKE3 hash of the raw container descriptor
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct ContainerId {
    hash: [u8; 32],
}

impl ContainerId {
    pub fn new(hash: [u8; 32]) -> Self {
        Self { hash }
    }

    /// Content-derived id
    pub fn from_content(content: &[u8]) -> Self {
        Self {
            hash: lode_crypto::hash_blake3(content),
        }
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let hash: [u8; 32] = bytes.try_into().map_err(|_| {
            GovError::InvalidArgument(format!("container id must be 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Self { hash })
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| GovError::InvalidArgument(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.hash)
    }
}

impl fmt::Debug for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContainerId({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// Declared storage node state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeState {
    Online,
    Offline,
    Maintenance,
}

impl NodeState {
    /// Wire representation
    pub fn as_u8(&self) -> u8 {
        match self {
            NodeState::Online => 1,
            NodeState::Offline => 2,
            NodeState::Maintenance => 3,
        }
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(NodeState::Online),
            2 => Some(NodeState::Offline),
            3 => Some(NodeState::Maintenance),
            _ => None,
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Online => "online",
            NodeState::Offline => "offline",
            NodeState::Maintenance => "maintenance",
        };
        f.write_str(s)
    }
}

/// Protocol constants
pub mod constants {
    /// Internal token symbol
    pub const SYMBOL: &str = "LODE";

    /// Internal token precision
    pub const DECIMALS: u32 = 12;

    /// Snapshots kept: current + previous
    pub const DEFAULT_SNAPSHOT_RETENTION: u64 = 2;

    /// Zone used by `PutNamed` when none is given
    pub const DEFAULT_ZONE: &str = "lode";

    /// Longest container name label
    pub const MAX_NAME_LENGTH: usize = 63;

    /// Network configuration keys
    pub mod config_keys {
        pub const CONTAINER_FEE: &[u8] = b"ContainerFee";
        pub const CONTAINER_ALIAS_FEE: &[u8] = b"ContainerAliasFee";
        pub const PEER_REGISTRATION_FEE: &[u8] = b"PeerRegistrationFee";
        pub const WITHDRAW_LOCK_EPOCHS: &[u8] = b"WithdrawLockEpochs";
    }
}
