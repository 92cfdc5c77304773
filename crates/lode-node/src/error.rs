//! Node error types

use lode_core::GovError;
use lode_crypto::CryptoError;
use thiserror::Error;

/// Errors raised by the node host, bootstrap and processor
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("Config render error: {0}")]
    ConfigRender(#[from] toml::ser::Error),

    #[error("Contract call {op} failed: {source}")]
    Contract {
        op: String,
        #[source]
        source: GovError,
    },

    #[error("Cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Processor error: {0}")]
    Processor(String),
}

impl NodeError {
    /// Wrap a contract abort with the name of the failed call
    pub fn contract(op: impl Into<String>, source: GovError) -> Self {
        Self::Contract {
            op: op.into(),
            source,
        }
    }

    /// Underlying contract abort, if any
    pub fn governance(&self) -> Option<&GovError> {
        match self {
            Self::Contract { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Self::Config(_) => 3001,
            Self::Io(_) => 3002,
            Self::ConfigParse(_) => 3003,
            Self::ConfigRender(_) => 3004,
            Self::Contract { source, .. } => source.code(),
            Self::Crypto(_) => 3005,
            Self::Processor(_) => 3006,
        }
    }
}

pub type Result<T> = std::result::Result<T, NodeError>;
