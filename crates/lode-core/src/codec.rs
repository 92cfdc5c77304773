//! Binary encoding of stored records and wire payloads

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{GovError, Result};

/// Encode with bincode
pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| GovError::Serialization(e.to_string()))
}

/// Decode with bincode
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| GovError::Serialization(e.to_string()))
}

/// Decode a caller-supplied payload; malformed input is the caller's fault
pub fn decode_arg<T: DeserializeOwned>(bytes: &[u8], what: &str) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| GovError::InvalidArgument(format!("malformed {}: {}", what, e)))
}
