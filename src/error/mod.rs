//! Error handling for the miner
//!
//! This module provides the error type shared by the encoder, the difficulty
//! comparator, the nonce search, the ledger and the storage layer.

use std::fmt;

/// Result type alias for mining operations
pub type Result<T> = std::result::Result<T, MinerError>;

/// Error types for mining operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MinerError {
    /// A record held a value the canonical encoder cannot express
    UnsupportedValue(String),
    /// A hex id, target or nonce contained something other than hex digits
    MalformedHex(String),
    /// A block or coinbase broke the chain invariants
    ChainInvariantViolation(String),
    /// The nonce would pass the top of the search space
    SearchExhausted { height: usize, attempts: u64 },
    /// File I/O errors
    Io(String),
    /// JSON (de)serialization errors
    Serialization(String),
    /// Configuration errors
    Config(String),
    /// System clock errors
    Clock(String),
}

impl fmt::Display for MinerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MinerError::UnsupportedValue(msg) => write!(f, "Unsupported value: {msg}"),
            MinerError::MalformedHex(value) => write!(f, "Malformed hex: {value:?}"),
            MinerError::ChainInvariantViolation(msg) => {
                write!(f, "Chain invariant violation: {msg}")
            }
            MinerError::SearchExhausted { height, attempts } => {
                write!(
                    f,
                    "Nonce space exhausted for block {height} after {attempts} attempts"
                )
            }
            MinerError::Io(msg) => write!(f, "I/O error: {msg}"),
            MinerError::Serialization(msg) => write!(f, "Serialization error: {msg}"),
            MinerError::Config(msg) => write!(f, "Configuration error: {msg}"),
            MinerError::Clock(msg) => write!(f, "Clock error: {msg}"),
        }
    }
}

impl std::error::Error for MinerError {}

impl From<std::io::Error> for MinerError {
    fn from(err: std::io::Error) -> Self {
        MinerError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for MinerError {
    fn from(err: serde_json::Error) -> Self {
        MinerError::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for MinerError {
    fn from(err: toml::de::Error) -> Self {
        MinerError::Config(err.to_string())
    }
}
