// Coinbase transactions - the reward attached to every mined block
// This miner only ever produces the single-output reward transaction, nothing else moves value

use crate::core::block::RecordKind;
use crate::error::{MinerError, Result};
use crate::utils::{record_id, DigestBackend};
use serde::{Deserialize, Serialize};

// One output: how much is paid and to which key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    value: u64,     // Reward in minimal units
    pubkey: String, // Hex public key of the recipient
}

impl TxOutput {
    pub fn new(value: u64, pubkey: &str) -> TxOutput {
        TxOutput {
            value,
            pubkey: pubkey.to_string(),
        }
    }

    pub fn get_value(&self) -> u64 {
        self.value
    }

    pub fn get_pubkey(&self) -> &str {
        self.pubkey.as_str()
    }
}

// The field order here is the order written to coinbase.json
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(rename = "type")]
    kind: RecordKind,
    height: u64,            // Height of the block this reward belongs to
    outputs: Vec<TxOutput>, // Exactly one for coinbase transactions
}

impl Transaction {
    // When I create the reward transaction for the block at `height`
    pub fn new_coinbase_tx(height: u64, reward: u64, pubkey: &str) -> Transaction {
        Transaction {
            kind: RecordKind::Transaction,
            height,
            outputs: vec![TxOutput::new(reward, pubkey)],
        }
    }

    pub fn get_height(&self) -> u64 {
        self.height
    }

    pub fn get_outputs(&self) -> &[TxOutput] {
        self.outputs.as_slice()
    }

    pub fn is_coinbase(&self) -> bool {
        self.kind == RecordKind::Transaction && self.outputs.len() == 1
    }

    /// The transaction id: digest of its canonical encoding
    pub fn id<B: DigestBackend + ?Sized>(&self, backend: &B) -> Result<String> {
        record_id(backend, self)
    }

    /// Check the shape a coinbase loaded from disk must have
    pub fn validate_coinbase(&self, expected_height: u64) -> Result<()> {
        if self.kind != RecordKind::Transaction {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Coinbase at height {expected_height} is tagged {:?}",
                self.kind
            )));
        }
        if self.height != expected_height {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Coinbase height {} does not match block height {expected_height}",
                self.height
            )));
        }
        if !self.is_coinbase() {
            return Err(MinerError::ChainInvariantViolation(format!(
                "Coinbase at height {expected_height} has {} outputs",
                self.outputs.len()
            )));
        }
        Ok(())
    }
}
