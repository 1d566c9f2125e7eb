//! Core mining functionality
//!
//! Blocks and coinbase transactions, the difficulty rules, the nonce search
//! and the ledger that ties accepted blocks together.

pub mod block;
pub mod difficulty;
pub mod ledger;
pub mod monetary;
pub mod progress;
pub mod proof_of_work;
pub mod session;
pub mod transaction;

pub use block::{Block, RecordKind, CHAIN_TARGET, GENESIS_BLOCK};
pub use difficulty::{is_valid, parse_hex, DifficultyTarget};
pub use ledger::{validate_chain, Candidate, ChainLedger};
pub use monetary::{COINBASE_REWARD, REWARD_PUBKEY, UNITS_PER_COIN};
pub use progress::{
    LogProgress, Progress, ProgressObserver, SilentProgress, ThroughputMeter, TryEstimator,
};
pub use proof_of_work::{ProofOfWork, SearchOutcome};
pub use session::{nonce_hex, search_origin, MiningSession, BASE_NONCE};
pub use transaction::{Transaction, TxOutput};
