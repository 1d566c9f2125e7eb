//! # Genesis Miner - My Proof-of-Work Block Miner
//!
//! This is the miner I built to extend a fixed genesis block with blocks that
//! each pay a single coinbase reward. When I come back to this code, here's what
//! I need to remember:
//!
//! ## What I Built
//! - **Canonical Encoding**: Sorted-key, whitespace-free JSON so every record has one id
//! - **Proof of Work**: SHA-256 ids compared as 256-bit integers against a target
//! - **Nonce Search**: Single or multi-threaded search with progress checkpoints
//! - **Chain Ledger**: Genesis-rooted chain of blocks and their coinbase transactions
//! - **Crash-Safe Storage**: Two JSON files replaced through temporaries
//!
//! ## How I Organized My Code
//! - `core/`: Blocks, transactions, difficulty, the search and the ledger
//! - `storage/`: The `ChainStore` trait with file and in-memory stores
//! - `config/`: Settings from defaults, a TOML file and the environment
//! - `utils/`: Canonical encoding and digest helpers
//! - `cli/`: Command-line interface
//!
//! ## When I Need to Understand Something
//! 1. Start with `main.rs` to see the CLI commands
//! 2. Look at `core/ledger.rs` for how blocks get built, accepted and saved
//! 3. Check `core/proof_of_work.rs` for the nonce search
//! 4. Review `utils/serialization.rs` for the exact bytes that get hashed

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;
pub mod utils;

// Re-export commonly used types for convenience
pub use cli::{Command, Opt};
pub use config::MinerConfig;
pub use core::{
    Block, ChainLedger, DifficultyTarget, LogProgress, MiningSession, ProgressObserver,
    ProofOfWork, SearchOutcome, SilentProgress, Transaction,
};
pub use error::{MinerError, Result};
pub use storage::{ChainSnapshot, ChainStore, JsonFileStore, MemoryStore};
pub use utils::{canonical_bytes, current_timestamp, record_id, sha256_digest, Sha256Backend};
