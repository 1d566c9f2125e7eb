// Per-process mining state: where the nonce search starts, what it aims for, and how
// long blocks have taken so far. Passed by reference so several sessions can coexist.

use crate::config::MinerConfig;
use crate::core::difficulty::{parse_hex, DifficultyTarget};
use crate::core::progress::TryEstimator;
use crate::error::Result;
use crate::utils::current_timestamp;
use log::info;
use num_bigint::BigUint;

/// Fixed base of every search origin: 0x42069 followed by 59 zero digits
pub const BASE_NONCE: &str = "4206900000000000000000000000000000000000000000000000000000000000";

/// Seconds since the epoch are scaled by this before being added to the base
pub const TIME_OFFSET_SCALE_EXP: u32 = 52;

/// `BASE_NONCE + unix_secs * 10^52`.
///
/// Miners started at different wall-clock seconds begin far apart in the nonce
/// space. This is a policy heuristic with no formal collision bound.
pub fn search_origin(unix_secs: u64) -> Result<BigUint> {
    let base = parse_hex(BASE_NONCE)?;
    Ok(base + BigUint::from(unix_secs) * time_step())
}

// Distance between the origins of two consecutive seconds
fn time_step() -> BigUint {
    BigUint::from(10u8).pow(TIME_OFFSET_SCALE_EXP)
}

/// Render a nonce the way it is stored in a block
pub fn nonce_hex(nonce: &BigUint) -> String {
    format!("{nonce:064x}")
}

#[derive(Debug, Clone)]
pub struct MiningSession {
    origin: BigUint,
    target: DifficultyTarget,
    estimator: TryEstimator,
    update_rate: u64,
    workers: usize,
    miner: String,
    note: String,
    reward: u64,
    reward_pubkey: String,
}

impl MiningSession {
    /// Start a session now; the search origin is fixed for its whole lifetime
    pub fn new(config: &MinerConfig) -> Result<MiningSession> {
        let now = current_timestamp()?;
        Self::with_start_time(config, now.max(0) as u64)
    }

    pub fn with_start_time(config: &MinerConfig, unix_secs: u64) -> Result<MiningSession> {
        config.validate()?;
        let target = DifficultyTarget::from_hex(&config.target)?;
        let seed = config
            .expected_tries
            .unwrap_or_else(|| target.expected_tries());
        let origin = search_origin(unix_secs)?;
        info!("Starting nonce: {}", nonce_hex(&origin));

        Ok(MiningSession {
            origin,
            target,
            estimator: TryEstimator::new(seed),
            update_rate: config.update_rate,
            workers: config.workers,
            miner: config.miner.clone(),
            note: config.note.clone(),
            reward: config.reward,
            reward_pubkey: config.reward_pubkey.clone(),
        })
    }

    /// Move the origin after an exhausted search
    pub fn reseed_origin(&mut self) -> Result<()> {
        let now = current_timestamp()?;
        self.reseed_origin_at(now.max(0) as u64)
    }

    /// The origin for `unix_secs`, or one time step past the current origin if that is
    /// further along. The origin only ever moves forward, so a retry within the same
    /// second never walks the range that was just exhausted.
    pub fn reseed_origin_at(&mut self, unix_secs: u64) -> Result<()> {
        let stepped = &self.origin + time_step();
        self.origin = search_origin(unix_secs)?.max(stepped);
        info!("Search origin moved to {}", nonce_hex(&self.origin));
        Ok(())
    }

    /// Override the origin outright
    pub fn set_origin(&mut self, origin: BigUint) {
        self.origin = origin;
    }

    pub fn origin(&self) -> &BigUint {
        &self.origin
    }

    pub fn origin_hex(&self) -> String {
        nonce_hex(&self.origin)
    }

    pub fn target(&self) -> &DifficultyTarget {
        &self.target
    }

    pub fn expected_tries(&self) -> f64 {
        self.estimator.expected_tries()
    }

    pub fn estimator(&self) -> &TryEstimator {
        &self.estimator
    }

    pub fn record_block(&mut self, attempts: u64) {
        self.estimator.record(attempts);
    }

    pub fn update_rate(&self) -> u64 {
        self.update_rate
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn set_workers(&mut self, workers: usize) {
        self.workers = workers.max(1);
    }

    pub fn miner(&self) -> &str {
        &self.miner
    }

    pub fn note_for(&self, height: u64) -> String {
        format!("Block {height}, {}", self.note)
    }

    pub fn reward(&self) -> u64 {
        self.reward
    }

    pub fn reward_pubkey(&self) -> &str {
        &self.reward_pubkey
    }
}
