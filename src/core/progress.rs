//! Hash-rate measurement and completion estimates for the nonce search
//!
//! The search loop feeds attempt counts into a [`ThroughputMeter`]; every
//! `update_rate` attempts it yields a hash rate, which is combined with the
//! session's [`TryEstimator`] into a [`Progress`] snapshot and handed to a
//! [`ProgressObserver`]. None of this affects block validity.

use log::info;
use std::fmt;
use std::time::{Duration, Instant};

/// Running mean of the attempts needed per block in this session
#[derive(Debug, Clone, PartialEq)]
pub struct TryEstimator {
    seed: f64,
    total_attempts: u128,
    blocks: u64,
}

impl TryEstimator {
    pub fn new(seed: f64) -> TryEstimator {
        TryEstimator {
            seed,
            total_attempts: 0,
            blocks: 0,
        }
    }

    /// Fold the attempt count of a freshly mined block into the mean
    pub fn record(&mut self, attempts: u64) {
        self.total_attempts += u128::from(attempts);
        self.blocks += 1;
    }

    /// The seed until a block has been mined, then the arithmetic mean
    pub fn expected_tries(&self) -> f64 {
        if self.blocks == 0 {
            return self.seed;
        }
        self.total_attempts as f64 / self.blocks as f64
    }

    pub fn blocks_recorded(&self) -> u64 {
        self.blocks
    }
}

/// Measures attempts per second between fixed-size checkpoints
#[derive(Debug, Clone)]
pub struct ThroughputMeter {
    update_rate: u64,
    last_checkpoint: Instant,
    hash_rate: Option<f64>,
}

impl ThroughputMeter {
    pub fn new(update_rate: u64) -> ThroughputMeter {
        ThroughputMeter {
            update_rate: update_rate.max(1),
            last_checkpoint: Instant::now(),
            hash_rate: None,
        }
    }

    /// Called after every attempt; returns the new hash rate on checkpoints
    pub fn tick(&mut self, attempts: u64) -> Option<f64> {
        if attempts == 0 || attempts % self.update_rate != 0 {
            return None;
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_checkpoint);
        self.last_checkpoint = now;
        let rate = Self::rate(self.update_rate, elapsed);
        self.hash_rate = Some(rate);
        Some(rate)
    }

    /// `attempts / elapsed`; intervals are floored at one nanosecond
    pub fn rate(attempts: u64, elapsed: Duration) -> f64 {
        attempts as f64 / elapsed.as_secs_f64().max(1e-9)
    }

    pub fn last_hash_rate(&self) -> Option<f64> {
        self.hash_rate
    }
}

/// One checkpoint of an in-progress search
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub height: u64,
    pub attempts: u64,
    pub fraction_complete: f64,
    pub hash_rate: f64,
    /// Negative once the search has run past the expected number of tries
    pub estimated_seconds_remaining: f64,
}

impl Progress {
    pub fn new(height: u64, attempts: u64, expected_tries: f64, hash_rate: f64) -> Progress {
        // An all-immediate session has a mean of zero tries; only that case is replaced
        let expected = if expected_tries > 0.0 { expected_tries } else { 1.0 };
        let fraction_complete = attempts as f64 / expected;
        let estimated_seconds_remaining = (1.0 - fraction_complete) * expected / hash_rate;
        Progress {
            height,
            attempts,
            fraction_complete,
            hash_rate,
            estimated_seconds_remaining,
        }
    }
}

/// Scale a hash rate into H/s, KH/s, MH/s, GH/s or TH/s
pub fn format_hash_rate(hash_rate: f64) -> String {
    const UNITS: [(f64, &str); 4] = [(1e12, "TH/s"), (1e9, "GH/s"), (1e6, "MH/s"), (1e3, "KH/s")];
    for (scale, unit) in UNITS {
        if hash_rate >= scale {
            return format!("{} {unit}", (hash_rate / scale).round());
        }
    }
    format!("{} H/s", hash_rate.round())
}

/// Signed `HH:MM:SS`, with a leading `-` when the estimate has gone negative
pub fn format_eta(seconds: f64) -> String {
    if !seconds.is_finite() {
        return " --:--:--".to_string();
    }
    let prefix = if seconds < 0.0 { '-' } else { ' ' };
    let total = seconds.abs() as u64;
    format!(
        "{prefix}{:02}:{:02}:{:02}",
        total / 3600,
        (total / 60) % 60,
        total % 60
    )
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Block {}: {} tries, {:>5.1}%, {:>9}, eta{}",
            self.height,
            self.attempts,
            self.fraction_complete * 100.0,
            format_hash_rate(self.hash_rate),
            format_eta(self.estimated_seconds_remaining)
        )
    }
}

/// Receives search checkpoints; the presentation layer plugs in here
pub trait ProgressObserver {
    fn on_checkpoint(&mut self, progress: &Progress);

    fn on_block_found(&mut self, _height: u64, _id: &str, _attempts: u64, _elapsed: Duration) {}
}

/// Default observer: writes every checkpoint to the log
#[derive(Debug, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_checkpoint(&mut self, progress: &Progress) {
        info!("{progress}");
    }

    fn on_block_found(&mut self, height: u64, id: &str, attempts: u64, elapsed: Duration) {
        info!(
            "Block {height} found after {attempts} tries in {:.1}s: {id}",
            elapsed.as_secs_f64()
        );
    }
}

/// Observer that drops everything
#[derive(Debug, Default)]
pub struct SilentProgress;

impl ProgressObserver for SilentProgress {
    fn on_checkpoint(&mut self, _progress: &Progress) {}
}
