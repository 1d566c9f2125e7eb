//! Configuration management
//!
//! This module handles the settings of a mining session: where the chain
//! lives on disk, the target, reward and search tunables.

pub mod settings;

pub use settings::{MinerConfig, DEFAULT_UPDATE_RATE};
