//! Command-line interface
//!
//! This module contains the CLI commands and argument parsing
//! for the miner.

pub mod commands;

pub use commands::{Command, Opt, DEFAULT_CHAIN_LENGTH};
