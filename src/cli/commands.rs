use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Blocks the ledger should hold when `mine` stops, genesis included
pub const DEFAULT_CHAIN_LENGTH: usize = 1000;

#[derive(Debug, Parser)]
#[command(name = "genesis-miner")]
pub struct Opt {
    #[arg(long = "config", global = true, help = "TOML file with miner settings")]
    pub config: Option<PathBuf>,
    #[arg(
        long = "data-dir",
        global = true,
        help = "Directory holding blocks.json and coinbase.json"
    )]
    pub data_dir: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(name = "mine", about = "Mine blocks until the chain reaches the given length")]
    Mine {
        #[arg(
            long = "blocks",
            default_value_t = DEFAULT_CHAIN_LENGTH,
            help = "Number of blocks the chain should hold, genesis included"
        )]
        blocks: usize,
        #[arg(long = "workers", help = "Number of search threads")]
        workers: Option<usize>,
    },
    #[command(name = "printchain", about = "Print all blocks in the chain")]
    Printchain,
    #[command(name = "verify", about = "Load the saved chain and check every invariant")]
    Verify,
}
