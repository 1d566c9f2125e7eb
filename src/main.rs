// Entry point for the miner CLI
// Everything interesting lives in the library; this file only wires config, storage and output
use clap::Parser;
use genesis_miner::core::monetary::conversions::format_units;
use genesis_miner::{
    ChainLedger, Command, JsonFileStore, LogProgress, MinerConfig, MiningSession, Opt,
};
use log::{error, info, LevelFilter};
use std::process;

fn main() {
    // Info level shows block progress without the per-save debug noise
    env_logger::builder().filter_level(LevelFilter::Info).init();

    let opt = Opt::parse();

    if let Err(e) = run_command(opt) {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(opt: Opt) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = MinerConfig::load(opt.config.as_deref())?;
    if let Some(dir) = opt.data_dir {
        config.data_dir = dir;
    }
    let store = JsonFileStore::new(config.data_dir.clone());

    match opt.command {
        Command::Mine { blocks, workers } => {
            if let Some(workers) = workers {
                config.workers = workers;
            }
            config.validate()?;

            let mut ledger = ChainLedger::restore(&store)?;
            let mut session = MiningSession::new(&config)?;
            info!(
                "Chain holds {} blocks, mining up to {blocks} with {} worker(s)",
                ledger.blocks().len(),
                session.workers()
            );

            let mined = ledger.mine(blocks, &mut session, &store, &mut LogProgress)?;
            println!(
                "Mined {mined} blocks. Height {}, tip {}",
                ledger.height(),
                ledger.tip_id()
            );
        }
        Command::Printchain => {
            let ledger = ChainLedger::restore(&store)?;
            let backend = ledger.backend();
            for (height, block) in ledger.blocks().iter().enumerate() {
                println!("Block {height}: {}", block.id(backend)?);
                println!("Previous id: {}", block.get_previd().unwrap_or("none"));
                println!("Created: {}", block.get_created());
                println!("Miner: {}", block.get_miner());
                println!("Nonce: {}", block.get_nonce());
                println!("Note: {}", block.get_note());
                for txid in block.get_txids() {
                    println!("- Transaction txid: {txid}");
                }
                if height > 0 {
                    if let Some(tx) = ledger.coinbase_transactions().get(height - 1) {
                        for output in tx.get_outputs() {
                            println!(
                                "-- Output value = {} coins, to = {}",
                                format_units(output.get_value()),
                                output.get_pubkey()
                            );
                        }
                    }
                }
                println!()
            }
        }
        Command::Verify => {
            let ledger = ChainLedger::restore(&store)?;
            ledger.verify()?;
            println!(
                "Chain is valid. Height {}, tip {}",
                ledger.height(),
                ledger.tip_id()
            );
        }
    }
    Ok(())
}
