// Chain persistence as two JSON arrays on disk: blocks.json and coinbase.json
// Both files are written to temporaries first and renamed into place, coinbase first,
// so a crash can at worst leave one extra trailing coinbase (see ChainLedger::restore),
// or on the very first save a lone coinbase.json

use crate::core::block::GENESIS_BLOCK;
use crate::core::{Block, Transaction};
use crate::error::{MinerError, Result};
use crate::storage::{ChainSnapshot, ChainStore};
use crate::utils::to_pretty_json;
use log::{debug, warn};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

pub const FILE_NAME_BLOCKS: &str = "blocks.json";
pub const FILE_NAME_COINBASE: &str = "coinbase.json";

const TMP_SUFFIX: &str = "tmp";

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> JsonFileStore {
        JsonFileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn blocks_path(&self) -> PathBuf {
        self.dir.join(FILE_NAME_BLOCKS)
    }

    pub fn coinbase_path(&self) -> PathBuf {
        self.dir.join(FILE_NAME_COINBASE)
    }

    fn write_temp(path: &Path, bytes: &[u8]) -> Result<PathBuf> {
        let tmp = path.with_extension(format!("json.{TMP_SUFFIX}"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tmp)
            .map_err(|e| MinerError::Io(format!("Cannot create {}: {e}", tmp.display())))?;
        let mut writer = BufWriter::new(file);
        writer.write_all(bytes)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| MinerError::Io(e.to_string()))?
            .sync_all()?;
        Ok(tmp)
    }

    fn read_array<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
        let bytes = fs::read(path)
            .map_err(|e| MinerError::Io(format!("Cannot read {}: {e}", path.display())))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            MinerError::Serialization(format!("Cannot parse {}: {e}", path.display()))
        })
    }

    #[cfg(unix)]
    fn sync_dir(&self) -> Result<()> {
        File::open(&self.dir)?.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self) -> Result<()> {
        Ok(())
    }
}

impl ChainStore for JsonFileStore {
    fn load(&self) -> Result<Option<ChainSnapshot>> {
        let blocks_path = self.blocks_path();
        let coinbase_path = self.coinbase_path();

        match (blocks_path.exists(), coinbase_path.exists()) {
            (false, false) => Ok(None),
            (true, true) => {
                let blocks: Vec<Block> = Self::read_array(&blocks_path)?;
                let coinbase: Vec<Transaction> = Self::read_array(&coinbase_path)?;
                debug!(
                    "Loaded {} blocks and {} coinbase transactions from {}",
                    blocks.len(),
                    coinbase.len(),
                    self.dir.display()
                );
                Ok(Some(ChainSnapshot { blocks, coinbase }))
            }
            // The first save died between its two renames: the genesis block was never written
            (false, true) => {
                let coinbase: Vec<Transaction> = Self::read_array(&coinbase_path)?;
                warn!(
                    "Only {FILE_NAME_COINBASE} exists in {}, assuming a genesis-only chain",
                    self.dir.display()
                );
                Ok(Some(ChainSnapshot {
                    blocks: vec![GENESIS_BLOCK.clone()],
                    coinbase,
                }))
            }
            (true, false) => Err(MinerError::ChainInvariantViolation(format!(
                "Only {FILE_NAME_BLOCKS} exists in {}",
                self.dir.display()
            ))),
        }
    }

    fn save(&self, blocks: &[Block], coinbase: &[Transaction]) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        // Serialize both before touching the disk so a failure leaves nothing behind
        let blocks_bytes = to_pretty_json(blocks)?;
        let coinbase_bytes = to_pretty_json(coinbase)?;

        let coinbase_tmp = Self::write_temp(&self.coinbase_path(), &coinbase_bytes)?;
        let blocks_tmp = Self::write_temp(&self.blocks_path(), &blocks_bytes)?;

        fs::rename(&coinbase_tmp, self.coinbase_path())?;
        fs::rename(&blocks_tmp, self.blocks_path())?;
        self.sync_dir()?;

        debug!(
            "Saved {} blocks and {} coinbase transactions to {}",
            blocks.len(),
            coinbase.len(),
            self.dir.display()
        );
        Ok(())
    }
}
