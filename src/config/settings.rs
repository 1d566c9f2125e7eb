use crate::core::block::CHAIN_TARGET;
use crate::core::difficulty::{parse_hex, DifficultyTarget};
use crate::core::monetary::{COINBASE_REWARD, REWARD_PUBKEY};
use crate::error::{MinerError, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

static DEFAULT_DATA_DIR: &str = "data";
static DEFAULT_MINER: &str = "group 6 will rule";

/// Attempts between two hash-rate checkpoints
pub const DEFAULT_UPDATE_RATE: u64 = 20_000;

const DATA_DIR_KEY: &str = "MINER_DATA_DIR";
const MINER_NAME_KEY: &str = "MINER_NAME";
const WORKERS_KEY: &str = "MINER_WORKERS";

/// Settings of one mining session.
///
/// Values come from the defaults below, then an optional TOML file, then the
/// `MINER_*` environment variables, then command-line flags.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinerConfig {
    pub data_dir: PathBuf,
    pub target: String,
    pub miner: String,
    /// Appended to "Block <height>, " in every mined block's note
    pub note: String,
    pub reward: u64,
    pub reward_pubkey: String,
    pub update_rate: u64,
    /// Seed for the expected-tries estimate; derived from the target when absent
    pub expected_tries: Option<f64>,
    pub workers: usize,
}

impl Default for MinerConfig {
    fn default() -> Self {
        MinerConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            target: CHAIN_TARGET.to_string(),
            miner: DEFAULT_MINER.to_string(),
            note: DEFAULT_MINER.to_string(),
            reward: COINBASE_REWARD,
            reward_pubkey: REWARD_PUBKEY.to_string(),
            update_rate: DEFAULT_UPDATE_RATE,
            expected_tries: None,
            workers: 1,
        }
    }
}

impl MinerConfig {
    /// Load from an optional TOML file and the environment, then validate
    pub fn load(path: Option<&Path>) -> Result<MinerConfig> {
        let mut config = match path {
            Some(path) => {
                let text = fs::read_to_string(path).map_err(|e| {
                    MinerError::Config(format!("Cannot read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&text)?
            }
            None => MinerConfig::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<MinerConfig> {
        Ok(toml::from_str(text)?)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| env::var(key).ok())
    }

    // `lookup` maps a MINER_* key to its value, if set
    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_KEY) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(MINER_NAME_KEY) {
            self.miner = name;
        }
        if let Some(workers) = lookup(WORKERS_KEY) {
            self.workers = workers
                .parse()
                .map_err(|e| MinerError::Config(format!("{WORKERS_KEY}={workers}: {e}")))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        DifficultyTarget::from_hex(&self.target)
            .map_err(|e| MinerError::Config(format!("Invalid target: {e}")))?;
        parse_hex(&self.reward_pubkey)
            .map_err(|e| MinerError::Config(format!("Invalid reward pubkey: {e}")))?;
        if self.update_rate == 0 {
            return Err(MinerError::Config("update_rate must be positive".to_string()));
        }
        if self.workers == 0 {
            return Err(MinerError::Config("workers must be positive".to_string()));
        }
        if let Some(seed) = self.expected_tries {
            if !seed.is_finite() || seed <= 0.0 {
                return Err(MinerError::Config(format!(
                    "expected_tries must be a positive number, got {seed}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn overridden(vars: &[(&str, &str)]) -> Result<MinerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = MinerConfig::default();
        config.apply_overrides(|key| vars.get(key).cloned())?;
        Ok(config)
    }

    #[test]
    fn test_no_overrides_keeps_defaults() {
        assert_eq!(overridden(&[]).unwrap(), MinerConfig::default());
    }

    #[test]
    fn test_data_dir_override() {
        let config = overridden(&[(DATA_DIR_KEY, "/var/lib/miner")]).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/var/lib/miner"));
        assert_eq!(config.miner, DEFAULT_MINER);
    }

    #[test]
    fn test_miner_name_override() {
        let config = overridden(&[(MINER_NAME_KEY, "bob")]).unwrap();
        assert_eq!(config.miner, "bob");
        assert_eq!(config.data_dir, PathBuf::from(DEFAULT_DATA_DIR));
    }

    #[test]
    fn test_workers_override() {
        let config = overridden(&[(WORKERS_KEY, "8")]).unwrap();
        assert_eq!(config.workers, 8);
    }

    #[test]
    fn test_bad_workers_override_is_config_error() {
        let result = overridden(&[(WORKERS_KEY, "many")]);
        assert!(matches!(
            result,
            Err(MinerError::Config(msg)) if msg.starts_with("MINER_WORKERS=many")
        ));
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = MinerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.target, CHAIN_TARGET);
        assert_eq!(config.update_rate, DEFAULT_UPDATE_RATE);
        assert_eq!(config.workers, 1);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = MinerConfig::from_toml_str(
            r#"
            miner = "alice"
            workers = 4
            data_dir = "/tmp/chain"
            "#,
        )
        .unwrap();
        assert_eq!(config.miner, "alice");
        assert_eq!(config.workers, 4);
        assert_eq!(config.data_dir, PathBuf::from("/tmp/chain"));
        assert_eq!(config.reward, COINBASE_REWARD);
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let result = MinerConfig::from_toml_str("difficulty = 4");
        assert!(matches!(result, Err(MinerError::Config(_))));
    }

    #[test]
    fn test_validation_failures() {
        let config = MinerConfig {
            target: "not hex".to_string(),
            ..MinerConfig::default()
        };
        assert!(matches!(config.validate(), Err(MinerError::Config(_))));

        let config = MinerConfig {
            workers: 0,
            ..MinerConfig::default()
        };
        assert!(config.validate().is_err());

        let config = MinerConfig {
            expected_tries: Some(-1.0),
            ..MinerConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("miner.toml");
        fs::write(&path, "update_rate = 500\nexpected_tries = 1000.0\n").unwrap();
        let config = MinerConfig::load(Some(&path)).unwrap();
        assert_eq!(config.update_rate, 500);
        assert_eq!(config.expected_tries, Some(1000.0));
    }
}
