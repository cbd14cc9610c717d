//! Configuration management for PowLedger

use crate::error::LedgerError;
use crate::miner::{Difficulty, SearchLimits};
use crate::transaction::{amount_from_f64, Amount};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "powledger.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    /// Balance a freshly registered participant starts with
    #[serde(default)]
    pub starting_balance: f64,
    /// Length of the random decimal suffix appended to a taken id
    #[serde(default = "default_suffix_digits")]
    pub id_suffix_digits: u32,
    #[serde(default = "default_max_pending")]
    pub max_pending: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MinerConfig {
    #[serde(default = "default_reward")]
    pub reward: f64,
    /// Hex substring the hash prefix must contain
    #[serde(default = "default_pattern")]
    pub difficulty_pattern: String,
    /// Number of leading hash characters searched for the pattern
    #[serde(default = "default_prefix_window")]
    pub prefix_window: usize,
    /// Worker threads for the search; 0 uses the available parallelism
    #[serde(default)]
    pub threads: usize,
    #[serde(default)]
    pub max_attempts: Option<u64>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    /// Pause between sealing rounds of the background service
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            starting_balance: 0.0,
            id_suffix_digits: default_suffix_digits(),
            max_pending: default_max_pending(),
        }
    }
}

impl Default for MinerConfig {
    fn default() -> Self {
        Self {
            reward: default_reward(),
            difficulty_pattern: default_pattern(),
            prefix_window: default_prefix_window(),
            threads: 0,
            max_attempts: None,
            timeout_ms: None,
            interval_ms: default_interval_ms(),
        }
    }
}

impl LedgerConfig {
    pub fn starting_balance(&self) -> Result<Amount, LedgerError> {
        amount_from_f64(self.starting_balance)
            .map_err(|e| LedgerError::ConfigError(format!("ledger.starting_balance: {}", e)))
    }
}

impl MinerConfig {
    pub fn reward(&self) -> Result<Amount, LedgerError> {
        amount_from_f64(self.reward)
            .map_err(|e| LedgerError::ConfigError(format!("miner.reward: {}", e)))
    }

    pub fn difficulty(&self) -> Result<Difficulty, LedgerError> {
        Difficulty::new(&self.difficulty_pattern, self.prefix_window)
    }

    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_attempts: self.max_attempts,
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

fn default_suffix_digits() -> u32 {
    4
}

fn default_max_pending() -> usize {
    10_000
}

fn default_reward() -> f64 {
    6.25
}

fn default_pattern() -> String {
    "0000".to_string()
}

fn default_prefix_window() -> usize {
    10
}

fn default_interval_ms() -> u64 {
    1_000
}

impl Config {
    pub fn from_toml(source: &str) -> Result<Self, LedgerError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the values the ledger would otherwise trip over at runtime.
    pub fn validate(&self) -> Result<(), LedgerError> {
        self.ledger.starting_balance()?;
        self.miner.reward()?;
        self.miner.difficulty()?;

        if self.ledger.id_suffix_digits == 0 || self.ledger.id_suffix_digits > 9 {
            return Err(LedgerError::ConfigError(
                "ledger.id_suffix_digits must be between 1 and 9".to_string(),
            ));
        }
        if self.ledger.max_pending == 0 {
            return Err(LedgerError::ConfigError(
                "ledger.max_pending must be at least 1".to_string(),
            ));
        }
        if self.miner.max_attempts == Some(0) {
            return Err(LedgerError::ConfigError(
                "miner.max_attempts must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file is absent or empty.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, LedgerError> {
    let path = path.as_ref();
    let config_str = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e.into()),
    };

    if config_str.trim().is_empty() {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    Config::from_toml(&config_str)
}
