use anyhow::{anyhow, Context, Result};
use clearing_house_connector::{config::ConnectorConfig, AccountKind, OptionalKindSet};
use clearing_house_logger::LogConfig;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;
use std::str::FromStr;

/// The top-level configuration for the clearing house monitor.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct MonitorConfig {
    #[serde(default)]
    pub connector: ConnectorConfig,
    #[serde(default)]
    pub monitor: MonitorSpecificConfig,
}

/// Settings that are unique to the monitor binary.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct MonitorSpecificConfig {
    /// Base58 address of the clearing house program.
    pub program_id: String,
    /// Optional account kinds to track, by event name (`tradeHistoryAccount`, ...).
    pub optional_accounts: Vec<String>,
    pub log: LogConfig,
}

impl Default for MonitorSpecificConfig {
    fn default() -> Self {
        Self {
            program_id: clearing_house_state::ID.to_string(),
            optional_accounts: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl MonitorSpecificConfig {
    pub fn program_id(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.program_id)
            .with_context(|| format!("Invalid program id '{}'", self.program_id))
    }

    /// Parses `optional-accounts`. Required kinds listed here are ignored.
    pub fn optional_kinds(&self) -> Result<OptionalKindSet> {
        self.optional_accounts
            .iter()
            .map(|name| AccountKind::from_str(name).map_err(|e| anyhow!(e)))
            .collect()
    }
}

/// Loads the monitor configuration from a TOML file.
///
/// Values can be overridden with `CHM__`-prefixed environment variables,
/// e.g. `CHM__CONNECTOR__SOLANA__COMMITMENT=finalized`.
pub fn load_config(path: &str) -> Result<MonitorConfig> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(config::Environment::with_prefix("CHM").separator("__"));

    let settings: MonitorConfig = builder
        .build()
        .context(format!("Failed to build configuration from '{}'", path))?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    Ok(settings)
}
