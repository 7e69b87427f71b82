#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use solana_sdk::commitment_config::{CommitmentConfig, CommitmentLevel};
use std::time::Duration;

/// The top-level configuration for the `clearing-house-connector` library.
///
/// It bundles the Solana endpoint, the polling behaviour of the
/// [`PollingAccountLoader`](crate::loader::PollingAccountLoader) and channel capacities.
/// It is typically deserialized from a configuration file by the embedding binary.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct ConnectorConfig {
    #[cfg_attr(feature = "serde", serde(default))]
    pub solana: Solana,
    #[cfg_attr(feature = "serde", serde(default))]
    pub loader: LoaderConfig,
    #[cfg_attr(feature = "serde", serde(default))]
    pub channels: ChannelConfig,
}

/// Defines the connection settings for the Solana cluster.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct Solana {
    pub rpc_url: String,
    #[cfg_attr(feature = "serde", serde(with = "serde_commitment"))]
    pub commitment: CommitmentLevel,
}

/// Defines the behaviour of the bulk account loader.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct LoaderConfig {
    /// The interval in milliseconds between two bulk refreshes.
    pub poll_interval_ms: u64,
    /// The maximum number of accounts requested in a single `getMultipleAccounts` call.
    pub max_accounts_per_request: usize,
}

/// Defines capacities for the channels owned by the connector.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub struct ChannelConfig {
    /// The capacity of each subscriber's broadcast event channel.
    pub event_buffer: usize,
}

impl Solana {
    pub fn commitment_config(&self) -> CommitmentConfig {
        CommitmentConfig {
            commitment: self.commitment,
        }
    }
}

impl LoaderConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Solana {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8899".to_string(),
            commitment: CommitmentLevel::Confirmed,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            max_accounts_per_request: 99,
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self { event_buffer: 256 }
    }
}

#[cfg(feature = "serde")]
mod serde_commitment {

    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S>(c: &CommitmentLevel, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = match c {
            CommitmentLevel::Processed => "processed",
            CommitmentLevel::Confirmed => "confirmed",
            CommitmentLevel::Finalized => "finalized",
        };
        serializer.serialize_str(s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<CommitmentLevel, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        match s.to_lowercase().as_str() {
            "processed" => Ok(CommitmentLevel::Processed),
            "confirmed" => Ok(CommitmentLevel::Confirmed),
            "finalized" => Ok(CommitmentLevel::Finalized),
            other => Err(serde::de::Error::custom(format!(
                "unknown commitment level '{}'",
                other
            ))),
        }
    }
}
