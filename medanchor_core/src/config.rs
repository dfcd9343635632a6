// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Medanchor Contributors

//! Configuration for the ledger connection and the off-chain profile store

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::DEFAULT_DERIVATION_PATH;
use crate::types::Address;

/// Prefix of environment variables overriding configuration, e.g.
/// `MEDANCHOR__LEDGER__CHAIN_ID=11155111`
pub const ENV_PREFIX: &str = "MEDANCHOR";

/// Errors loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),
}

/// Ledger connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the wallet provider
    pub rpc_url: String,

    /// Address of the identity registry contract
    pub contract_address: Address,

    /// Chain the registry is deployed on
    pub chain_id: u64,

    /// Blocks a transaction must be buried under before it counts as final
    pub confirmations: u64,

    /// Receipt polling interval in milliseconds
    pub poll_interval_ms: u64,

    /// Upper bound on waiting for a confirmation, in milliseconds
    pub confirmation_timeout_ms: u64,

    /// Per-request HTTP timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            contract_address: Address::ZERO,
            chain_id: 31337,
            confirmations: 1,
            poll_interval_ms: 1_000,
            confirmation_timeout_ms: 60_000, // five 12s blocks
            request_timeout_ms: 10_000,
        }
    }
}

impl LedgerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Off-chain profile store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileStoreConfig {
    /// Base URL of the profile service; the in-memory store is used when unset
    pub url: Option<String>,

    /// Per-request HTTP timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ProfileStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            request_timeout_ms: 5_000,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub ledger: LedgerConfig,
    pub profile_store: ProfileStoreConfig,
    /// BIP-32 path identities are derived along
    pub derivation_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ledger: LedgerConfig::default(),
            profile_store: ProfileStoreConfig::default(),
            derivation_path: DEFAULT_DERIVATION_PATH.to_string(),
        }
    }
}

impl AppConfig {
    /// Layer defaults, an optional config file, then `MEDANCHOR__*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&AppConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
