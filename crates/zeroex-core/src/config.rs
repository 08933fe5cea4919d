//! Simulator configuration.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors loading a [`SimulatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Log level per component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    /// Global default level: "trace" | "debug" | "info" | "warn" | "error"
    #[serde(default = "default_level")]
    pub level: String,
    /// Override per component: crate name → level
    #[serde(default)]
    pub components: HashMap<String, String>,
    /// Emit JSON structured logs (true) or human-readable text (false)
    #[serde(default)]
    pub json: bool,
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            components: HashMap::new(),
            json: false,
        }
    }
}

impl LogConfig {
    /// `EnvFilter` directive string, e.g. `"info,zeroex_features=debug"`.
    pub fn directives(&self) -> String {
        let mut components: Vec<_> = self.components.iter().collect();
        components.sort();
        let mut directives = self.level.clone();
        for (component, level) in components {
            directives.push_str(&format!(",{}={}", component.replace('-', "_"), level));
        }
        directives
    }
}

/// Chain environment and deployment parameters of a simulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulatorConfig {
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    #[serde(default = "default_block_number")]
    pub block_number: u64,
    /// Unix seconds of the starting block.
    #[serde(default = "default_timestamp")]
    pub timestamp: u64,
    /// `tx.gasprice` in wei.
    #[serde(default = "default_gas_price")]
    pub gas_price: u64,
    /// Legacy exchange protocol fee multiplier (fee = multiplier × gas price).
    #[serde(default = "default_protocol_fee_multiplier")]
    pub protocol_fee_multiplier: u64,
    /// Wei credited to the deployer account before migrating.
    #[serde(default = "default_deployer_balance")]
    pub deployer_balance: u128,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_chain_id() -> u64 { 1 }
fn default_block_number() -> u64 { 1 }
fn default_timestamp() -> u64 { 1_600_000_000 }
fn default_gas_price() -> u64 { 1_000_000_000 }
fn default_protocol_fee_multiplier() -> u64 { 70_000 }
fn default_deployer_balance() -> u128 { 100_000_000_000_000_000_000 }

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            chain_id: default_chain_id(),
            block_number: default_block_number(),
            timestamp: default_timestamp(),
            gas_price: default_gas_price(),
            protocol_fee_multiplier: default_protocol_fee_multiplier(),
            deployer_balance: default_deployer_balance(),
            log: LogConfig::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_id == 0 {
            return Err(ConfigError::Invalid("chain_id must be non-zero".into()));
        }
        if self.block_number == 0 {
            return Err(ConfigError::Invalid("block_number must be non-zero".into()));
        }
        Ok(())
    }
}
