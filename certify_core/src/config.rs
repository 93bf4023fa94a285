// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

//! Layered configuration: built-in defaults, an optional file, then
//! `CERTIFY__SECTION__KEY` environment variables (a `.env` file is honoured).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::content::RetryPolicy;
use crate::ledger::ContractAddresses;
use crate::types::{Address, InvalidAddress};

/// Top-level engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CertifyConfig {
    #[serde(default)]
    pub content: ContentConfig,

    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,
}

/// Content gateways and upload store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Read gateways, tried in order
    pub gateways: Vec<String>,

    /// IPFS HTTP API endpoint used for uploads
    pub upload_endpoint: String,

    /// Bearer token for the upload endpoint; empty for none
    #[serde(default)]
    pub upload_token: String,

    /// Per-attempt timeout in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Cached blobs; 0 disables the cache
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            gateways: vec![
                "https://gateway.pinata.cloud".to_string(),
                "https://ipfs.io".to_string(),
            ],
            upload_endpoint: "http://127.0.0.1:5001".to_string(),
            upload_token: String::new(),
            request_timeout_ms: default_request_timeout_ms(),
            retry: RetryPolicy::default(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

/// Contract addresses and write confirmation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Identity registry address; empty when not deployed
    #[serde(default)]
    pub identity_registry: String,

    /// Credential ledger address; empty when not deployed
    #[serde(default)]
    pub credential_ledger: String,

    /// Seconds to wait for a transaction to become final
    #[serde(default = "default_finality_timeout_sec")]
    pub finality_timeout_sec: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            identity_registry: String::new(),
            credential_ledger: String::new(),
            finality_timeout_sec: default_finality_timeout_sec(),
        }
    }
}

impl LedgerConfig {
    /// Parse the configured addresses; empty values stay unset
    pub fn contract_addresses(&self) -> Result<ContractAddresses, InvalidAddress> {
        Ok(ContractAddresses {
            identity_registry: parse_optional(&self.identity_registry)?,
            credential_ledger: parse_optional(&self.credential_ledger)?,
        })
    }

    pub fn finality_timeout(&self) -> Duration {
        Duration::from_secs(self.finality_timeout_sec)
    }
}

fn parse_optional(raw: &str) -> Result<Option<Address>, InvalidAddress> {
    if raw.trim().is_empty() {
        Ok(None)
    } else {
        Address::parse(raw).map(Some)
    }
}

/// Batched read settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Maximum concurrent reads during scans
    #[serde(default = "default_fan_out")]
    pub fan_out: usize,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            fan_out: default_fan_out(),
        }
    }
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_cache_capacity() -> usize {
    256
}

fn default_finality_timeout_sec() -> u64 {
    120
}

fn default_fan_out() -> usize {
    8
}

impl CertifyConfig {
    /// Load configuration from defaults, an optional file and the environment
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        Self::load_with(path, Self::environment())
    }

    /// `CERTIFY__SECTION__KEY` variables, with comma-separated gateway lists
    fn environment() -> config::Environment {
        config::Environment::with_prefix("CERTIFY")
            .separator("__")
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key("content.gateways")
    }

    fn load_with(path: Option<&str>, environment: config::Environment) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&CertifyConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(environment);

        builder.build()?.try_deserialize()
    }
}
