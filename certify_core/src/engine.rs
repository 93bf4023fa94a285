// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use crate::authorization::AuthorizationChecker;
use crate::config::CertifyConfig;
use crate::content::{ContentResolver, ResolverError};
use crate::directory::Directory;
use crate::issuance::IssuanceWorkflow;
use crate::ledger::{LedgerClient, LedgerGateway};
use crate::registration::RegistrationWorkflow;
use crate::types::InvalidAddress;

/// Errors raised while assembling an engine from configuration
#[derive(Debug, Error)]
pub enum EngineSetupError {
    #[error("Invalid contract address in configuration: {0}")]
    InvalidContract(#[from] InvalidAddress),

    #[error("Content resolver setup failed: {0}")]
    Content(#[from] ResolverError),
}

/// Wires the ledger gateway and content resolver into the four workflows
pub struct CertifyEngine {
    ledger: Arc<LedgerGateway>,
    content: Arc<ContentResolver>,
    fan_out: usize,
}

impl CertifyEngine {
    pub fn new(ledger: LedgerGateway, content: ContentResolver) -> Self {
        Self {
            ledger: Arc::new(ledger),
            content: Arc::new(content),
            fan_out: 8,
        }
    }

    pub fn with_fan_out(mut self, fan_out: usize) -> Self {
        self.fan_out = fan_out.max(1);
        self
    }

    /// Build HTTP content access from configuration on top of `client`
    pub fn from_config(config: &CertifyConfig, client: Arc<dyn LedgerClient>) -> Result<Self, EngineSetupError> {
        let contracts = config.ledger.contract_addresses()?;
        let ledger = LedgerGateway::new(client, contracts).with_finality_timeout(config.ledger.finality_timeout());
        let content = ContentResolver::from_config(&config.content)?;

        info!(
            "Engine ready: {} gateways, upload via {}",
            config.content.gateways.len(),
            config.content.upload_endpoint
        );
        Ok(Self::new(ledger, content).with_fan_out(config.directory.fan_out))
    }

    pub fn registration(&self) -> RegistrationWorkflow {
        RegistrationWorkflow::new(self.ledger.clone(), self.content.clone())
    }

    pub fn issuance(&self) -> IssuanceWorkflow {
        IssuanceWorkflow::new(self.ledger.clone(), self.fan_out)
    }

    pub fn authorization(&self) -> AuthorizationChecker {
        AuthorizationChecker::new(self.ledger.clone(), self.fan_out)
    }

    pub fn directory(&self) -> Directory {
        Directory::new(self.ledger.clone(), self.content.clone(), self.fan_out)
    }

    pub fn ledger(&self) -> &LedgerGateway {
        &self.ledger
    }

    pub fn content(&self) -> &ContentResolver {
        &self.content
    }
}
