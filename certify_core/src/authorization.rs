// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::error::{CertifyError, CertifyResult};
use crate::ledger::LedgerGateway;
use crate::session::Session;
use crate::types::{Address, ProviderClassification, Role};

/// Outcome of probing one registered address
enum ProviderProbe {
    NotProvider,
    Authorized(Address),
    Pending(Address),
    Unresolved(Address),
}

/// Reconciles provider registrations with the ledger's authorization flags
pub struct AuthorizationChecker {
    ledger: Arc<LedgerGateway>,
    fan_out: usize,
}

impl AuthorizationChecker {
    pub fn new(ledger: Arc<LedgerGateway>, fan_out: usize) -> Self {
        Self {
            ledger,
            fan_out: fan_out.max(1),
        }
    }

    /// Bucket every registered provider by its live authorization flag.
    ///
    /// Each provider lands in exactly one bucket. Addresses whose identity
    /// cannot be read are left out; providers whose flag cannot be read go to
    /// `unresolved`.
    pub async fn classify_providers(&self) -> CertifyResult<ProviderClassification> {
        let addresses = self.ledger.list_identities().await?;
        debug!("Classifying {} registered addresses", addresses.len());

        let ledger = &self.ledger;
        let probes: Vec<ProviderProbe> = stream::iter(addresses)
            .map(|address| async move { Self::probe(ledger, address).await })
            .buffered(self.fan_out)
            .collect()
            .await;

        let mut classification = ProviderClassification::default();
        for probe in probes {
            match probe {
                ProviderProbe::Authorized(address) => classification.authorized.push(address),
                ProviderProbe::Pending(address) => classification.pending.push(address),
                ProviderProbe::Unresolved(address) => classification.unresolved.push(address),
                ProviderProbe::NotProvider => {}
            }
        }

        info!(
            "Providers: {} authorized, {} pending, {} unresolved",
            classification.authorized.len(),
            classification.pending.len(),
            classification.unresolved.len()
        );
        Ok(classification)
    }

    async fn probe(ledger: &LedgerGateway, address: Address) -> ProviderProbe {
        match ledger.read_identity(&address).await {
            Ok(record) if record.role == Role::Provider => {}
            Ok(_) => return ProviderProbe::NotProvider,
            Err(e) => {
                warn!("Skipping {}: identity unreadable: {}", address, e);
                return ProviderProbe::NotProvider;
            }
        }

        match ledger.read_authorization(&address).await {
            Ok(true) => ProviderProbe::Authorized(address),
            Ok(false) => ProviderProbe::Pending(address),
            Err(e) => {
                warn!("Authorization of {} unresolved: {}", address, e);
                ProviderProbe::Unresolved(address)
            }
        }
    }

    /// Authorize or revoke `institute` as the ledger owner.
    ///
    /// The caller is compared with the recorded owner before anything is
    /// submitted, so a non-owner never reaches the ledger.
    pub async fn set_authorization(
        &self,
        session: &Session,
        institute: &Address,
        authorized: bool,
    ) -> CertifyResult<()> {
        let caller = session.require_account()?;
        if institute.is_zero() {
            return Err(CertifyError::InvalidInput("institute address must be set".to_string()));
        }

        let owner = self.ledger.owner().await?;
        if !owner.matches(caller) {
            warn!("Rejected authorization change by non-owner {}", caller);
            return Err(CertifyError::NotOwner {
                caller: caller.clone(),
                owner,
            });
        }

        self.ledger.write_authorization(session, institute, authorized).await?;
        info!(
            "Institute {} {}",
            institute,
            if authorized { "authorized" } else { "revoked" }
        );
        Ok(())
    }

    pub async fn is_authorized(&self, institute: &Address) -> CertifyResult<bool> {
        Ok(self.ledger.read_authorization(institute).await?)
    }
}
