// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::ledger::{
    ContractCall, ContractKind, LedgerClient, LedgerError, LedgerEvent, TxReceipt, TxStatus,
};
use crate::session::Session;
use crate::types::{
    Address, Certificate, CertificateRequest, ContentId, IdentityRecord, RequestId, Role, TokenId,
};

/// Deployed contract addresses; `None` means the contract is not configured
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    pub identity_registry: Option<Address>,
    pub credential_ledger: Option<Address>,
}

impl ContractAddresses {
    pub fn new(identity_registry: Address, credential_ledger: Address) -> Self {
        Self {
            identity_registry: Some(identity_registry),
            credential_ledger: Some(credential_ledger),
        }
    }

    fn resolve(&self, kind: ContractKind) -> Result<&Address, LedgerError> {
        let address = match kind {
            ContractKind::IdentityRegistry => self.identity_registry.as_ref(),
            ContractKind::CredentialLedger => self.credential_ledger.as_ref(),
        };
        address
            .filter(|a| !a.is_zero())
            .ok_or_else(|| LedgerError::ContractUnavailable(format!("{} address not configured", kind)))
    }
}

/// Typed facade over the identity registry and credential ledger.
///
/// Reads need no signer. Writes take the caller's [`Session`], submit one
/// transaction and wait for finality; a revert or a confirmation timeout
/// comes back as `TransactionFailed` carrying the node's reason verbatim.
/// Nothing is retried here.
pub struct LedgerGateway {
    client: Arc<dyn LedgerClient>,
    contracts: ContractAddresses,
    finality_timeout: Duration,
}

impl LedgerGateway {
    pub fn new(client: Arc<dyn LedgerClient>, contracts: ContractAddresses) -> Self {
        Self {
            client,
            contracts,
            finality_timeout: Duration::from_secs(120),
        }
    }

    pub fn with_finality_timeout(mut self, timeout: Duration) -> Self {
        self.finality_timeout = timeout;
        self
    }

    pub fn contracts(&self) -> &ContractAddresses {
        &self.contracts
    }

    fn registry(&self) -> Result<&Address, LedgerError> {
        self.contracts.resolve(ContractKind::IdentityRegistry)
    }

    fn credentials(&self) -> Result<&Address, LedgerError> {
        self.contracts.resolve(ContractKind::CredentialLedger)
    }

    // Identity registry

    pub async fn read_identity(&self, address: &Address) -> Result<IdentityRecord, LedgerError> {
        let (code, metadata_pointer) = self.client.get_user(self.registry()?, address).await?;
        let role = Role::from_code(code);
        if role == Role::Unset {
            return Err(LedgerError::NotRegistered(address.clone()));
        }

        Ok(IdentityRecord {
            address: address.clone(),
            role,
            metadata_pointer,
        })
    }

    pub async fn is_registered(&self, address: &Address) -> Result<bool, LedgerError> {
        self.client.is_user_registered(self.registry()?, address).await
    }

    /// Every registered address, in registry order
    pub async fn list_identities(&self) -> Result<Vec<Address>, LedgerError> {
        self.client.get_all_users(self.registry()?).await
    }

    pub async fn write_identity(
        &self,
        session: &Session,
        role: Role,
        pointer: &ContentId,
    ) -> Result<TxReceipt, LedgerError> {
        let call = ContractCall::RegisterUser {
            role: role.code(),
            metadata_hash: pointer.to_string(),
        };
        self.submit(session, call).await
    }

    // Credential ledger

    pub async fn owner(&self) -> Result<Address, LedgerError> {
        self.client.owner(self.credentials()?).await
    }

    pub async fn read_authorization(&self, institute: &Address) -> Result<bool, LedgerError> {
        self.client.authorized_institutes(self.credentials()?, institute).await
    }

    /// Authorize or revoke `institute`; ownership is enforced by the contract
    pub async fn write_authorization(
        &self,
        session: &Session,
        institute: &Address,
        authorized: bool,
    ) -> Result<TxReceipt, LedgerError> {
        let call = if authorized {
            ContractCall::AuthorizeInstitute {
                institute: institute.clone(),
            }
        } else {
            ContractCall::RevokeInstitute {
                institute: institute.clone(),
            }
        };
        self.submit(session, call).await
    }

    /// Submit a certificate request and return the id the ledger assigned
    pub async fn submit_certificate_request(
        &self,
        session: &Session,
        institute: &Address,
        name: &str,
        message: &str,
        student_metadata_hash: &str,
    ) -> Result<RequestId, LedgerError> {
        let call = ContractCall::RequestCertificate {
            institute: institute.clone(),
            name: name.to_string(),
            message: message.to_string(),
            student_metadata_hash: student_metadata_hash.to_string(),
        };
        let receipt = self.submit(session, call).await?;

        if let Some(id) = receipt.events.iter().find_map(|event| match event {
            LedgerEvent::CertificateRequested { request_id, .. } => Some(*request_id),
            _ => None,
        }) {
            return Ok(id);
        }

        // Without the event the newest id is the best available answer
        warn!("No CertificateRequested event in {}; falling back to request counter", receipt.tx_hash);
        self.request_count().await
    }

    pub async fn read_certificate_request(&self, id: RequestId) -> Result<CertificateRequest, LedgerError> {
        let raw = self.client.certificate_requests(self.credentials()?, id).await?;
        if raw.student.is_zero() {
            return Err(LedgerError::NotFound(format!("certificate request {}", id)));
        }

        Ok(CertificateRequest {
            id,
            student: raw.student,
            institute: raw.institute,
            name: raw.name,
            message: raw.message,
            student_metadata_hash: raw.student_metadata_hash,
            approved: raw.approved,
        })
    }

    /// Highest request id issued so far
    pub async fn request_count(&self) -> Result<u64, LedgerError> {
        self.client.request_counter(self.credentials()?).await
    }

    /// Approve a request; returns the minted token id when the receipt reports it
    pub async fn approve_certificate_request(
        &self,
        session: &Session,
        id: RequestId,
        certificate_type: &str,
        token_uri: &str,
        institution_name: &str,
    ) -> Result<Option<TokenId>, LedgerError> {
        let call = ContractCall::ApproveCertificateRequest {
            request_id: id,
            certificate_type: certificate_type.to_string(),
            token_uri: token_uri.to_string(),
            institution_name: institution_name.to_string(),
        };
        let receipt = self.submit(session, call).await?;

        Ok(receipt.events.iter().find_map(|event| match event {
            LedgerEvent::CertificateMinted { token_id, .. } => Some(*token_id),
            _ => None,
        }))
    }

    pub async fn cancel_certificate_request(
        &self,
        session: &Session,
        id: RequestId,
    ) -> Result<TxReceipt, LedgerError> {
        self.submit(session, ContractCall::CancelCertificateRequest { request_id: id })
            .await
    }

    pub async fn minted_certificates_of(&self, student: &Address) -> Result<Vec<TokenId>, LedgerError> {
        self.client.get_student_certificates(self.credentials()?, student).await
    }

    pub async fn token_uri(&self, id: TokenId) -> Result<String, LedgerError> {
        self.client.token_uri(self.credentials()?, id).await
    }

    pub async fn read_certificate(&self, id: TokenId) -> Result<Certificate, LedgerError> {
        let ledger = self.credentials()?;
        let (details, token_uri) = futures::try_join!(
            self.client.get_certificate_details(ledger, id),
            self.client.token_uri(ledger, id),
        )?;

        Ok(Certificate {
            id,
            name: details.name,
            institute: details.institute,
            issue_date: details.issue_date,
            certificate_type: details.certificate_type,
            student: details.student,
            issuer: details.issuer,
            token_uri,
        })
    }

    /// Fire-and-await: send one transaction and wait for its final receipt
    async fn submit(&self, session: &Session, call: ContractCall) -> Result<TxReceipt, LedgerError> {
        let from = session.require_account()?;
        let contract = self.contracts.resolve(call.target())?.clone();
        let method = call.method();

        debug!("Submitting {} from {} to {}", method, from, contract);
        let tx_hash = self
            .client
            .send_transaction(from, &contract, call)
            .await
            .map_err(rejected)?;

        let receipt = tokio::time::timeout(self.finality_timeout, self.client.wait_for_receipt(&tx_hash))
            .await
            .map_err(|_| {
                warn!("Transaction {} ({}) not final after {:?}", tx_hash, method, self.finality_timeout);
                LedgerError::TransactionFailed(format!(
                    "transaction {} not confirmed within {}s",
                    tx_hash,
                    self.finality_timeout.as_secs()
                ))
            })?
            .map_err(rejected)?;

        match receipt.status {
            TxStatus::Success => {
                info!("{} confirmed in {}", method, receipt.tx_hash);
                Ok(receipt)
            }
            TxStatus::Reverted => {
                let reason = receipt
                    .revert_reason
                    .clone()
                    .unwrap_or_else(|| "execution reverted".to_string());
                warn!("{} reverted in {}: {}", method, receipt.tx_hash, reason);
                Err(LedgerError::TransactionFailed(reason))
            }
        }
    }
}

/// A node error on the write path means the transaction did not go through
fn rejected(error: LedgerError) -> LedgerError {
    match error {
        LedgerError::Rpc(reason) => LedgerError::TransactionFailed(reason),
        other => other,
    }
}
