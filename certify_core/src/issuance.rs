// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{CertifyError, CertifyResult};
use crate::ledger::{LedgerError, LedgerGateway};
use crate::session::Session;
use crate::types::{Address, CertificateRequest, RequestId, RequestStatus, Role, TokenId};

/// Result of a successful approval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalOutcome {
    pub request_id: RequestId,
    /// Minted token id, when the ledger reported it
    pub token_id: Option<TokenId>,
}

/// Certificate request lifecycle: pending, then approved (minted) or
/// cancelled. Request ids are assigned by the ledger and never reused.
pub struct IssuanceWorkflow {
    ledger: Arc<LedgerGateway>,
    fan_out: usize,
}

impl IssuanceWorkflow {
    pub fn new(ledger: Arc<LedgerGateway>, fan_out: usize) -> Self {
        Self {
            ledger,
            fan_out: fan_out.max(1),
        }
    }

    /// Submit a certificate request from the session's student account
    pub async fn request_issuance(
        &self,
        session: &Session,
        institute: &Address,
        name: &str,
        message: &str,
    ) -> CertifyResult<RequestId> {
        let account = session.require_account()?;
        if name.trim().is_empty() {
            return Err(CertifyError::InvalidInput("certificate name must not be empty".to_string()));
        }
        if institute.is_zero() {
            return Err(CertifyError::InvalidInput("institute address must be set".to_string()));
        }

        let identity = self.ledger.read_identity(account).await?;
        if identity.role != Role::Student {
            return Err(CertifyError::NotAuthorizedCaller(format!(
                "{} is registered as {}, only students can request certificates",
                account, identity.role
            )));
        }

        let id = self
            .ledger
            .submit_certificate_request(session, institute, name.trim(), message, &identity.metadata_pointer)
            .await?;
        info!("Certificate request {} submitted by {} to {}", id, account, institute);
        Ok(id)
    }

    /// Approve a pending request as its institute, minting the certificate
    pub async fn approve(
        &self,
        session: &Session,
        request_id: RequestId,
        certificate_type: &str,
        token_uri: &str,
        institution_name: &str,
    ) -> CertifyResult<ApprovalOutcome> {
        let account = session.require_account()?;
        if certificate_type.trim().is_empty() {
            return Err(CertifyError::InvalidInput("certificate type must not be empty".to_string()));
        }
        if token_uri.trim().is_empty() {
            return Err(CertifyError::InvalidInput("token URI must not be empty".to_string()));
        }
        self.check_pending_for(account, request_id, "approve").await?;

        let token_id = self
            .ledger
            .approve_certificate_request(session, request_id, certificate_type, token_uri.trim(), institution_name)
            .await?;
        info!("Request {} approved by {} (token {:?})", request_id, account, token_id);

        Ok(ApprovalOutcome { request_id, token_id })
    }

    /// Cancel a pending request as its institute
    pub async fn cancel(&self, session: &Session, request_id: RequestId) -> CertifyResult<()> {
        let account = session.require_account()?;
        self.check_pending_for(account, request_id, "cancel").await?;

        self.ledger.cancel_certificate_request(session, request_id).await?;
        info!("Request {} cancelled by {}", request_id, account);
        Ok(())
    }

    /// Pending requests addressed to `institute`, in id order.
    ///
    /// Scans every id up to the request counter, so cost grows with the total
    /// number of requests. An id whose read fails is skipped.
    pub async fn list_pending_for_institute(&self, institute: &Address) -> CertifyResult<Vec<CertificateRequest>> {
        let requests = self.scan_requests().await?;
        Ok(requests
            .into_iter()
            .filter(|r| r.institute == *institute && r.is_pending())
            .collect())
    }

    /// All live requests submitted by `student`, in id order
    pub async fn requests_submitted_by(&self, student: &Address) -> CertifyResult<Vec<CertificateRequest>> {
        let requests = self.scan_requests().await?;
        Ok(requests.into_iter().filter(|r| r.student == *student).collect())
    }

    pub async fn request_status(&self, request_id: RequestId) -> CertifyResult<RequestStatus> {
        let count = self.ledger.request_count().await?;
        if request_id == 0 || request_id > count {
            return Err(CertifyError::NotFound(format!("certificate request {}", request_id)));
        }

        match self.ledger.read_certificate_request(request_id).await {
            Ok(request) if request.approved => Ok(RequestStatus::Approved),
            Ok(_) => Ok(RequestStatus::Pending),
            // Issued ids whose record is gone were cancelled
            Err(LedgerError::NotFound(_)) => Ok(RequestStatus::Cancelled),
            Err(e) => Err(e.into()),
        }
    }

    async fn check_pending_for(&self, caller: &Address, request_id: RequestId, action: &str) -> CertifyResult<()> {
        let request = self.ledger.read_certificate_request(request_id).await?;
        if !request.is_pending() {
            return Err(CertifyError::RequestNotPending(request_id));
        }
        if request.institute != *caller {
            return Err(CertifyError::NotAuthorizedCaller(format!(
                "only {} can {} request {}",
                request.institute, action, request_id
            )));
        }
        Ok(())
    }

    async fn scan_requests(&self) -> CertifyResult<Vec<CertificateRequest>> {
        let count = self.ledger.request_count().await?;
        debug!("Scanning {} certificate requests", count);

        let ledger = &self.ledger;
        let results: Vec<(RequestId, Result<CertificateRequest, LedgerError>)> = stream::iter(1..=count)
            .map(|id| async move { (id, ledger.read_certificate_request(id).await) })
            .buffered(self.fan_out)
            .collect()
            .await;

        let mut requests = Vec::with_capacity(results.len());
        for (id, result) in results {
            match result {
                Ok(request) => requests.push(request),
                Err(LedgerError::NotFound(_)) => debug!("Request {} no longer exists", id),
                Err(e) => warn!("Skipping request {}: {}", id, e),
            }
        }
        Ok(requests)
    }
}
