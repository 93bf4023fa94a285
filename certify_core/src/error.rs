// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

//! Workflow-level error taxonomy

use thiserror::Error;

use crate::content::ResolverError;
use crate::ledger::LedgerError;
use crate::types::{Address, RequestId};

/// Errors surfaced by the registration, issuance, authorization and
/// directory workflows
#[derive(Debug, Error)]
pub enum CertifyError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Content(#[from] ResolverError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Address already registered: {0}")]
    AlreadyRegistered(Address),

    #[error("Caller {caller} is not the ledger owner ({owner})")]
    NotOwner { caller: Address, owner: Address },

    #[error("Caller not authorized: {0}")]
    NotAuthorizedCaller(String),

    #[error("Certificate request {0} is no longer pending")]
    RequestNotPending(RequestId),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl CertifyError {
    /// True when the error means "no such entity" rather than a failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CertifyError::NotFound(_)
                | CertifyError::Ledger(LedgerError::NotFound(_))
                | CertifyError::Ledger(LedgerError::NotRegistered(_))
        )
    }

    /// True for failures that were rejected locally before any ledger write
    pub fn is_local_rejection(&self) -> bool {
        matches!(
            self,
            CertifyError::InvalidInput(_)
                | CertifyError::AlreadyRegistered(_)
                | CertifyError::NotOwner { .. }
                | CertifyError::NotAuthorizedCaller(_)
                | CertifyError::RequestNotPending(_)
                | CertifyError::Ledger(LedgerError::WalletNotConnected)
                | CertifyError::Ledger(LedgerError::ContractUnavailable(_))
        )
    }
}

/// Result type for workflow operations
pub type CertifyResult<T> = Result<T, CertifyError>;
