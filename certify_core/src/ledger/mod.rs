// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.


//! Typed access to the identity registry and credential ledger contracts

pub mod gateway;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Address, RequestId, TokenId};

pub use gateway::{ContractAddresses, LedgerGateway};
pub use memory::{InMemoryLedger, LedgerSnapshot};

/// Transaction hash as returned by the node
pub type TxHash = String;

/// Error types for ledger access
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Wallet not connected")]
    WalletNotConnected,

    #[error("Contract unavailable: {0}")]
    ContractUnavailable(String),

    #[error("Address not registered: {0}")]
    NotRegistered(Address),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}

/// Which of the two contracts a call targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContractKind {
    IdentityRegistry,
    CredentialLedger,
}

impl std::fmt::Display for ContractKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContractKind::IdentityRegistry => write!(f, "identity registry"),
            ContractKind::CredentialLedger => write!(f, "credential ledger"),
        }
    }
}

/// State-changing contract call, one variant per write method of the ABI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum ContractCall {
    RegisterUser {
        role: u8,
        metadata_hash: String,
    },
    AuthorizeInstitute {
        institute: Address,
    },
    RevokeInstitute {
        institute: Address,
    },
    RequestCertificate {
        institute: Address,
        name: String,
        message: String,
        student_metadata_hash: String,
    },
    ApproveCertificateRequest {
        request_id: RequestId,
        certificate_type: String,
        token_uri: String,
        institution_name: String,
    },
    CancelCertificateRequest {
        request_id: RequestId,
    },
}

impl ContractCall {
    pub fn target(&self) -> ContractKind {
        match self {
            ContractCall::RegisterUser { .. } => ContractKind::IdentityRegistry,
            _ => ContractKind::CredentialLedger,
        }
    }

    /// ABI method name
    pub fn method(&self) -> &'static str {
        match self {
            ContractCall::RegisterUser { .. } => "registerUser",
            ContractCall::AuthorizeInstitute { .. } => "authorizeInstitute",
            ContractCall::RevokeInstitute { .. } => "revokeInstitute",
            ContractCall::RequestCertificate { .. } => "requestCertificate",
            ContractCall::ApproveCertificateRequest { .. } => "approveCertificateRequest",
            ContractCall::CancelCertificateRequest { .. } => "cancelCertificateRequest",
        }
    }
}

/// Decoded contract event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    UserRegistered {
        user: Address,
        role: u8,
    },
    InstituteAuthorized {
        institute: Address,
    },
    InstituteRevoked {
        institute: Address,
    },
    CertificateRequested {
        request_id: RequestId,
        student: Address,
        institute: Address,
    },
    CertificateMinted {
        token_id: TokenId,
        request_id: RequestId,
        student: Address,
    },
    RequestCancelled {
        request_id: RequestId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStatus {
    Success,
    Reverted,
}

/// Receipt of a finalized transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub status: TxStatus,
    /// Revert reason exactly as reported by the node
    pub revert_reason: Option<String>,
    pub events: Vec<LedgerEvent>,
}

/// `certificateRequests(id)` tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRequest {
    pub student: Address,
    pub institute: Address,
    pub name: String,
    pub message: String,
    pub student_metadata_hash: String,
    pub approved: bool,
}

impl RawRequest {
    /// Zeroed record returned for ids that were never written or were deleted
    pub fn empty() -> Self {
        Self {
            student: Address::zero(),
            institute: Address::zero(),
            name: String::new(),
            message: String::new(),
            student_metadata_hash: String::new(),
            approved: false,
        }
    }
}

/// `getCertificateDetails(id)` tuple
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCertificate {
    pub name: String,
    pub institute: String,
    pub issue_date: u64,
    pub certificate_type: String,
    pub student: Address,
    pub issuer: Address,
}

/// Node-level access to the two contracts.
///
/// One method per ABI function, each taking the address of the contract it
/// calls. Writes go through [`LedgerClient::send_transaction`] and are
/// confirmed with [`LedgerClient::wait_for_receipt`].
#[async_trait]
pub trait LedgerClient: Send + Sync {
    // Identity registry

    async fn get_user(&self, registry: &Address, user: &Address) -> Result<(u8, String), LedgerError>;

    async fn is_user_registered(&self, registry: &Address, user: &Address) -> Result<bool, LedgerError>;

    async fn get_all_users(&self, registry: &Address) -> Result<Vec<Address>, LedgerError>;

    // Credential ledger

    async fn owner(&self, ledger: &Address) -> Result<Address, LedgerError>;

    async fn authorized_institutes(&self, ledger: &Address, institute: &Address) -> Result<bool, LedgerError>;

    async fn request_counter(&self, ledger: &Address) -> Result<u64, LedgerError>;

    async fn certificate_requests(&self, ledger: &Address, id: RequestId) -> Result<RawRequest, LedgerError>;

    async fn get_student_certificates(&self, ledger: &Address, student: &Address) -> Result<Vec<TokenId>, LedgerError>;

    async fn get_certificate_details(&self, ledger: &Address, id: TokenId) -> Result<RawCertificate, LedgerError>;

    async fn token_uri(&self, ledger: &Address, id: TokenId) -> Result<String, LedgerError>;

    // Writes

    /// Sign and broadcast a call from `from`; returns once the node accepts it
    async fn send_transaction(&self, from: &Address, contract: &Address, call: ContractCall) -> Result<TxHash, LedgerError>;

    /// Wait until the transaction is final
    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError>;
}
