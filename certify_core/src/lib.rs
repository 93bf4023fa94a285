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


pub mod authorization;
pub mod config;
pub mod content;
pub mod directory;
pub mod engine;
pub mod error;
pub mod issuance;
pub mod ledger;
pub mod logging;
pub mod registration;
pub mod session;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export common types
pub use authorization::AuthorizationChecker;
pub use config::{CertifyConfig, ContentConfig, DirectoryConfig, LedgerConfig};
pub use content::{
    ContentCache, ContentGateway, ContentResolver, ContentStore, HttpGateway, IpfsApiStore,
    MemoryContentStore, ResolverError, RetryPolicy,
};
pub use directory::Directory;
pub use engine::{CertifyEngine, EngineSetupError};
pub use error::{CertifyError, CertifyResult};
pub use issuance::{ApprovalOutcome, IssuanceWorkflow};
pub use ledger::{
    ContractAddresses, ContractCall, InMemoryLedger, LedgerClient, LedgerError, LedgerEvent,
    LedgerGateway, LedgerSnapshot, TxReceipt, TxStatus,
};
pub use registration::{ProfileInput, ProviderProfile, RegistrationWorkflow, StudentProfile};
pub use session::Session;
pub use types::{
    Address, Certificate, CertificateRequest, CertificateVerification, CertificateView, ContentId,
    IdentityRecord, ProfileMetadata, ProviderClassification, ProviderMetadata, RequestId,
    RequestStatus, Role, StudentMatch, StudentMetadata, TokenId,
};
