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


use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::content::{ContentGateway, ContentResolver, MemoryContentStore, RetryPolicy};
use crate::engine::CertifyEngine;
use crate::ledger::{
    ContractCall, InMemoryLedger, LedgerClient, LedgerError, LedgerGateway, RawCertificate, RawRequest,
    TxHash, TxReceipt,
};
use crate::registration::{ProfileInput, ProviderProfile, StudentProfile};
use crate::session::Session;
use crate::types::{Address, IdentityRecord, RequestId, Role, TokenId};

/// Deterministic test account `0x000…0n`
pub fn addr(n: u64) -> Address {
    Address::new(format!("0x{:040x}", n))
}

pub fn session(account: &Address) -> Session {
    Session::connected(account.clone())
}

pub fn student_profile(name: &str, student_id: &str) -> StudentProfile {
    StudentProfile {
        name: name.to_string(),
        email: format!("{}@example.org", name.to_lowercase()),
        student_id: student_id.to_string(),
        extra: BTreeMap::new(),
    }
}

pub fn provider_profile(institution: &str) -> ProviderProfile {
    ProviderProfile {
        institution_name: institution.to_string(),
        accreditation_number: format!("ACC-{}", institution.len()),
        document: Some(format!("accreditation of {}", institution).into_bytes()),
    }
}

/// Ledger client that slows down per-item reads and counts how many overlap.
///
/// Request reads and certificate detail reads sleep for the configured delay
/// while registered as in flight. Receipt waits can be made to fail.
pub struct ThrottledLedger {
    inner: Arc<InMemoryLedger>,
    read_delay: Mutex<Option<Duration>>,
    receipt_error: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ThrottledLedger {
    pub fn new(inner: Arc<InMemoryLedger>) -> Self {
        Self {
            inner,
            read_delay: Mutex::new(None),
            receipt_error: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    pub fn set_read_delay(&self, delay: Option<Duration>) {
        *self.read_delay.lock() = delay;
        self.peak.store(0, Ordering::SeqCst);
    }

    pub fn fail_receipts(&self, reason: &str) {
        *self.receipt_error.lock() = Some(reason.to_string());
    }

    /// Highest number of throttled reads observed at the same time
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    async fn throttle(&self) {
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl LedgerClient for ThrottledLedger {
    async fn get_user(&self, registry: &Address, user: &Address) -> Result<(u8, String), LedgerError> {
        self.inner.get_user(registry, user).await
    }

    async fn is_user_registered(&self, registry: &Address, user: &Address) -> Result<bool, LedgerError> {
        self.inner.is_user_registered(registry, user).await
    }

    async fn get_all_users(&self, registry: &Address) -> Result<Vec<Address>, LedgerError> {
        self.inner.get_all_users(registry).await
    }

    async fn owner(&self, ledger: &Address) -> Result<Address, LedgerError> {
        self.inner.owner(ledger).await
    }

    async fn authorized_institutes(&self, ledger: &Address, institute: &Address) -> Result<bool, LedgerError> {
        self.inner.authorized_institutes(ledger, institute).await
    }

    async fn request_counter(&self, ledger: &Address) -> Result<u64, LedgerError> {
        self.inner.request_counter(ledger).await
    }

    async fn certificate_requests(&self, ledger: &Address, id: RequestId) -> Result<RawRequest, LedgerError> {
        self.throttle().await;
        self.inner.certificate_requests(ledger, id).await
    }

    async fn get_student_certificates(&self, ledger: &Address, student: &Address) -> Result<Vec<TokenId>, LedgerError> {
        self.inner.get_student_certificates(ledger, student).await
    }

    async fn get_certificate_details(&self, ledger: &Address, id: TokenId) -> Result<RawCertificate, LedgerError> {
        self.throttle().await;
        self.inner.get_certificate_details(ledger, id).await
    }

    async fn token_uri(&self, ledger: &Address, id: TokenId) -> Result<String, LedgerError> {
        self.inner.token_uri(ledger, id).await
    }

    async fn send_transaction(&self, from: &Address, contract: &Address, call: ContractCall) -> Result<TxHash, LedgerError> {
        self.inner.send_transaction(from, contract, call).await
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError> {
        let failure = self.receipt_error.lock().clone();
        match failure {
            Some(reason) => Err(LedgerError::Rpc(reason)),
            None => self.inner.wait_for_receipt(tx).await,
        }
    }
}

/// Engine wired to an in-process ledger and content store
pub struct Harness {
    pub ledger: Arc<InMemoryLedger>,
    pub store: Arc<MemoryContentStore>,
    pub engine: CertifyEngine,
    pub owner: Address,
}

impl Harness {
    pub fn new() -> Self {
        let ledger = Self::in_memory_ledger();
        Self::over(ledger.clone(), ledger)
    }

    /// Harness whose engine reads through a `ThrottledLedger`
    pub fn throttled() -> (Self, Arc<ThrottledLedger>) {
        let ledger = Self::in_memory_ledger();
        let throttled = Arc::new(ThrottledLedger::new(ledger.clone()));
        (Self::over(ledger, throttled.clone()), throttled)
    }

    fn in_memory_ledger() -> Arc<InMemoryLedger> {
        Arc::new(InMemoryLedger::new(addr(0xA1), addr(0xA2), addr(0x01)))
    }

    fn over(ledger: Arc<InMemoryLedger>, client: Arc<dyn LedgerClient>) -> Self {
        let owner = addr(0x01);
        let store = Arc::new(MemoryContentStore::new());

        let gateway = LedgerGateway::new(client, ledger.contracts())
            .with_finality_timeout(Duration::from_millis(500));
        let gateways: Vec<Arc<dyn ContentGateway>> = vec![store.clone()];
        let content = ContentResolver::new(gateways, store.clone())
            .with_retry_policy(RetryPolicy::none())
            .with_attempt_timeout(Duration::from_millis(500));

        Self {
            ledger,
            store,
            engine: CertifyEngine::new(gateway, content).with_fan_out(4),
            owner,
        }
    }

    pub async fn register_student(&self, account: &Address, name: &str, student_id: &str) -> IdentityRecord {
        self.engine
            .registration()
            .register(
                &session(account),
                Role::Student,
                ProfileInput::Student(student_profile(name, student_id)),
            )
            .await
            .unwrap()
    }

    pub async fn register_provider(&self, account: &Address, institution: &str) -> IdentityRecord {
        self.engine
            .registration()
            .register(
                &session(account),
                Role::Provider,
                ProfileInput::Provider(provider_profile(institution)),
            )
            .await
            .unwrap()
    }

    pub async fn authorize(&self, institute: &Address) {
        self.engine
            .authorization()
            .set_authorization(&session(&self.owner), institute, true)
            .await
            .unwrap();
    }

    pub async fn request(&self, student: &Address, institute: &Address, name: &str) -> u64 {
        self.engine
            .issuance()
            .request_issuance(&session(student), institute, name, "please")
            .await
            .unwrap()
    }
}
