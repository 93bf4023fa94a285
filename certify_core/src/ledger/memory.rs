// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::ledger::{
    ContractAddresses, ContractCall, LedgerClient, LedgerError, LedgerEvent, RawCertificate,
    RawRequest, TxHash, TxReceipt, TxStatus,
};
use crate::types::{Address, RequestId, Role, TokenId};

/// Registry entry as the contract stores it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub address: Address,
    pub role: u8,
    pub metadata_hash: String,
}

/// A minted token and its URI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintedToken {
    pub details: RawCertificate,
    pub token_uri: String,
}

/// Complete contract state of an [`InMemoryLedger`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub identity_registry: Address,
    pub credential_ledger: Address,
    pub owner: Address,
    pub users: Vec<UserEntry>,
    pub authorized: Vec<Address>,
    pub requests: BTreeMap<RequestId, RawRequest>,
    pub request_counter: u64,
    pub certificates: BTreeMap<TokenId, MintedToken>,
    pub token_counter: u64,
}

impl LedgerSnapshot {
    pub fn new(identity_registry: Address, credential_ledger: Address, owner: Address) -> Self {
        Self {
            identity_registry,
            credential_ledger,
            owner,
            users: Vec::new(),
            authorized: Vec::new(),
            requests: BTreeMap::new(),
            request_counter: 0,
            certificates: BTreeMap::new(),
            token_counter: 0,
        }
    }

    fn user(&self, address: &Address) -> Option<&UserEntry> {
        self.users.iter().find(|u| u.address == *address)
    }

    fn is_authorized(&self, institute: &Address) -> bool {
        self.authorized.contains(institute)
    }
}

/// Outcome of executing one call against the state
type Execution = Result<Vec<LedgerEvent>, String>;

/// Reference ledger that executes both contracts in process.
///
/// Transactions are mined on submission, like a local development chain, so
/// `wait_for_receipt` returns immediately unless confirmations are stalled.
/// Read faults can be injected per id or address to exercise partial failure
/// handling.
pub struct InMemoryLedger {
    state: RwLock<LedgerSnapshot>,
    receipts: Mutex<HashMap<TxHash, TxReceipt>>,
    failing_requests: RwLock<HashSet<RequestId>>,
    failing_authorizations: RwLock<HashSet<Address>>,
    failing_certificates: RwLock<HashSet<TokenId>>,
    stalled: AtomicBool,
    submitted: AtomicU64,
}

impl InMemoryLedger {
    pub fn new(identity_registry: Address, credential_ledger: Address, owner: Address) -> Self {
        Self::from_snapshot(LedgerSnapshot::new(identity_registry, credential_ledger, owner))
    }

    pub fn from_snapshot(snapshot: LedgerSnapshot) -> Self {
        Self {
            state: RwLock::new(snapshot),
            receipts: Mutex::new(HashMap::new()),
            failing_requests: RwLock::new(HashSet::new()),
            failing_authorizations: RwLock::new(HashSet::new()),
            failing_certificates: RwLock::new(HashSet::new()),
            stalled: AtomicBool::new(false),
            submitted: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        self.state.read().clone()
    }

    /// Addresses of the two contracts, ready for a `LedgerGateway`
    pub fn contracts(&self) -> ContractAddresses {
        let state = self.state.read();
        ContractAddresses::new(state.identity_registry.clone(), state.credential_ledger.clone())
    }

    /// Make `certificateRequests(id)` fail with an RPC error
    pub fn fail_request_reads(&self, id: RequestId) {
        self.failing_requests.write().insert(id);
    }

    /// Make `authorizedInstitutes(address)` fail with an RPC error
    pub fn fail_authorization_reads(&self, institute: Address) {
        self.failing_authorizations.write().insert(institute);
    }

    /// Make `getCertificateDetails(id)` fail with an RPC error
    pub fn fail_certificate_reads(&self, id: TokenId) {
        self.failing_certificates.write().insert(id);
    }

    /// Hold every receipt back so confirmations never arrive
    pub fn stall_confirmations(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    /// Number of transactions accepted so far, reverted ones included
    pub fn submitted_transactions(&self) -> u64 {
        self.submitted.load(Ordering::SeqCst)
    }

    fn check_contract(expected: &Address, actual: &Address) -> Result<(), LedgerError> {
        if expected == actual {
            Ok(())
        } else {
            Err(LedgerError::Rpc(format!("no contract deployed at {}", actual)))
        }
    }

    fn execute(state: &mut LedgerSnapshot, from: &Address, call: ContractCall) -> Execution {
        match call {
            ContractCall::RegisterUser { role, metadata_hash } => {
                if state.user(from).is_some() {
                    return Err("User already registered".to_string());
                }
                if Role::from_code(role) == Role::Unset {
                    return Err("Invalid role".to_string());
                }
                state.users.push(UserEntry {
                    address: from.clone(),
                    role,
                    metadata_hash,
                });
                Ok(vec![LedgerEvent::UserRegistered {
                    user: from.clone(),
                    role,
                }])
            }
            ContractCall::AuthorizeInstitute { institute } => {
                if state.owner != *from {
                    return Err("Ownable: caller is not the owner".to_string());
                }
                if !state.is_authorized(&institute) {
                    state.authorized.push(institute.clone());
                }
                Ok(vec![LedgerEvent::InstituteAuthorized { institute }])
            }
            ContractCall::RevokeInstitute { institute } => {
                if state.owner != *from {
                    return Err("Ownable: caller is not the owner".to_string());
                }
                state.authorized.retain(|a| *a != institute);
                Ok(vec![LedgerEvent::InstituteRevoked { institute }])
            }
            ContractCall::RequestCertificate {
                institute,
                name,
                message,
                student_metadata_hash,
            } => {
                state.request_counter += 1;
                let request_id = state.request_counter;
                state.requests.insert(
                    request_id,
                    RawRequest {
                        student: from.clone(),
                        institute: institute.clone(),
                        name,
                        message,
                        student_metadata_hash,
                        approved: false,
                    },
                );
                Ok(vec![LedgerEvent::CertificateRequested {
                    request_id,
                    student: from.clone(),
                    institute,
                }])
            }
            ContractCall::ApproveCertificateRequest {
                request_id,
                certificate_type,
                token_uri,
                institution_name,
            } => {
                let request = Self::pending_request(state, request_id, from, "approve")?;
                if !state.is_authorized(from) {
                    return Err("Institute not authorized".to_string());
                }

                state.token_counter += 1;
                let token_id = state.token_counter;
                let issue_date = u64::try_from(Utc::now().timestamp()).unwrap_or_default();
                state.certificates.insert(
                    token_id,
                    MintedToken {
                        details: RawCertificate {
                            name: request.name.clone(),
                            institute: institution_name,
                            issue_date,
                            certificate_type,
                            student: request.student.clone(),
                            issuer: from.clone(),
                        },
                        token_uri,
                    },
                );
                if let Some(stored) = state.requests.get_mut(&request_id) {
                    stored.approved = true;
                }

                Ok(vec![LedgerEvent::CertificateMinted {
                    token_id,
                    request_id,
                    student: request.student,
                }])
            }
            ContractCall::CancelCertificateRequest { request_id } => {
                Self::pending_request(state, request_id, from, "cancel")?;
                state.requests.remove(&request_id);
                Ok(vec![LedgerEvent::RequestCancelled { request_id }])
            }
        }
    }

    fn pending_request(
        state: &LedgerSnapshot,
        request_id: RequestId,
        from: &Address,
        action: &str,
    ) -> Result<RawRequest, String> {
        let request = state
            .requests
            .get(&request_id)
            .cloned()
            .ok_or_else(|| "Request does not exist".to_string())?;
        if request.approved {
            return Err("Request already processed".to_string());
        }
        if request.institute != *from {
            return Err(format!("Only the requested institute can {}", action));
        }
        Ok(request)
    }
}

#[async_trait]
impl LedgerClient for InMemoryLedger {
    async fn get_user(&self, registry: &Address, user: &Address) -> Result<(u8, String), LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.identity_registry, registry)?;
        Ok(state
            .user(user)
            .map(|u| (u.role, u.metadata_hash.clone()))
            .unwrap_or((0, String::new())))
    }

    async fn is_user_registered(&self, registry: &Address, user: &Address) -> Result<bool, LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.identity_registry, registry)?;
        Ok(state.user(user).is_some())
    }

    async fn get_all_users(&self, registry: &Address) -> Result<Vec<Address>, LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.identity_registry, registry)?;
        Ok(state.users.iter().map(|u| u.address.clone()).collect())
    }

    async fn owner(&self, ledger: &Address) -> Result<Address, LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        Ok(state.owner.clone())
    }

    async fn authorized_institutes(&self, ledger: &Address, institute: &Address) -> Result<bool, LedgerError> {
        if self.failing_authorizations.read().contains(institute) {
            return Err(LedgerError::Rpc(format!("authorizedInstitutes({}) failed", institute)));
        }
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        Ok(state.is_authorized(institute))
    }

    async fn request_counter(&self, ledger: &Address) -> Result<u64, LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        Ok(state.request_counter)
    }

    async fn certificate_requests(&self, ledger: &Address, id: RequestId) -> Result<RawRequest, LedgerError> {
        if self.failing_requests.read().contains(&id) {
            return Err(LedgerError::Rpc(format!("certificateRequests({}) failed", id)));
        }
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        Ok(state.requests.get(&id).cloned().unwrap_or_else(RawRequest::empty))
    }

    async fn get_student_certificates(&self, ledger: &Address, student: &Address) -> Result<Vec<TokenId>, LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        Ok(state
            .certificates
            .iter()
            .filter(|(_, token)| token.details.student == *student)
            .map(|(id, _)| *id)
            .collect())
    }

    async fn get_certificate_details(&self, ledger: &Address, id: TokenId) -> Result<RawCertificate, LedgerError> {
        if self.failing_certificates.read().contains(&id) {
            return Err(LedgerError::Rpc(format!("getCertificateDetails({}) failed", id)));
        }
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        state
            .certificates
            .get(&id)
            .map(|token| token.details.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("certificate {}", id)))
    }

    async fn token_uri(&self, ledger: &Address, id: TokenId) -> Result<String, LedgerError> {
        let state = self.state.read();
        Self::check_contract(&state.credential_ledger, ledger)?;
        state
            .certificates
            .get(&id)
            .map(|token| token.token_uri.clone())
            .ok_or_else(|| LedgerError::NotFound(format!("certificate {}", id)))
    }

    async fn send_transaction(&self, from: &Address, contract: &Address, call: ContractCall) -> Result<TxHash, LedgerError> {
        let tx_hash = format!("0x{}", Uuid::new_v4().simple());
        let method = call.method();

        let outcome = {
            let mut state = self.state.write();
            let expected = match call.target() {
                crate::ledger::ContractKind::IdentityRegistry => state.identity_registry.clone(),
                crate::ledger::ContractKind::CredentialLedger => state.credential_ledger.clone(),
            };
            Self::check_contract(&expected, contract)?;
            Self::execute(&mut state, from, call)
        };
        self.submitted.fetch_add(1, Ordering::SeqCst);

        let receipt = match outcome {
            Ok(events) => TxReceipt {
                tx_hash: tx_hash.clone(),
                status: TxStatus::Success,
                revert_reason: None,
                events,
            },
            Err(reason) => TxReceipt {
                tx_hash: tx_hash.clone(),
                status: TxStatus::Reverted,
                revert_reason: Some(reason),
                events: Vec::new(),
            },
        };
        debug!("Mined {} from {} as {} ({:?})", method, from, tx_hash, receipt.status);

        self.receipts.lock().insert(tx_hash.clone(), receipt);
        Ok(tx_hash)
    }

    async fn wait_for_receipt(&self, tx: &TxHash) -> Result<TxReceipt, LedgerError> {
        if self.stalled.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }

        self.receipts
            .lock()
            .get(tx)
            .cloned()
            .ok_or_else(|| LedgerError::Rpc(format!("unknown transaction {}", tx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(n: u64) -> Address {
        Address::new(format!("0x{:040x}", n))
    }

    async fn send(ledger: &InMemoryLedger, from: u64, call: ContractCall) -> TxReceipt {
        let contract = match call.target() {
            crate::ledger::ContractKind::IdentityRegistry => account(0xA1),
            crate::ledger::ContractKind::CredentialLedger => account(0xA2),
        };
        let tx = ledger.send_transaction(&account(from), &contract, call).await.unwrap();
        ledger.wait_for_receipt(&tx).await.unwrap()
    }

    fn ledger() -> InMemoryLedger {
        InMemoryLedger::new(account(0xA1), account(0xA2), account(0x01))
    }

    #[tokio::test]
    async fn test_approve_rules() {
        let ledger = ledger();
        send(&ledger, 0xBB, ContractCall::RequestCertificate {
            institute: account(0xAA),
            name: "Diploma".to_string(),
            message: String::new(),
            student_metadata_hash: "QmMeta".to_string(),
        })
        .await;

        let approve = || ContractCall::ApproveCertificateRequest {
            request_id: 1,
            certificate_type: "Diploma".to_string(),
            token_uri: "ipfs://Qm123".to_string(),
            institution_name: "Uni".to_string(),
        };

        let receipt = send(&ledger, 0xAA, approve()).await;
        assert_eq!(receipt.revert_reason.as_deref(), Some("Institute not authorized"));

        let receipt = send(&ledger, 0xCC, approve()).await;
        assert_eq!(receipt.status, TxStatus::Reverted);

        send(&ledger, 0x01, ContractCall::AuthorizeInstitute { institute: account(0xAA) }).await;
        let receipt = send(&ledger, 0xAA, approve()).await;
        assert_eq!(receipt.status, TxStatus::Success);
        assert!(matches!(
            receipt.events.as_slice(),
            [LedgerEvent::CertificateMinted { token_id: 1, request_id: 1, .. }]
        ));

        let receipt = send(&ledger, 0xAA, ContractCall::CancelCertificateRequest { request_id: 1 }).await;
        assert_eq!(receipt.revert_reason.as_deref(), Some("Request already processed"));
    }

    #[tokio::test]
    async fn test_cancel_deletes_record() {
        let ledger = ledger();
        send(&ledger, 0xBB, ContractCall::RequestCertificate {
            institute: account(0xAA),
            name: "BSc".to_string(),
            message: String::new(),
            student_metadata_hash: String::new(),
        })
        .await;
        let receipt = send(&ledger, 0xAA, ContractCall::CancelCertificateRequest { request_id: 1 }).await;
        assert_eq!(receipt.status, TxStatus::Success);

        let raw = ledger.certificate_requests(&account(0xA2), 1).await.unwrap();
        assert!(raw.student.is_zero());
        assert_eq!(ledger.request_counter(&account(0xA2)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_round_trip() {
        let ledger = ledger();
        send(&ledger, 0xBB, ContractCall::RegisterUser {
            role: 1,
            metadata_hash: "QmMeta".to_string(),
        })
        .await;

        let json = serde_json::to_string(&ledger.snapshot()).unwrap();
        let restored = InMemoryLedger::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(
            restored.get_user(&account(0xA1), &account(0xBB)).await.unwrap(),
            (1, "QmMeta".to_string())
        );
    }

    #[tokio::test]
    async fn test_wrong_contract_address() {
        let ledger = ledger();
        assert!(matches!(
            ledger.get_all_users(&account(0xFF)).await,
            Err(LedgerError::Rpc(_))
        ));
    }
}
