// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::content::ContentResolver;
use crate::error::{CertifyError, CertifyResult};
use crate::ledger::{LedgerError, LedgerGateway};
use crate::types::{
    Address, Certificate, CertificateVerification, CertificateView, IdentityRecord,
    ProfileMetadata, Role, StudentMatch, TokenId,
};

/// Read-side queries joining ledger records with their content
pub struct Directory {
    ledger: Arc<LedgerGateway>,
    content: Arc<ContentResolver>,
    fan_out: usize,
}

impl Directory {
    pub fn new(ledger: Arc<LedgerGateway>, content: Arc<ContentResolver>, fan_out: usize) -> Self {
        Self {
            ledger,
            content,
            fan_out: fan_out.max(1),
        }
    }

    /// Certificates minted to `owner`, with metadata where resolvable.
    ///
    /// A certificate whose ledger read fails is skipped; one whose metadata
    /// cannot be resolved is returned with `metadata: None`.
    pub async fn certificates_owned_by(&self, owner: &Address) -> CertifyResult<Vec<CertificateView>> {
        let ids = self.ledger.minted_certificates_of(owner).await?;
        debug!("{} owns {} certificates", owner, ids.len());

        let ledger = &self.ledger;
        let results: Vec<(TokenId, Result<Certificate, LedgerError>)> = stream::iter(ids)
            .map(|id| async move { (id, ledger.read_certificate(id).await) })
            .buffered(self.fan_out)
            .collect()
            .await;

        let certificates: Vec<Certificate> = results
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(certificate) => Some(certificate),
                Err(e) => {
                    warn!("Skipping certificate {}: {}", id, e);
                    None
                }
            })
            .collect();

        let views = stream::iter(certificates)
            .map(|certificate| self.with_metadata(certificate))
            .buffered(self.fan_out)
            .collect()
            .await;
        Ok(views)
    }

    /// Find the student whose profile carries `external_id`.
    ///
    /// Linear in the number of registered users: every student's metadata is
    /// resolved until one matches. Comparison ignores case and surrounding
    /// whitespace. Students whose metadata cannot be resolved are skipped.
    pub async fn find_student_by_external_id(&self, external_id: &str) -> CertifyResult<StudentMatch> {
        let wanted = external_id.trim();
        if wanted.is_empty() {
            return Err(CertifyError::InvalidInput("student id must not be empty".to_string()));
        }

        let addresses = self.ledger.list_identities().await?;
        let ledger = &self.ledger;
        let content = &self.content;

        let candidates = stream::iter(addresses)
            .map(|address| async move {
                let record = match ledger.read_identity(&address).await {
                    Ok(record) if record.role == Role::Student => record,
                    Ok(_) => return None,
                    Err(e) => {
                        debug!("Skipping {}: {}", address, e);
                        return None;
                    }
                };

                match content.get_profile(&record.metadata_pointer, record.role).await {
                    Ok(ProfileMetadata::Student(metadata)) => Some(StudentMatch { address, metadata }),
                    Ok(ProfileMetadata::Provider(_)) => {
                        warn!("Student {} points at a provider profile", address);
                        None
                    }
                    Err(e) => {
                        debug!("Skipping {}: metadata unavailable: {}", address, e);
                        None
                    }
                }
            })
            .buffered(self.fan_out);
        futures::pin_mut!(candidates);

        while let Some(candidate) = candidates.next().await {
            if let Some(found) = candidate {
                if found.metadata.student_id.trim().eq_ignore_ascii_case(wanted) {
                    info!("Student id {} belongs to {}", wanted, found.address);
                    return Ok(found);
                }
            }
        }

        Err(CertifyError::NotFound(format!("student with id {}", wanted)))
    }

    /// Identity records of every registered user holding `role`
    pub async fn users_by_role(&self, role: Role) -> CertifyResult<Vec<IdentityRecord>> {
        let addresses = self.ledger.list_identities().await?;

        let ledger = &self.ledger;
        let records: Vec<Option<IdentityRecord>> = stream::iter(addresses)
            .map(|address| async move {
                match ledger.read_identity(&address).await {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping {}: {}", address, e);
                        None
                    }
                }
            })
            .buffered(self.fan_out)
            .collect()
            .await;

        Ok(records
            .into_iter()
            .flatten()
            .filter(|record| record.role == role)
            .collect())
    }

    /// A certificate joined with what the ledger says about its issuer now
    pub async fn verify_certificate(&self, token_id: TokenId) -> CertifyResult<CertificateVerification> {
        let certificate = self.ledger.read_certificate(token_id).await?;
        let issuer = certificate.issuer.clone();

        let (view, identity, authorized) = futures::join!(
            self.with_metadata(certificate),
            self.ledger.read_identity(&issuer),
            self.ledger.read_authorization(&issuer),
        );

        let issuer_role = match identity {
            Ok(record) => Some(record.role),
            Err(LedgerError::NotRegistered(_)) => Some(Role::Unset),
            Err(e) => {
                warn!("Issuer {} identity unreadable: {}", issuer, e);
                None
            }
        };
        let issuer_authorized = match authorized {
            Ok(flag) => Some(flag),
            Err(e) => {
                warn!("Issuer {} authorization unreadable: {}", issuer, e);
                None
            }
        };

        Ok(CertificateVerification {
            view,
            issuer_role,
            issuer_authorized,
        })
    }

    async fn with_metadata(&self, certificate: Certificate) -> CertificateView {
        let metadata = match self.content.get_json::<serde_json::Value>(&certificate.token_uri).await {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Metadata of certificate {} unavailable: {}", certificate.id, e);
                None
            }
        };
        CertificateView { certificate, metadata }
    }
}
