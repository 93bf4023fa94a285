// SPDX-License-Identifier: MIT
//
// Copyright (c) 2025 Noderr Protocol Foundation

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::content::ContentResolver;
use crate::error::{CertifyError, CertifyResult};
use crate::ledger::LedgerGateway;
use crate::session::Session;
use crate::types::{
    Address, IdentityRecord, ProfileMetadata, ProviderMetadata, Role, StudentMetadata,
};

/// Profile fields a student supplies at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentProfile {
    pub name: String,
    pub email: String,
    pub student_id: String,
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Profile fields a credential provider supplies at registration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub institution_name: String,
    pub accreditation_number: String,
    /// Accreditation document, uploaded before the profile itself
    pub document: Option<Vec<u8>>,
}

/// Role-specific registration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfileInput {
    Student(StudentProfile),
    Provider(ProviderProfile),
}

impl ProfileInput {
    pub fn role(&self) -> Role {
        match self {
            ProfileInput::Student(_) => Role::Student,
            ProfileInput::Provider(_) => Role::Provider,
        }
    }

    fn validate(&self, role: Role) -> CertifyResult<()> {
        if role == Role::Unset {
            return Err(CertifyError::InvalidInput("a role must be chosen".to_string()));
        }
        if role != self.role() {
            return Err(CertifyError::InvalidInput(format!(
                "{} profile supplied for {} registration",
                self.role(),
                role
            )));
        }

        match self {
            ProfileInput::Student(student) => {
                require_field("name", &student.name)?;
                require_field("email", &student.email)?;
                require_field("studentId", &student.student_id)?;
                if !student.email.contains('@') {
                    return Err(CertifyError::InvalidInput(format!(
                        "email is not valid: {}",
                        student.email
                    )));
                }
                // Reserved keys would clash with the tagged document layout
                for key in ["role", "name", "email", "studentId"] {
                    if student.extra.contains_key(key) {
                        return Err(CertifyError::InvalidInput(format!(
                            "extra field '{}' is reserved",
                            key
                        )));
                    }
                }
            }
            ProfileInput::Provider(provider) => {
                require_field("institutionName", &provider.institution_name)?;
                require_field("accreditationNumber", &provider.accreditation_number)?;
                match &provider.document {
                    Some(document) if !document.is_empty() => {}
                    _ => {
                        return Err(CertifyError::InvalidInput(
                            "an accreditation document is required".to_string(),
                        ))
                    }
                }
            }
        }
        Ok(())
    }
}

fn require_field(field: &str, value: &str) -> CertifyResult<()> {
    if value.trim().is_empty() {
        Err(CertifyError::InvalidInput(format!("{} must not be empty", field)))
    } else {
        Ok(())
    }
}

/// Moves an address from unregistered to registered
pub struct RegistrationWorkflow {
    ledger: Arc<LedgerGateway>,
    content: Arc<ContentResolver>,
}

impl RegistrationWorkflow {
    pub fn new(ledger: Arc<LedgerGateway>, content: Arc<ContentResolver>) -> Self {
        Self { ledger, content }
    }

    /// Register the session account with `role`.
    ///
    /// Uploads happen before the single ledger write, so a failed upload
    /// commits nothing. A failed ledger write may leave orphaned blobs in the
    /// content store, which is harmless. The returned record is re-read from
    /// the registry.
    pub async fn register(
        &self,
        session: &Session,
        role: Role,
        profile: ProfileInput,
    ) -> CertifyResult<IdentityRecord> {
        let account = session.require_account()?.clone();
        profile.validate(role)?;

        if self.ledger.is_registered(&account).await? {
            return Err(CertifyError::AlreadyRegistered(account));
        }

        let metadata = match profile {
            ProfileInput::Student(student) => ProfileMetadata::Student(StudentMetadata {
                name: student.name.trim().to_string(),
                email: student.email.trim().to_string(),
                student_id: student.student_id.trim().to_string(),
                extra: student.extra,
            }),
            ProfileInput::Provider(provider) => {
                let document = provider.document.unwrap_or_default();
                let document_pointer = self.content.put(document).await?;
                info!("Uploaded accreditation document for {} as {}", account, document_pointer);

                ProfileMetadata::Provider(ProviderMetadata {
                    institution_name: provider.institution_name.trim().to_string(),
                    accreditation_number: provider.accreditation_number.trim().to_string(),
                    document_pointer: document_pointer.to_string(),
                })
            }
        };

        let pointer = self.content.put_json(&metadata).await?;
        info!("Stored {} profile for {} as {}", role, account, pointer);

        self.ledger.write_identity(session, role, &pointer).await?;
        let record = self.ledger.read_identity(&account).await?;
        info!("Registered {} as {}", account, record.role);
        Ok(record)
    }

    /// Resolve the profile of a registered address.
    ///
    /// `Ok(None)` when the metadata cannot be resolved from any gateway.
    pub async fn profile_of(&self, address: &Address) -> CertifyResult<Option<ProfileMetadata>> {
        let record = self.ledger.read_identity(address).await?;

        match self.content.get_profile(&record.metadata_pointer, record.role).await {
            Ok(profile) => Ok(Some(profile)),
            Err(e) if e.is_resolution_failure() => {
                warn!("Profile of {} unavailable: {}", address, e);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student() -> StudentProfile {
        StudentProfile {
            name: "Ada".to_string(),
            email: "ada@example.org".to_string(),
            student_id: "S100".to_string(),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn test_validation_rejects_mismatch_and_blanks() {
        let input = ProfileInput::Student(student());
        assert!(input.validate(Role::Student).is_ok());
        assert!(matches!(input.validate(Role::Provider), Err(CertifyError::InvalidInput(_))));
        assert!(matches!(input.validate(Role::Unset), Err(CertifyError::InvalidInput(_))));

        let mut blank = student();
        blank.student_id = "  ".to_string();
        assert!(ProfileInput::Student(blank).validate(Role::Student).is_err());

        let mut bad_email = student();
        bad_email.email = "ada.example.org".to_string();
        assert!(ProfileInput::Student(bad_email).validate(Role::Student).is_err());

        let mut reserved = student();
        reserved.extra.insert("role".to_string(), serde_json::json!("provider"));
        assert!(ProfileInput::Student(reserved).validate(Role::Student).is_err());
    }

    #[test]
    fn test_provider_requires_document() {
        let provider = ProviderProfile {
            institution_name: "Uni".to_string(),
            accreditation_number: "A-1".to_string(),
            document: None,
        };
        assert!(ProfileInput::Provider(provider.clone()).validate(Role::Provider).is_err());

        let with_document = ProviderProfile {
            document: Some(b"%PDF".to_vec()),
            ..provider
        };
        assert!(ProfileInput::Provider(with_document).validate(Role::Provider).is_ok());
    }
}
