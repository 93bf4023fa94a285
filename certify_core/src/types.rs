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
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ledger-assigned certificate request identifier (1-based)
pub type RequestId = u64;

/// Ledger-assigned token identifier of a minted certificate
pub type TokenId = u64;

/// Error returned when an address string is not a 20-byte hex account
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid address: {0}")]
pub struct InvalidAddress(pub String);

/// Account identifier on the ledger.
///
/// Kept in its textual `0x` form. Equality and hashing ignore ASCII case, so
/// checksummed and lowercase spellings of the same account compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wrap an address without validating it
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into().trim().to_string())
    }

    /// Parse and validate a `0x`-prefixed 40 hex digit address
    pub fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| InvalidAddress(raw.to_string()))?;

        if digits.len() != 40 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(InvalidAddress(raw.to_string()));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// The all-zero address the ledger uses for unset fields
    pub fn zero() -> Self {
        Self(format!("0x{}", "0".repeat(40)))
    }

    /// True for the zero address (and for an empty string)
    pub fn is_zero(&self) -> bool {
        let digits = self
            .0
            .strip_prefix("0x")
            .or_else(|| self.0.strip_prefix("0X"))
            .unwrap_or(&self.0);
        digits.chars().all(|c| c == '0')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison with another address
    pub fn matches(&self, other: &Address) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.matches(other)
    }
}

impl Eq for Address {}

impl Hash for Address {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for byte in self.0.bytes() {
            state.write_u8(byte.to_ascii_lowercase());
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = InvalidAddress;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Role recorded for an address on the identity registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Unset,
    Student,
    Provider,
}

impl Role {
    /// Numeric code used by the registry contract
    pub fn code(self) -> u8 {
        match self {
            Role::Unset => 0,
            Role::Student => 1,
            Role::Provider => 2,
        }
    }

    /// Decode a registry role code; unknown codes read as `Unset`
    pub fn from_code(code: u8) -> Self {
        match code {
            1 => Role::Student,
            2 => Role::Provider,
            _ => Role::Unset,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Unset => write!(f, "unset"),
            Role::Student => write!(f, "student"),
            Role::Provider => write!(f, "provider"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "provider" | "institute" | "institution" => Ok(Role::Provider),
            "unset" => Ok(Role::Unset),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

/// Normalized content identifier.
///
/// Accepts a bare CID, `ipfs://<cid>` or any gateway URL containing
/// `/ipfs/<cid>`, and keeps only the identifier (plus an optional sub-path).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        let stripped = if let Some(rest) = trimmed.strip_prefix("ipfs://") {
            rest.strip_prefix("ipfs/").unwrap_or(rest)
        } else if let Some(idx) = trimmed.rfind("/ipfs/") {
            &trimmed[idx + "/ipfs/".len()..]
        } else {
            trimmed
        };

        let cid = stripped.trim_matches('/');
        if cid.is_empty() || cid.chars().any(char::is_whitespace) {
            None
        } else {
            Some(Self(cid.to_string()))
        }
    }

    /// Wrap an identifier already known to be in canonical form
    pub(crate) fn from_canonical(cid: String) -> Self {
        Self(cid)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `ipfs://` URI form, suitable as a token URI
    pub fn to_uri(&self) -> String {
        format!("ipfs://{}", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity registry entry for one address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub address: Address,
    pub role: Role,
    /// Content identifier of the profile metadata, as stored on-chain
    pub metadata_pointer: String,
}

/// Profile metadata of a student
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentMetadata {
    pub name: String,
    pub email: String,
    pub student_id: String,
    /// Any additional profile fields supplied at registration
    #[serde(flatten, default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Profile metadata of a credential provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub institution_name: String,
    pub accreditation_number: String,
    /// Content identifier of the uploaded accreditation document
    pub document_pointer: String,
}

/// Role-tagged profile document stored in the content store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum ProfileMetadata {
    Student(StudentMetadata),
    Provider(ProviderMetadata),
}

impl ProfileMetadata {
    pub fn role(&self) -> Role {
        match self {
            ProfileMetadata::Student(_) => Role::Student,
            ProfileMetadata::Provider(_) => Role::Provider,
        }
    }

    pub fn student_id(&self) -> Option<&str> {
        match self {
            ProfileMetadata::Student(student) => Some(student.student_id.as_str()),
            ProfileMetadata::Provider(_) => None,
        }
    }

    /// Parse a profile document as the shape of the registry `role`.
    ///
    /// Documents written by other clients may carry no `role` key. When one
    /// is present it has to agree with the registry.
    pub fn from_document(role: Role, document: serde_json::Value) -> Result<Self, String> {
        let mut fields = match document {
            serde_json::Value::Object(fields) => fields,
            other => return Err(format!("expected a JSON object, got {}", other)),
        };

        if let Some(tag) = fields.remove("role") {
            let tagged = tag
                .as_str()
                .and_then(|text| text.parse::<Role>().ok())
                .ok_or_else(|| format!("unrecognized role tag {}", tag))?;
            if tagged != role {
                return Err(format!("profile tagged {} but registered as {}", tagged, role));
            }
        }

        let body = serde_json::Value::Object(fields);
        match role {
            Role::Student => serde_json::from_value(body)
                .map(ProfileMetadata::Student)
                .map_err(|e| e.to_string()),
            Role::Provider => serde_json::from_value(body)
                .map(ProfileMetadata::Provider)
                .map_err(|e| e.to_string()),
            Role::Unset => Err("address has no registered role".to_string()),
        }
    }
}

/// A certificate issuance request as recorded on the credential ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRequest {
    pub id: RequestId,
    pub student: Address,
    pub institute: Address,
    pub name: String,
    pub message: String,
    /// Metadata pointer of the requesting student at submission time
    pub student_metadata_hash: String,
    pub approved: bool,
}

impl CertificateRequest {
    pub fn is_pending(&self) -> bool {
        !self.approved
    }
}

/// Lifecycle position of a certificate request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Cancelled,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestStatus::Pending => write!(f, "pending"),
            RequestStatus::Approved => write!(f, "approved"),
            RequestStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Minted certificate core fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: TokenId,
    pub name: String,
    /// Institution name recorded at approval
    pub institute: String,
    /// Issue time in unix seconds
    pub issue_date: u64,
    pub certificate_type: String,
    pub student: Address,
    /// Account that approved the request and minted the token
    pub issuer: Address,
    pub token_uri: String,
}

impl Certificate {
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.issue_date)
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
    }
}

/// Certificate plus its soft-loaded metadata document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateView {
    #[serde(flatten)]
    pub certificate: Certificate,
    /// `None` when no gateway could serve the token URI
    pub metadata: Option<serde_json::Value>,
}

/// Certificate joined with live facts about its issuer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CertificateVerification {
    pub view: CertificateView,
    /// Registry role of the issuer, `None` if the read failed
    pub issuer_role: Option<Role>,
    /// Current authorization of the issuer, `None` if the read failed
    pub issuer_authorized: Option<bool>,
}

impl CertificateVerification {
    /// Issued by a registered provider that is still authorized
    pub fn is_trusted(&self) -> bool {
        self.issuer_role == Some(Role::Provider) && self.issuer_authorized == Some(true)
    }
}

/// Providers bucketed by their authorization flag
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderClassification {
    pub authorized: Vec<Address>,
    pub pending: Vec<Address>,
    /// Providers whose authorization could not be read
    pub unresolved: Vec<Address>,
}

/// Student found by external identifier lookup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentMatch {
    pub address: Address,
    pub metadata: StudentMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_address_case_insensitive() {
        let lower = Address::parse("0xabcdef0000000000000000000000000000000001").unwrap();
        let upper = Address::parse("0xABCDEF0000000000000000000000000000000001").unwrap();
        assert_eq!(lower, upper);

        let mut set = HashSet::new();
        set.insert(lower);
        assert!(set.contains(&upper));
    }

    #[test]
    fn test_address_parse_rejects_garbage() {
        assert!(Address::parse("0x1234").is_err());
        assert!(Address::parse("abcdef0000000000000000000000000000000001").is_err());
        assert!(Address::parse("0xzzcdef0000000000000000000000000000000001").is_err());
        assert!(Address::zero().is_zero());
        assert!(!Address::new("0x01").is_zero());
    }

    #[test]
    fn test_content_id_normalization() {
        let bare = ContentId::parse("QmHash").unwrap();
        assert_eq!(ContentId::parse("ipfs://QmHash").unwrap(), bare);
        assert_eq!(ContentId::parse("ipfs://ipfs/QmHash").unwrap(), bare);
        assert_eq!(ContentId::parse("https://ipfs.io/ipfs/QmHash").unwrap(), bare);
        assert_eq!(
            ContentId::parse("ipfs://QmDir/meta.json").unwrap().as_str(),
            "QmDir/meta.json"
        );
        assert!(ContentId::parse("  ").is_none());
        assert!(ContentId::parse("ipfs://").is_none());
        assert_eq!(bare.to_uri(), "ipfs://QmHash");
    }

    #[test]
    fn test_profile_metadata_tagging() {
        let json = r#"{"role":"student","name":"Ada","email":"ada@example.org","studentId":"S100","cohort":2024}"#;
        let profile: ProfileMetadata = serde_json::from_str(json).unwrap();

        assert_eq!(profile.role(), Role::Student);
        assert_eq!(profile.student_id(), Some("S100"));
        match &profile {
            ProfileMetadata::Student(student) => {
                assert_eq!(student.extra.get("cohort"), Some(&serde_json::json!(2024)));
            }
            other => panic!("unexpected variant: {:?}", other),
        }

        let provider = r#"{"role":"provider","institutionName":"Uni","accreditationNumber":"A-1","documentPointer":"QmDoc"}"#;
        let profile: ProfileMetadata = serde_json::from_str(provider).unwrap();
        assert_eq!(profile.role(), Role::Provider);
        assert_eq!(profile.student_id(), None);

        assert!(serde_json::from_str::<ProfileMetadata>(r#"{"role":"admin"}"#).is_err());
    }

    #[test]
    fn test_profile_document_follows_registry_role() {
        let untagged = serde_json::json!({"name": "Ann", "email": "ann@x.org", "studentId": "S100"});
        let profile = ProfileMetadata::from_document(Role::Student, untagged.clone()).unwrap();
        assert_eq!(profile.student_id(), Some("S100"));
        match &profile {
            ProfileMetadata::Student(student) => assert!(student.extra.is_empty()),
            other => panic!("unexpected variant: {:?}", other),
        }

        let tagged = serde_json::json!({"role": "student", "name": "Ann", "email": "ann@x.org", "studentId": "S100"});
        assert_eq!(ProfileMetadata::from_document(Role::Student, tagged.clone()).unwrap(), profile);

        assert!(ProfileMetadata::from_document(Role::Provider, tagged).is_err());
        assert!(ProfileMetadata::from_document(Role::Provider, untagged.clone()).is_err());
        assert!(ProfileMetadata::from_document(Role::Unset, untagged).is_err());
        assert!(ProfileMetadata::from_document(Role::Student, serde_json::json!([1, 2])).is_err());
    }

    #[test]
    fn test_role_codes() {
        for role in [Role::Unset, Role::Student, Role::Provider] {
            assert_eq!(Role::from_code(role.code()), role);
        }
        assert_eq!(Role::from_code(9), Role::Unset);
        assert_eq!("Provider".parse::<Role>().unwrap(), Role::Provider);
    }
}
