//! W3C verifiable credential model and compact-JWT parsing.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub const CREDENTIALS_V1_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const VERIFIABLE_CREDENTIAL_TYPE: &str = "VerifiableCredential";

/// An error relating to credential construction or JWT parsing.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    /// String is not a structurally valid DID.
    #[error("Invalid DID format: {0}.")]
    InvalidDidFormat(String),
    /// JWT is not three dot-separated segments.
    #[error("Malformed JWT: expected three dot-separated segments.")]
    MalformedJwt,
    /// JWT segment is not valid base64url or JSON.
    #[error("Undecodable JWT segment: {0}")]
    UndecodableJwtSegment(String),
    /// JWT payload carries no vc claim.
    #[error("JWT payload carries no vc claim.")]
    MissingVcClaim,
}

/// One or many values, serialized without a wrapper for the single case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::One(value) => Some(value),
            OneOrMany::Many(values) => values.first(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::One(_) => 1,
            OneOrMany::Many(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The entity a credential makes claims about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CredentialSubject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub claims: Map<String, Value>,
}

/// Pointer into an issuer-published bitstring status list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub status_purpose: String,
    /// Bit position, serialized as a string per the status-list data model.
    pub status_list_index: String,
    pub status_list_credential: String,
}

/// Raw JWT material retained after parsing an externally supplied
/// credential: the decoded header and payload byte-for-byte as signed, and
/// the detached `r||s` signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JwtArtefact {
    pub header_json: String,
    pub payload_json: String,
    pub signature: Vec<u8>,
}

/// A verifiable credential. Built in-memory by [`build_credential`] and
/// immutable thereafter, except for the JWT artefact populated when parsing
/// an externally supplied credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiableCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    #[serde(rename = "type")]
    pub type_: Vec<String>,
    pub credential_subject: OneOrMany<CredentialSubject>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issuance_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_status: Option<CredentialStatus>,
    #[serde(skip)]
    pub jwt: Option<JwtArtefact>,
}

/// Assembles an unsigned credential with a single subject entry carrying
/// the claims. Fails only on malformed DID strings.
pub fn build_credential(
    issuer_did: &str,
    subject_did: &str,
    claims: Map<String, Value>,
    valid_from: DateTime<Utc>,
    valid_until: Option<DateTime<Utc>>,
) -> Result<VerifiableCredential, CredentialError> {
    validate_did(issuer_did)?;
    validate_did(subject_did)?;
    Ok(VerifiableCredential {
        context: vec![CREDENTIALS_V1_CONTEXT.to_string()],
        type_: vec![VERIFIABLE_CREDENTIAL_TYPE.to_string()],
        credential_subject: OneOrMany::One(CredentialSubject {
            id: Some(subject_did.to_string()),
            claims,
        }),
        issuer: Some(issuer_did.to_string()),
        issuance_date: Some(valid_from),
        expiration_date: None,
        valid_from: Some(valid_from),
        valid_until,
        credential_status: None,
        jwt: None,
    })
}

fn validate_did(did: &str) -> Result<(), CredentialError> {
    let segments: Vec<&str> = did.split(':').collect();
    if segments.len() < 3
        || segments[0] != "did"
        || segments.iter().any(|segment| segment.is_empty())
    {
        return Err(CredentialError::InvalidDidFormat(did.to_string()));
    }
    Ok(())
}

/// Parses a compact JWT into a credential, retaining the raw header/payload
/// JSON and the detached signature for later verification.
pub fn parse_jwt_credential(jwt: &str) -> Result<VerifiableCredential, CredentialError> {
    let segments: Vec<&str> = jwt.split('.').collect();
    if segments.len() != 3 {
        return Err(CredentialError::MalformedJwt);
    }

    let header_json = decode_json_segment(segments[0], "header")?;
    let payload_json = decode_json_segment(segments[1], "payload")?;
    let signature = base64::decode_config(segments[2], base64::URL_SAFE_NO_PAD)
        .map_err(|err| CredentialError::UndecodableJwtSegment(format!("signature: {err}")))?;

    let payload: Value = serde_json::from_str(&payload_json)
        .map_err(|err| CredentialError::UndecodableJwtSegment(format!("payload: {err}")))?;
    let vc_claim = payload.get("vc").ok_or(CredentialError::MissingVcClaim)?;
    let mut credential: VerifiableCredential = serde_json::from_value(vc_claim.clone())
        .map_err(|err| CredentialError::UndecodableJwtSegment(format!("vc claim: {err}")))?;

    // The issuer is carried by the iss claim rather than duplicated in vc.
    if credential.issuer.is_none() {
        credential.issuer = payload
            .get("iss")
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    credential.jwt = Some(JwtArtefact {
        header_json,
        payload_json,
        signature,
    });
    Ok(credential)
}

fn decode_json_segment(segment: &str, name: &str) -> Result<String, CredentialError> {
    let bytes = base64::decode_config(segment, base64::URL_SAFE_NO_PAD)
        .map_err(|err| CredentialError::UndecodableJwtSegment(format!("{name}: {err}")))?;
    String::from_utf8(bytes)
        .map_err(|err| CredentialError::UndecodableJwtSegment(format!("{name}: {err}")))
}
