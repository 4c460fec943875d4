//! Signature and expiry checks for parsed JWT credentials.
use chrono::Utc;
use k256::ecdsa::{signature::Verifier, Signature, VerifyingKey};
use thiserror::Error;

use crate::credential::VerifiableCredential;
use crate::did::{self, DidError};

/// Raw `r||s` signature length.
const SIGNATURE_LEN: usize = 64;

/// An error relating to signature verification preconditions.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum VerificationError {
    /// Credential carries no parsed JWT material.
    #[error("Credential carries no parsed JWT material.")]
    MissingJwtArtefact,
    /// Credential carries no issuer DID.
    #[error("Credential carries no issuer.")]
    MissingIssuer,
    /// Signature bytes are not a detached r||s pair.
    #[error("Malformed signature: {0}")]
    MalformedSignature(String),
    /// Wrapped error for issuing-key extraction.
    #[error(transparent)]
    Did(#[from] DidError),
    /// Extracted key bytes do not form a valid public key.
    #[error("Invalid issuer public key.")]
    InvalidPublicKey,
}

/// Verifies the detached ES256K signature of a parsed JWT credential against
/// the issuing key embedded in its issuer's long-form DID.
///
/// Returns `Ok(false)` for a structurally valid but cryptographically wrong
/// signature; missing preconditions are errors.
pub fn verify_signature(credential: &VerifiableCredential) -> Result<bool, VerificationError> {
    let artefact = credential
        .jwt
        .as_ref()
        .ok_or(VerificationError::MissingJwtArtefact)?;
    let issuer = credential
        .issuer
        .as_deref()
        .ok_or(VerificationError::MissingIssuer)?;
    if artefact.signature.len() != SIGNATURE_LEN {
        return Err(VerificationError::MalformedSignature(format!(
            "expected {SIGNATURE_LEN} bytes, got {}",
            artefact.signature.len()
        )));
    }

    // Re-derive the signing input: base64url of the retained JSON bytes
    // reproduces the original segments exactly.
    let header_b64 = base64::encode_config(artefact.header_json.as_bytes(), base64::URL_SAFE_NO_PAD);
    let payload_b64 =
        base64::encode_config(artefact.payload_json.as_bytes(), base64::URL_SAFE_NO_PAD);
    let signing_input = format!("{header_b64}.{payload_b64}");

    let key_bytes = did::extract_issuing_key(issuer)?;
    let verifying_key = VerifyingKey::from_sec1_bytes(&key_bytes)
        .map_err(|_| VerificationError::InvalidPublicKey)?;

    // A length-valid signature whose scalars fall outside the group order is
    // cryptographically invalid, not a precondition failure.
    let signature = match Signature::from_slice(&artefact.signature) {
        Ok(signature) => signature,
        Err(_) => return Ok(false),
    };
    let signature = signature.normalize_s().unwrap_or(signature);
    Ok(verifying_key
        .verify(signing_input.as_bytes(), &signature)
        .is_ok())
}

/// Whether the credential is past its validity window: `valid_until` wins,
/// then `expiration_date`; absent both, never expired.
pub fn is_expired(credential: &VerifiableCredential) -> bool {
    let now = Utc::now();
    match (credential.valid_until, credential.expiration_date) {
        (Some(valid_until), _) => now > valid_until,
        (None, Some(expiration_date)) => now > expiration_date,
        (None, None) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{build_credential, parse_jwt_credential};
    use crate::jwt::sign_credential;
    use crate::operations::{
        atala_operation, public_key, AtalaOperation, CompressedEcKeyData, CreateDidOperation,
        DidCreationData, KeyUsage, PublicKey,
    };
    use crate::SECP256K1_CURVE_NAME;
    use chrono::Duration;
    use k256::ecdsa::SigningKey;
    use prost::Message;
    use serde_json::{json, Map};

    const TEST_PRIVATE_KEY: [u8; 32] = [0x42; 32];

    /// Long-form DID whose issuing key corresponds to `TEST_PRIVATE_KEY`.
    fn issuer_did() -> String {
        let signing_key = SigningKey::from_slice(&TEST_PRIVATE_KEY).unwrap();
        let compressed = signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();
        let operation = AtalaOperation {
            operation: Some(atala_operation::Operation::CreateDid(CreateDidOperation {
                did_data: Some(DidCreationData {
                    public_keys: vec![PublicKey {
                        id: "issuing0".to_string(),
                        usage: KeyUsage::IssuingKey as i32,
                        key_data: Some(public_key::KeyData::CompressedEcKeyData(
                            CompressedEcKeyData {
                                curve: SECP256K1_CURVE_NAME.to_string(),
                                data: compressed,
                            },
                        )),
                    }],
                }),
            })),
        };
        let encoded =
            base64::encode_config(operation.encode_to_vec(), base64::URL_SAFE_NO_PAD);
        format!("did:prism:0b2f5fbc30b7a6a9f2c5d3e5b7a1d964:{encoded}")
    }

    fn signed_jwt() -> String {
        let issuer = issuer_did();
        let mut claims = Map::new();
        claims.insert("clearance".to_string(), json!("level-2"));
        let credential =
            build_credential(&issuer, "did:prism:subject", claims, Utc::now(), None).unwrap();
        sign_credential(&credential, &issuer, &TEST_PRIVATE_KEY).unwrap()
    }

    #[test]
    fn test_sign_then_verify() {
        let credential = parse_jwt_credential(&signed_jwt()).unwrap();
        assert_eq!(verify_signature(&credential), Ok(true));
    }

    #[test]
    fn test_tampered_signature_is_false_not_error() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        if let Some(artefact) = credential.jwt.as_mut() {
            // Flip one bit in r.
            artefact.signature[10] ^= 0x01;
        }
        assert_eq!(verify_signature(&credential), Ok(false));
    }

    #[test]
    fn test_tampered_payload_is_false() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        if let Some(artefact) = credential.jwt.as_mut() {
            artefact.payload_json = artefact.payload_json.replace("level-2", "level-9");
        }
        assert_eq!(verify_signature(&credential), Ok(false));
    }

    #[test]
    fn test_missing_artefact_is_error() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.jwt = None;
        assert_eq!(
            verify_signature(&credential),
            Err(VerificationError::MissingJwtArtefact)
        );
    }

    #[test]
    fn test_missing_issuer_is_error() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.issuer = None;
        assert_eq!(
            verify_signature(&credential),
            Err(VerificationError::MissingIssuer)
        );
    }

    #[test]
    fn test_truncated_signature_is_error() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        if let Some(artefact) = credential.jwt.as_mut() {
            artefact.signature.truncate(40);
        }
        assert!(matches!(
            verify_signature(&credential),
            Err(VerificationError::MalformedSignature(_))
        ));
    }

    #[test]
    fn test_short_form_issuer_is_error() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.issuer = Some("did:prism:short".to_string());
        assert_eq!(
            verify_signature(&credential),
            Err(VerificationError::Did(DidError::ShortFormNotSupported))
        );
    }

    #[test]
    fn test_is_expired_valid_until() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.valid_until = Some(Utc::now() - Duration::hours(1));
        assert!(is_expired(&credential));
        credential.valid_until = Some(Utc::now() + Duration::hours(1));
        assert!(!is_expired(&credential));
    }

    #[test]
    fn test_is_expired_falls_back_to_expiration_date() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.valid_until = None;
        credential.expiration_date = Some(Utc::now() - Duration::hours(1));
        assert!(is_expired(&credential));
    }

    #[test]
    fn test_valid_until_wins_over_expiration_date() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.valid_until = Some(Utc::now() + Duration::hours(1));
        credential.expiration_date = Some(Utc::now() - Duration::hours(1));
        assert!(!is_expired(&credential));
    }

    #[test]
    fn test_not_expired_without_validity_fields() {
        let mut credential = parse_jwt_credential(&signed_jwt()).unwrap();
        credential.valid_until = None;
        credential.expiration_date = None;
        assert!(!is_expired(&credential));
    }
}
