//! ES256K compact JWT issuance over credentials.
use chrono::{Duration, Utc};
use k256::ecdsa::{signature::Signer, Signature, SigningKey};
use serde_json::{json, Value};
use thiserror::Error;

use credflow_core::config::core_config;

use crate::credential::VerifiableCredential;

pub const JWT_ALGORITHM: &str = "ES256K";
pub const JWT_TYPE: &str = "JWT";

/// Length of a raw secp256k1 private scalar.
const PRIVATE_KEY_LEN: usize = 32;

/// An error relating to credential signing.
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Key is malformed or a curve operation failed. Malformed keys are an
    /// expected caller error, not a bug.
    #[error("Failed to sign credential: {0}")]
    SigningFailed(String),
    /// Credential could not be serialized into a JWT payload.
    #[error("Failed to serialize credential: {0}")]
    Serialization(String),
}

/// Signs a credential into a compact ES256K JWT.
///
/// The detached signature is ECDSA over SHA-256 of `headerB64.payloadB64`,
/// encoded as raw `r||s` (not DER), base64url without padding.
pub fn sign_credential(
    credential: &VerifiableCredential,
    issuer_did: &str,
    private_key: &[u8],
) -> Result<String, CryptoError> {
    if private_key.len() != PRIVATE_KEY_LEN {
        return Err(CryptoError::SigningFailed(format!(
            "expected a {PRIVATE_KEY_LEN}-byte secp256k1 key, got {} bytes",
            private_key.len()
        )));
    }
    let signing_key = SigningKey::from_slice(private_key)
        .map_err(|err| CryptoError::SigningFailed(err.to_string()))?;

    let header = json!({ "alg": JWT_ALGORITHM, "typ": JWT_TYPE });
    let header_b64 = encode_segment(&header)?;

    // The vc claim repeats the credential minus the issuer, which the iss
    // claim carries.
    let mut vc = serde_json::to_value(credential)
        .map_err(|err| CryptoError::Serialization(err.to_string()))?;
    if let Some(object) = vc.as_object_mut() {
        object.remove("issuer");
    }

    let subject_id = credential
        .credential_subject
        .first()
        .and_then(|subject| subject.id.clone());
    let now = Utc::now();
    let expiry = now + Duration::days(core_config().credential_ttl_days);
    let mut payload = json!({
        "iss": issuer_did,
        "nbf": now.timestamp(),
        "exp": expiry.timestamp(),
        "vc": vc,
    });
    if let Some(subject_id) = subject_id {
        payload["sub"] = json!(subject_id);
    }
    let payload_b64 = encode_segment(&payload)?;

    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature: Signature = signing_key
        .try_sign(signing_input.as_bytes())
        .map_err(|err| CryptoError::SigningFailed(err.to_string()))?;
    let signature_b64 = base64::encode_config(signature.to_bytes(), base64::URL_SAFE_NO_PAD);

    Ok(format!("{signing_input}.{signature_b64}"))
}

fn encode_segment(value: &Value) -> Result<String, CryptoError> {
    let json = serde_json::to_string(value)
        .map_err(|err| CryptoError::Serialization(err.to_string()))?;
    Ok(base64::encode_config(json.as_bytes(), base64::URL_SAFE_NO_PAD))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::build_credential;
    use serde_json::Map;

    const TEST_PRIVATE_KEY: [u8; 32] = [0x11; 32];

    fn credential() -> VerifiableCredential {
        let mut claims = Map::new();
        claims.insert("role".to_string(), json!("examiner"));
        build_credential(
            "did:prism:issuer",
            "did:prism:subject",
            claims,
            Utc::now(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_sign_produces_three_segments() {
        let jwt = sign_credential(&credential(), "did:prism:issuer", &TEST_PRIVATE_KEY).unwrap();
        let segments: Vec<&str> = jwt.split('.').collect();
        assert_eq!(segments.len(), 3);
        // Raw r||s signature: 64 bytes.
        let signature =
            base64::decode_config(segments[2], base64::URL_SAFE_NO_PAD).unwrap();
        assert_eq!(signature.len(), 64);
    }

    #[test]
    fn test_signed_header_is_canonical() {
        let jwt = sign_credential(&credential(), "did:prism:issuer", &TEST_PRIVATE_KEY).unwrap();
        let header_b64 = jwt.split('.').next().unwrap();
        let header = base64::decode_config(header_b64, base64::URL_SAFE_NO_PAD).unwrap();
        assert_eq!(
            String::from_utf8(header).unwrap(),
            "{\"alg\":\"ES256K\",\"typ\":\"JWT\"}"
        );
    }

    #[test]
    fn test_payload_claims() {
        let jwt = sign_credential(&credential(), "did:prism:issuer", &TEST_PRIVATE_KEY).unwrap();
        let payload_b64 = jwt.split('.').nth(1).unwrap();
        let payload: Value = serde_json::from_slice(
            &base64::decode_config(payload_b64, base64::URL_SAFE_NO_PAD).unwrap(),
        )
        .unwrap();
        assert_eq!(payload["iss"], json!("did:prism:issuer"));
        assert_eq!(payload["sub"], json!("did:prism:subject"));
        // The vc claim must not duplicate the issuer.
        assert!(payload["vc"].get("issuer").is_none());
        let nbf = payload["nbf"].as_i64().unwrap();
        let exp = payload["exp"].as_i64().unwrap();
        assert!(exp > nbf);
        // Five-year default lifetime.
        assert_eq!((exp - nbf) / 86_400, 1826);
    }

    #[test]
    fn test_sign_rejects_wrong_key_lengths() {
        for key in [vec![], vec![0x22; 31], vec![0x22; 33], vec![0x22; 64]] {
            let err = sign_credential(&credential(), "did:prism:issuer", &key).unwrap_err();
            assert!(err.to_string().contains("Failed to sign credential"));
        }
    }

    #[test]
    fn test_sign_rejects_zero_scalar() {
        // All-zero bytes are length-valid but not a usable scalar.
        let err = sign_credential(&credential(), "did:prism:issuer", &[0u8; 32]).unwrap_err();
        assert!(err.to_string().contains("Failed to sign credential"));
    }
}
