//! Bitstring status-list revocation checking.
//!
//! Issuers publish a gzip-compressed, base64url-encoded bit array in which
//! each credential owns one bit at a known index. The check fetches the
//! status-list credential, decodes the bitstring and tests the bit.
use std::io::Read;
use std::time::Duration;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

use credflow_core::config::core_config;

use crate::credential::VerifiableCredential;

/// An error relating to a transport collaborator.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request failed.
    #[error("HTTP request failed: {0}")]
    Http(String),
    /// No transport is wired for the requested channel.
    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// An error relating to revocation checking.
#[derive(Error, Debug)]
pub enum RevocationError {
    /// Status-list fetch failed.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Status-list credential is missing or undecodable.
    #[error("Malformed status list: {0}")]
    MalformedStatusList(String),
}

/// Collaborator fetching remote status-list credentials. Implementations
/// must bound the call with a timeout so a stuck fetch cannot block other
/// workflow instances.
#[async_trait]
pub trait StatusListFetch: Send + Sync {
    async fn get_string(&self, url: &str) -> Result<String, TransportError>;
}

/// reqwest-backed fetcher with the configured HTTP timeout.
pub struct HttpStatusListFetcher {
    client: reqwest::Client,
}

impl HttpStatusListFetcher {
    pub fn new() -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(core_config().http_timeout_secs))
            .build()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl StatusListFetch for HttpStatusListFetcher {
    async fn get_string(&self, url: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| TransportError::Http(err.to_string()))?
            .error_for_status()
            .map_err(|err| TransportError::Http(err.to_string()))?;
        response
            .text()
            .await
            .map_err(|err| TransportError::Http(err.to_string()))
    }
}

/// Tests the credential's bit in its issuer-published status list.
///
/// A credential without a status entry is simply not revoked. Failures are
/// limited to transport and parse errors; an index beyond the end of the
/// bitstring reads as not revoked.
pub async fn is_revoked(
    credential: &VerifiableCredential,
    fetcher: &dyn StatusListFetch,
) -> Result<bool, RevocationError> {
    let status = match &credential.credential_status {
        Some(status) => status,
        None => return Ok(false),
    };
    let index: usize = status.status_list_index.parse().map_err(|_| {
        RevocationError::MalformedStatusList(format!(
            "non-numeric status list index: {}",
            status.status_list_index
        ))
    })?;

    let body = fetcher.get_string(&status.status_list_credential).await?;
    let list: Value = serde_json::from_str(&body)
        .map_err(|err| RevocationError::MalformedStatusList(err.to_string()))?;
    let encoded = list
        .pointer("/credentialSubject/encodedList")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            RevocationError::MalformedStatusList(
                "no credentialSubject.encodedList field".to_string(),
            )
        })?;

    let bitstring = decode_bitstring(encoded)?;
    Ok(bit_at(&bitstring, index))
}

/// Base64url-decodes (padding to a multiple of 4) and gunzips an encoded
/// status list. A gzip failure falls back to treating the decoded bytes as
/// the uncompressed bitstring; known ambiguity, as genuinely corrupt lists
/// take the same path.
fn decode_bitstring(encoded: &str) -> Result<Vec<u8>, RevocationError> {
    let mut padded = encoded.trim_end_matches('=').to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = base64::decode_config(&padded, base64::URL_SAFE)
        .map_err(|err| RevocationError::MalformedStatusList(err.to_string()))?;

    let mut decompressed = Vec::new();
    match GzDecoder::new(bytes.as_slice()).read_to_end(&mut decompressed) {
        Ok(_) => Ok(decompressed),
        Err(_) => {
            warn!("status list is not gzip-compressed, using decoded bytes as-is");
            Ok(bytes)
        }
    }
}

fn bit_at(bitstring: &[u8], index: usize) -> bool {
    let byte = index / 8;
    if byte >= bitstring.len() {
        return false;
    }
    bitstring[byte] & (1 << (7 - (index % 8))) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credential::{build_credential, CredentialStatus};
    use chrono::Utc;
    use flate2::{write::GzEncoder, Compression};
    use serde_json::{json, Map};
    use std::io::Write;

    struct CannedFetcher(String);

    #[async_trait]
    impl StatusListFetch for CannedFetcher {
        async fn get_string(&self, _url: &str) -> Result<String, TransportError> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl StatusListFetch for FailingFetcher {
        async fn get_string(&self, url: &str) -> Result<String, TransportError> {
            Err(TransportError::Http(format!("connection refused: {url}")))
        }
    }

    fn credential_with_status(index: &str) -> VerifiableCredential {
        let mut credential = build_credential(
            "did:prism:issuer",
            "did:prism:subject",
            Map::new(),
            Utc::now(),
            None,
        )
        .unwrap();
        credential.credential_status = Some(CredentialStatus {
            id: "https://issuer.example/status/1#42".to_string(),
            type_: "StatusList2021Entry".to_string(),
            status_purpose: "revocation".to_string(),
            status_list_index: index.to_string(),
            status_list_credential: "https://issuer.example/status/1".to_string(),
        });
        credential
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn status_list_body(bitstring: &[u8], compress: bool) -> String {
        let raw = if compress {
            gzip(bitstring)
        } else {
            bitstring.to_vec()
        };
        let encoded = base64::encode_config(raw, base64::URL_SAFE_NO_PAD);
        json!({ "credentialSubject": { "encodedList": encoded } }).to_string()
    }

    #[tokio::test]
    async fn test_no_status_means_not_revoked() {
        let credential = build_credential(
            "did:prism:issuer",
            "did:prism:subject",
            Map::new(),
            Utc::now(),
            None,
        )
        .unwrap();
        let revoked = is_revoked(&credential, &FailingFetcher).await.unwrap();
        assert!(!revoked);
    }

    #[tokio::test]
    async fn test_revoked_bit_set() {
        // Bit 10 set: byte 1, mask 0b0010_0000.
        let fetcher = CannedFetcher(status_list_body(&[0x00, 0x20, 0x00], true));
        let credential = credential_with_status("10");
        assert!(is_revoked(&credential, &fetcher).await.unwrap());
    }

    #[tokio::test]
    async fn test_unset_bit_not_revoked() {
        let fetcher = CannedFetcher(status_list_body(&[0x00, 0x20, 0x00], true));
        let credential = credential_with_status("11");
        assert!(!is_revoked(&credential, &fetcher).await.unwrap());
    }

    #[tokio::test]
    async fn test_uncompressed_fallback() {
        let fetcher = CannedFetcher(status_list_body(&[0b1000_0000], false));
        let credential = credential_with_status("0");
        assert!(is_revoked(&credential, &fetcher).await.unwrap());
    }

    #[tokio::test]
    async fn test_index_beyond_list_is_not_revoked() {
        let fetcher = CannedFetcher(status_list_body(&[0xff], true));
        let credential = credential_with_status("1000");
        assert!(!is_revoked(&credential, &fetcher).await.unwrap());
    }

    #[tokio::test]
    async fn test_non_numeric_index_is_error() {
        let fetcher = CannedFetcher(status_list_body(&[0x00], true));
        let credential = credential_with_status("not-a-number");
        assert!(matches!(
            is_revoked(&credential, &fetcher).await,
            Err(RevocationError::MalformedStatusList(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_encoded_list_is_error() {
        let fetcher = CannedFetcher(json!({ "credentialSubject": {} }).to_string());
        let credential = credential_with_status("0");
        assert!(matches!(
            is_revoked(&credential, &fetcher).await,
            Err(RevocationError::MalformedStatusList(_))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let credential = credential_with_status("0");
        assert!(matches!(
            is_revoked(&credential, &FailingFetcher).await,
            Err(RevocationError::Transport(_))
        ));
    }
}
