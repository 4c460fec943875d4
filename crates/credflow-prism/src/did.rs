//! Issuing-key extraction from long-form did:prism identifiers.
//!
//! A long-form DID is `did:prism:<hash>:<base64url(operation bytes)>`: the
//! entire create operation travels inside the identifier, so the issuing key
//! can be reconstructed without a resolver.
use k256::elliptic_curve::sec1::ToEncodedPoint;
use prost::Message;
use thiserror::Error;

use crate::operations::{atala_operation::Operation, public_key::KeyData, AtalaOperation, KeyUsage};
use crate::SECP256K1_CURVE_NAME;

/// SEC1 marker for an uncompressed curve point.
pub const UNCOMPRESSED_POINT_PREFIX: u8 = 0x04;

const COORDINATE_LEN: usize = 32;

/// An error relating to DID decoding.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DidError {
    /// Short-form DIDs need an external resolver.
    #[error("Short-form DID resolution is not implemented")]
    ShortFormNotSupported,
    /// The embedded operation could not be decoded.
    #[error("Malformed DID payload: {0}")]
    MalformedDidPayload(String),
    /// The create operation carries no key with issuing usage.
    #[error("No issuing key found in DID create operation.")]
    NoIssuingKeyFound,
    /// The issuing key uses a curve other than secp256k1.
    #[error("Unsupported curve: {0}.")]
    UnsupportedCurve(String),
    /// The compressed key data is not a point on the curve.
    #[error("Invalid curve point.")]
    InvalidPoint,
}

/// Public key reconstructed from a DID's embedded create operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrismPublicKey {
    pub key_id: String,
    pub key_usage: KeyUsage,
    pub curve: String,
    pub x: Vec<u8>,
    pub y: Vec<u8>,
}

impl PrismPublicKey {
    /// Uncompressed SEC1 encoding: `0x04 || X(32) || Y(32)`, 65 bytes.
    pub fn to_uncompressed_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + 2 * COORDINATE_LEN);
        bytes.push(UNCOMPRESSED_POINT_PREFIX);
        bytes.extend_from_slice(&left_pad(&self.x));
        bytes.extend_from_slice(&left_pad(&self.y));
        bytes
    }
}

// Coordinates shorter than 32 bytes lost leading zeros in encoding.
fn left_pad(bytes: &[u8]) -> [u8; COORDINATE_LEN] {
    let mut padded = [0u8; COORDINATE_LEN];
    let take = bytes.len().min(COORDINATE_LEN);
    padded[COORDINATE_LEN - take..].copy_from_slice(&bytes[bytes.len() - take..]);
    padded
}

/// Extracts the issuing public key of a long-form DID as its 65-byte
/// uncompressed SEC1 encoding.
pub fn extract_issuing_key(long_form_did: &str) -> Result<Vec<u8>, DidError> {
    Ok(issuing_key(long_form_did)?.to_uncompressed_bytes())
}

/// Decodes the DID's embedded create operation and locates its issuing key.
pub fn issuing_key(long_form_did: &str) -> Result<PrismPublicKey, DidError> {
    let segments: Vec<&str> = long_form_did.split(':').collect();
    if segments.len() < 4 {
        return Err(DidError::ShortFormNotSupported);
    }

    let bytes = base64::decode_config(segments[3], base64::URL_SAFE_NO_PAD)
        .map_err(|err| DidError::MalformedDidPayload(err.to_string()))?;
    let operation = AtalaOperation::decode(bytes.as_slice())
        .map_err(|err| DidError::MalformedDidPayload(err.to_string()))?;

    let create = match operation.operation {
        Some(Operation::CreateDid(create)) => create,
        None => {
            return Err(DidError::MalformedDidPayload(
                "no create operation present".to_string(),
            ))
        }
    };
    let did_data = create.did_data.ok_or_else(|| {
        DidError::MalformedDidPayload("create operation carries no DID data".to_string())
    })?;

    let key = did_data
        .public_keys
        .into_iter()
        .find(|key| key.usage == KeyUsage::IssuingKey as i32)
        .ok_or(DidError::NoIssuingKeyFound)?;

    match key.key_data {
        Some(KeyData::EcKeyData(ec)) => {
            ensure_curve(&ec.curve)?;
            Ok(PrismPublicKey {
                key_id: key.id,
                key_usage: KeyUsage::IssuingKey,
                curve: ec.curve,
                x: ec.x,
                y: ec.y,
            })
        }
        Some(KeyData::CompressedEcKeyData(compressed)) => {
            ensure_curve(&compressed.curve)?;
            let (x, y) = decompress(&compressed.data)?;
            Ok(PrismPublicKey {
                key_id: key.id,
                key_usage: KeyUsage::IssuingKey,
                curve: compressed.curve,
                x,
                y,
            })
        }
        None => Err(DidError::MalformedDidPayload(
            "issuing key carries no key data".to_string(),
        )),
    }
}

fn ensure_curve(curve: &str) -> Result<(), DidError> {
    if curve == SECP256K1_CURVE_NAME {
        Ok(())
    } else {
        Err(DidError::UnsupportedCurve(curve.to_string()))
    }
}

/// Recovers the full curve point from a compressed SEC1 encoding, selecting
/// the Y parity indicated by the compression prefix.
fn decompress(data: &[u8]) -> Result<(Vec<u8>, Vec<u8>), DidError> {
    let point = k256::PublicKey::from_sec1_bytes(data).map_err(|_| DidError::InvalidPoint)?;
    let encoded = point.to_encoded_point(false);
    let x = encoded.x().ok_or(DidError::InvalidPoint)?.to_vec();
    let y = encoded.y().ok_or(DidError::InvalidPoint)?.to_vec();
    Ok((x, y))
}
