//! did:prism credential pipeline: issuance, verification and revocation.
pub mod credential;
pub mod did;
pub mod jwt;
pub mod operations;
pub mod revocation;
pub mod verify;

/// DID method handled by this crate.
pub const PRISM_METHOD: &str = "prism";

/// Curve name carried in PRISM key data.
pub const SECP256K1_CURVE_NAME: &str = "secp256k1";
