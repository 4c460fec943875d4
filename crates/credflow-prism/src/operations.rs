//! Protobuf messages for the PRISM create-DID operation.
//!
//! Generated from the PRISM node protocol definitions and checked in
//! manually for offline builds. Only the subset needed to decode the
//! create operation embedded in a long-form DID is kept.

/// Operation envelope embedded (base64url-encoded) in a long-form DID.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct AtalaOperation {
    #[prost(oneof = "atala_operation::Operation", tags = "1")]
    pub operation: ::core::option::Option<atala_operation::Operation>,
}

pub mod atala_operation {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Operation {
        #[prost(message, tag = "1")]
        CreateDid(super::CreateDidOperation),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CreateDidOperation {
    #[prost(message, optional, tag = "1")]
    pub did_data: ::core::option::Option<DidCreationData>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DidCreationData {
    #[prost(message, repeated, tag = "2")]
    pub public_keys: ::prost::alloc::vec::Vec<PublicKey>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PublicKey {
    #[prost(string, tag = "1")]
    pub id: ::prost::alloc::string::String,
    #[prost(enumeration = "KeyUsage", tag = "2")]
    pub usage: i32,
    #[prost(oneof = "public_key::KeyData", tags = "8, 9")]
    pub key_data: ::core::option::Option<public_key::KeyData>,
}

pub mod public_key {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum KeyData {
        /// Raw elliptic-curve coordinates.
        #[prost(message, tag = "8")]
        EcKeyData(super::EcKeyData),
        /// Compressed SEC1 curve point.
        #[prost(message, tag = "9")]
        CompressedEcKeyData(super::CompressedEcKeyData),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EcKeyData {
    #[prost(string, tag = "1")]
    pub curve: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub x: ::prost::alloc::vec::Vec<u8>,
    #[prost(bytes = "vec", tag = "3")]
    pub y: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct CompressedEcKeyData {
    #[prost(string, tag = "1")]
    pub curve: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub data: ::prost::alloc::vec::Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum KeyUsage {
    UnknownKey = 0,
    MasterKey = 1,
    IssuingKey = 2,
    KeyAgreementKey = 3,
    AuthenticationKey = 4,
    RevocationKey = 5,
    CapabilityInvocationKey = 6,
    CapabilityDelegationKey = 7,
}
