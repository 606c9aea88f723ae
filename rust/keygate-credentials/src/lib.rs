//! Concrete key and signature types for keygate.
//!
//! This crate provides the cryptographic material that the key store and the
//! signature engine in `keygate` operate on: an ECDSA P-256 signing key, its
//! exportable public half (raw SEC1, SPKI DER and base64 forms) and DER
//! encoded signatures.

pub mod key;

pub mod es256;
pub use es256::*;
