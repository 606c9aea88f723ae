//! ES256 (ECDSA P-256 with SHA-256) key types, signer and verifier.
//!
//! P-256 with SHA-256 is the default curve of both Android Keystore and the
//! Apple Secure Enclave, so it is the only algorithm keygate issues keys for.
//! Signatures are ASN.1 DER encoded, which is what platform key stores emit.
//!
//! Public keys travel as SPKI DER. Their text form is the standard base64
//! encoding of that DER with no line breaks.

mod error;
mod der;
mod signer;
mod verifier;

pub use error::{P256KeyError, P256PublicKeyError, P256SignatureError, P256VerifyError};
pub use der::P256Signature;
pub use signer::P256Signer;
pub use verifier::{P256_SPKI_HEADER, P256PublicKey};
