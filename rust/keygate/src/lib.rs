#![warn(missing_docs)]

//! Biometric-gated key management.
//!
//! keygate manages P-256 key pairs whose private halves are only usable right
//! after the user authenticates. An application names each key pair with a
//! [`KeyAlias`] and goes through [`KeyGate`] for everything:
//!
//! - [`KeyGate::create_key_pair`] prompts, then generates a key pair and
//!   records the enrollment baseline it was created under.
//! - [`KeyGate::sign`] prompts, redeems the resulting single-use
//!   [`AuthorizationToken`] and signs with ES256.
//! - [`KeyGate::verify`] checks a signature against the key under an alias.
//!   [`verify_signature`] does the same for a caller-held public key.
//! - [`KeyGate::is_biometric_changed`] reports whether the enrolled
//!   biometrics (or the key) changed since the baseline, and
//!   [`KeyGate::reset_biometric_changed`] accepts the current state.
//!
//! Prompts go through a [`BiometricPlatform`]. [`SimulatedPlatform`] is a
//! scriptable implementation for tests and headless hosts.

mod alias;
pub use alias::*;

mod config;
pub use config::*;

mod detector;
pub use detector::*;

mod engine;
pub use engine::*;

mod error;
pub use error::*;

mod event;
pub use event::*;

mod gate;
pub use gate::*;

mod keystore;
pub use keystore::*;

mod manager;
pub use manager::*;

mod platform;
pub use platform::*;

mod prompt;
pub use prompt::*;

mod request;
pub use request::*;

pub use keygate_common::Fingerprint;
pub use keygate_credentials::{P256PublicKey, P256Signature};
pub use keygate_storage::{KeyGateStorageError, StorageBackend};
