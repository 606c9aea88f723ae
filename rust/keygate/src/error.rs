//! The error taxonomy surfaced to callers.

use std::time::Duration;

use keygate_storage::KeyGateStorageError;
use thiserror::Error;

use crate::{alias::KeyAlias, gate::GateError, keystore::KeyStoreError};

/// A named request argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    /// The key alias.
    Key,
    /// The payload to sign or verify.
    Payload,
    /// The signature to verify.
    Signature,
    /// A caller-held public key.
    PublicKey,
}

impl Field {
    /// The argument's wire name.
    pub const fn name(&self) -> &'static str {
        match self {
            Field::Key => "key",
            Field::Payload => "payload",
            Field::Signature => "signature",
            Field::PublicKey => "publicKey",
        }
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// What a caller can do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Retrying the same operation may succeed.
    Retry,
    /// Retrying may succeed once the given cool-down has elapsed.
    RetryAfter(Duration),
    /// Only an out-of-band step (device credential, re-enrollment) helps.
    OutOfBand,
    /// The request itself must change.
    FixRequest,
    /// Nothing the caller does will make this succeed on this device.
    None,
}

/// Errors surfaced by [`crate::KeyGate`].
#[derive(Debug, Clone, Error)]
pub enum KeyGateError {
    /// A required argument was absent.
    #[error("{0} is missing")]
    MissingArgument(Field),

    /// An argument was present but could not be decoded.
    #[error("{field} is invalid: {reason}")]
    InvalidArgument {
        /// The offending argument.
        field: Field,
        /// Why it was rejected.
        reason: String,
    },

    /// The device has nothing to authenticate with (no enrolled biometric,
    /// no passcode, no prompt host).
    #[error("no authenticatable context: {0}")]
    NoAuthenticatableContext(String),

    /// The user dismissed the prompt.
    #[error("authentication was canceled")]
    Canceled,

    /// The presented credential did not match.
    #[error("authentication failed, {remaining_attempts} attempt(s) left before lockout")]
    Failed {
        /// Mismatches left before the alias locks out.
        remaining_attempts: u32,
    },

    /// The device credential did not match. Existing lockouts stay in place.
    #[error("the device credential was rejected")]
    CredentialRejected,

    /// Too many failures; the alias is cooling down.
    #[error("authentication is locked out for another {retry_after:?}")]
    LockedOut {
        /// Time left in the cool-down.
        retry_after: Duration,
    },

    /// Biometric authentication is disabled until a device credential is
    /// presented.
    #[error("authentication is permanently locked out")]
    PermanentlyLockedOut,

    /// The platform did not deliver an outcome in time.
    #[error("authentication timed out")]
    TimedOut,

    /// A prompt for this alias is already on screen.
    #[error("an authentication prompt for '{0}' is already in progress")]
    Busy(KeyAlias),

    /// No usable key pair exists under the alias. Keys invalidated by an
    /// enrollment change report this as well.
    #[error("no key pair under '{0}'")]
    KeyNotFound(KeyAlias),

    /// A key pair already exists under the alias.
    #[error("a key pair already exists under '{0}'")]
    AliasInUse(KeyAlias),

    /// A private-key operation was attempted without a valid authorization.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// This platform cannot provide biometric-gated keys at all.
    #[error("biometric signatures are not supported on this platform")]
    PlatformUnsupported,

    /// The requested key policy cannot be enforced here.
    #[error("key policy unsupported: {0}")]
    PolicyUnsupported(String),

    /// Any other platform or hardware failure.
    #[error("platform error: {0}")]
    Platform(String),

    /// The backing store failed.
    #[error(transparent)]
    Storage(#[from] KeyGateStorageError),
}

impl KeyGateError {
    /// A stable, machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            KeyGateError::MissingArgument(Field::Key) => "KeyIsNull",
            KeyGateError::MissingArgument(Field::Payload) => "PayloadIsNull",
            KeyGateError::MissingArgument(Field::Signature) => "SignatureIsNull",
            KeyGateError::MissingArgument(Field::PublicKey) => "PkIsNull",
            KeyGateError::InvalidArgument { .. } => "InvalidArgument",
            KeyGateError::NoAuthenticatableContext(_) => "NoAuthenticatableContext",
            KeyGateError::Canceled => "Canceled",
            KeyGateError::Failed { .. } | KeyGateError::CredentialRejected => "Failed",
            KeyGateError::LockedOut { .. } => "LockedOut",
            KeyGateError::PermanentlyLockedOut => "PermanentlyLockedOut",
            KeyGateError::TimedOut => "TimedOut",
            KeyGateError::Busy(_) => "Busy",
            KeyGateError::KeyNotFound(_) => "KeyNotFound",
            KeyGateError::AliasInUse(_) => "AliasInUse",
            KeyGateError::Unauthorized(_) => "Unauthorized",
            KeyGateError::PlatformUnsupported => "PlatformUnsupported",
            KeyGateError::PolicyUnsupported(_) => "PolicyUnsupported",
            KeyGateError::Platform(_) | KeyGateError::Storage(_) => "Error",
        }
    }

    /// How a caller may recover from this error.
    pub fn recovery(&self) -> Recovery {
        match self {
            KeyGateError::Canceled
            | KeyGateError::Failed { .. }
            | KeyGateError::CredentialRejected
            | KeyGateError::TimedOut
            | KeyGateError::Busy(_)
            | KeyGateError::Unauthorized(_)
            | KeyGateError::Storage(_) => Recovery::Retry,
            KeyGateError::LockedOut { retry_after } => Recovery::RetryAfter(*retry_after),
            KeyGateError::PermanentlyLockedOut | KeyGateError::NoAuthenticatableContext(_) => {
                Recovery::OutOfBand
            }
            KeyGateError::MissingArgument(_)
            | KeyGateError::InvalidArgument { .. }
            | KeyGateError::KeyNotFound(_)
            | KeyGateError::AliasInUse(_) => Recovery::FixRequest,
            KeyGateError::PlatformUnsupported
            | KeyGateError::PolicyUnsupported(_)
            | KeyGateError::Platform(_) => Recovery::None,
        }
    }
}

impl From<GateError> for KeyGateError {
    fn from(error: GateError) -> Self {
        match error {
            GateError::Busy(alias) => KeyGateError::Busy(alias),
            GateError::Canceled => KeyGateError::Canceled,
            GateError::Failed { remaining_attempts } => KeyGateError::Failed { remaining_attempts },
            GateError::CredentialRejected => KeyGateError::CredentialRejected,
            GateError::LockedOut { retry_after } => KeyGateError::LockedOut { retry_after },
            GateError::PermanentlyLockedOut => KeyGateError::PermanentlyLockedOut,
            GateError::NoAuthenticatableContext(reason) => {
                KeyGateError::NoAuthenticatableContext(reason)
            }
            GateError::Unsupported => KeyGateError::PlatformUnsupported,
            GateError::TimedOut => KeyGateError::TimedOut,
            GateError::Unauthorized(reason) => KeyGateError::Unauthorized(reason),
            GateError::Platform(reason) => KeyGateError::Platform(reason),
            GateError::Storage(error) => KeyGateError::Storage(error),
        }
    }
}

impl From<KeyStoreError> for KeyGateError {
    fn from(error: KeyStoreError) -> Self {
        match error {
            KeyStoreError::AliasInUse(alias) => KeyGateError::AliasInUse(alias),
            KeyStoreError::NotFound(alias) | KeyStoreError::Invalidated(alias) => {
                KeyGateError::KeyNotFound(alias)
            }
            KeyStoreError::Unauthorized(reason) => KeyGateError::Unauthorized(reason),
            KeyStoreError::PolicyUnsupported(reason) => KeyGateError::PolicyUnsupported(reason),
            KeyStoreError::Storage(error) => KeyGateError::Storage(error),
            KeyStoreError::Corrupt(reason) | KeyStoreError::Crypto(reason) => {
                KeyGateError::Platform(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_arguments_use_null_codes() {
        assert_eq!(KeyGateError::MissingArgument(Field::Key).code(), "KeyIsNull");
        assert_eq!(KeyGateError::MissingArgument(Field::Payload).code(), "PayloadIsNull");
        assert_eq!(
            KeyGateError::MissingArgument(Field::Signature).code(),
            "SignatureIsNull"
        );
        assert_eq!(KeyGateError::MissingArgument(Field::PublicKey).code(), "PkIsNull");
    }

    #[test]
    fn severity_is_classified() {
        assert_eq!(KeyGateError::Canceled.recovery(), Recovery::Retry);
        assert_eq!(
            KeyGateError::Failed { remaining_attempts: 2 }.recovery(),
            Recovery::Retry
        );
        assert_eq!(
            KeyGateError::LockedOut {
                retry_after: Duration::from_secs(3)
            }
            .recovery(),
            Recovery::RetryAfter(Duration::from_secs(3))
        );
        assert_eq!(KeyGateError::PermanentlyLockedOut.recovery(), Recovery::OutOfBand);
        assert_eq!(KeyGateError::Platform("boom".into()).recovery(), Recovery::None);
    }

    #[test]
    fn invalidated_keys_surface_as_not_found() {
        let alias = KeyAlias::new("user-42").unwrap();
        let error = KeyGateError::from(KeyStoreError::Invalidated(alias.clone()));
        assert!(matches!(error, KeyGateError::KeyNotFound(found) if found == alias));
    }

    #[test]
    fn rejected_device_credentials_carry_no_attempt_count() {
        let error = KeyGateError::from(GateError::CredentialRejected);
        assert!(matches!(error, KeyGateError::CredentialRejected));
        assert_eq!(error.code(), "Failed");
        assert_eq!(error.recovery(), Recovery::Retry);
    }

    #[test]
    fn unknown_failures_keep_their_text() {
        let error = KeyGateError::from(GateError::Platform("sensor offline".into()));
        assert_eq!(error.code(), "Error");
        assert!(error.to_string().contains("sensor offline"));
    }
}
