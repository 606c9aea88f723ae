//! The seam between keygate and the device's authenticator.
//!
//! A [`BiometricPlatform`] shows a prompt and reports what the user did. It
//! also exposes a fingerprint of the current biometric enrollment set so that
//! keys and baselines can be bound to it. Platforms that cannot report
//! enrollment return `None`, which downstream surfaces as an "unsupported"
//! change status.

use async_trait::async_trait;
use keygate_common::{ConditionalSync, Fingerprint};

use crate::{alias::KeyAlias, prompt::PromptConfig};

mod simulated;
pub use simulated::*;

mod unsupported;
pub use unsupported::*;

/// Which credential a prompt asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMethod {
    /// An enrolled biometric.
    Biometric,
    /// The device passcode, PIN or pattern.
    DeviceCredential,
}

/// Everything a platform needs to show a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    /// The key the prompt unlocks.
    pub alias: KeyAlias,
    /// Prompt text.
    pub prompt: PromptConfig,
    /// Requested credential.
    pub method: AuthMethod,
}

/// What happened to a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The user authenticated.
    Matched,
    /// The user dismissed the prompt.
    Canceled,
    /// The presented credential did not match.
    Mismatch,
    /// The platform itself locked the sensor out for a while.
    LockedOut,
    /// The platform disabled biometrics until a device credential is used.
    PermanentlyLockedOut,
    /// There is nothing to authenticate with.
    Unavailable(String),
    /// This platform has no biometric support at all.
    Unsupported,
    /// Anything else.
    Error(String),
}

/// A device authenticator.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait BiometricPlatform: ConditionalSync {
    /// Show a prompt and wait for the user.
    ///
    /// Dropping the returned future dismisses the prompt.
    async fn authenticate(&self, request: &AuthenticationRequest) -> AuthOutcome;

    /// Fingerprint of the current biometric enrollment set, or `None` when
    /// the platform cannot report it.
    fn enrollment(&self) -> Option<Fingerprint>;
}
