use async_trait::async_trait;
use keygate_common::Fingerprint;

use super::{AuthOutcome, AuthenticationRequest, BiometricPlatform};

/// The platform of last resort: no sensor, no enrollment data.
///
/// Every prompt resolves to [`AuthOutcome::Unsupported`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedPlatform;

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl BiometricPlatform for UnsupportedPlatform {
    async fn authenticate(&self, request: &AuthenticationRequest) -> AuthOutcome {
        tracing::debug!(alias = %request.alias, "Biometric prompt requested on an unsupported platform");
        AuthOutcome::Unsupported
    }

    fn enrollment(&self) -> Option<Fingerprint> {
        None
    }
}
