use std::{
    collections::VecDeque,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};

use async_trait::async_trait;
use keygate_common::Fingerprint;
use parking_lot::Mutex;

use super::{AuthOutcome, AuthenticationRequest, BiometricPlatform};

/// A scriptable [`BiometricPlatform`] for tests, demos and headless hosts.
///
/// Outcomes queued with [`SimulatedPlatform::push_outcome`] are returned in
/// order; once the queue drains every prompt resolves with the default
/// outcome (initially [`AuthOutcome::Matched`]). Each prompt can be delayed
/// to emulate a user taking their time.
#[derive(Debug)]
pub struct SimulatedPlatform {
    script: Mutex<VecDeque<AuthOutcome>>,
    default_outcome: Mutex<AuthOutcome>,
    latency: Mutex<Duration>,
    enrollment: Mutex<Option<Fingerprint>>,
    prompts: AtomicUsize,
    history: Mutex<Vec<AuthenticationRequest>>,
}

impl Default for SimulatedPlatform {
    fn default() -> Self {
        Self::enrolled("default")
    }
}

impl SimulatedPlatform {
    /// A platform whose enrollment set is identified by `label`.
    pub fn enrolled(label: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_outcome: Mutex::new(AuthOutcome::Matched),
            latency: Mutex::new(Duration::ZERO),
            enrollment: Mutex::new(Some(Fingerprint::digest(label.as_bytes()))),
            prompts: AtomicUsize::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    /// A platform that cannot report its enrollment set.
    pub fn without_enrollment_reporting() -> Self {
        let platform = Self::default();
        *platform.enrollment.lock() = None;
        platform
    }

    /// Queue the outcome of the next unscripted prompt.
    pub fn push_outcome(&self, outcome: AuthOutcome) -> &Self {
        self.script.lock().push_back(outcome);
        self
    }

    /// Outcome used once the script is exhausted.
    pub fn set_default_outcome(&self, outcome: AuthOutcome) {
        *self.default_outcome.lock() = outcome;
    }

    /// How long each prompt stays open before resolving.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Replace the enrollment set, as if the user added or removed a
    /// biometric.
    pub fn enroll(&self, label: &str) {
        *self.enrollment.lock() = Some(Fingerprint::digest(label.as_bytes()));
    }

    /// Number of prompts shown so far.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    /// Every prompt shown so far, oldest first.
    pub fn history(&self) -> Vec<AuthenticationRequest> {
        self.history.lock().clone()
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl BiometricPlatform for SimulatedPlatform {
    async fn authenticate(&self, request: &AuthenticationRequest) -> AuthOutcome {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        self.history.lock().push(request.clone());

        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let scripted = self.script.lock().pop_front();
        scripted.unwrap_or_else(|| self.default_outcome.lock().clone())
    }

    fn enrollment(&self) -> Option<Fingerprint> {
        *self.enrollment.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AuthMethod, KeyAlias, PromptConfig};

    fn request() -> AuthenticationRequest {
        AuthenticationRequest {
            alias: KeyAlias::new("user-42").unwrap(),
            prompt: PromptConfig::titled("Unlock"),
            method: AuthMethod::Biometric,
        }
    }

    #[tokio::test]
    async fn it_plays_the_script_then_the_default() {
        let platform = SimulatedPlatform::default();
        platform
            .push_outcome(AuthOutcome::Canceled)
            .push_outcome(AuthOutcome::Mismatch);

        assert_eq!(platform.authenticate(&request()).await, AuthOutcome::Canceled);
        assert_eq!(platform.authenticate(&request()).await, AuthOutcome::Mismatch);
        assert_eq!(platform.authenticate(&request()).await, AuthOutcome::Matched);
        assert_eq!(platform.prompt_count(), 3);
        assert_eq!(platform.history()[0].prompt.title, "Unlock");
    }

    #[test]
    fn enrollment_changes_are_visible() {
        let platform = SimulatedPlatform::enrolled("thumb");
        let before = platform.enrollment();
        platform.enroll("thumb+index");
        assert_ne!(platform.enrollment(), before);
        assert_eq!(SimulatedPlatform::without_enrollment_reporting().enrollment(), None);
    }
}
