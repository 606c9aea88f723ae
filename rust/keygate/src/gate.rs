//! The biometric gate.
//!
//! Every private-key operation passes through here first. The gate keeps a
//! small state machine per alias:
//!
//! ```text
//! Idle -> Prompting -> Authorized | Canceled | Failed | LockedOut | PermanentlyLockedOut
//! ```
//!
//! A successful prompt yields an [`AuthorizationToken`] that can be redeemed
//! once for an [`Authorization`]. Consecutive mismatches lock the alias out
//! for a cool-down, and repeated lockouts escalate to a permanent lockout
//! that only a device credential clears.
//!
//! Failure counts and lockouts are written through to a [`StorageBackend`],
//! so they outlive the process that recorded them. Prompt phases and tokens
//! stay in memory.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use keygate_storage::{KeyGateStorageError, StorageBackend};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

use crate::{
    alias::KeyAlias,
    config::GateConfig,
    platform::{AuthMethod, AuthOutcome, AuthenticationRequest, BiometricPlatform},
    prompt::PromptConfig,
};

mod ledger;
use ledger::Lockout;

mod token;
pub use token::*;

/// Errors produced by the [`BiometricGate`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// A prompt for this alias is already open.
    #[error("a prompt for '{0}' is already in progress")]
    Busy(KeyAlias),
    /// The user dismissed the prompt.
    #[error("canceled")]
    Canceled,
    /// The biometric did not match.
    #[error("authentication failed, {remaining_attempts} attempt(s) left")]
    Failed {
        /// Mismatches left before a lockout.
        remaining_attempts: u32,
    },
    /// The device credential did not match. Lockouts stay in place.
    #[error("device credential rejected")]
    CredentialRejected,
    /// The alias is cooling down after too many failures.
    #[error("locked out for {retry_after:?}")]
    LockedOut {
        /// Time left in the cool-down.
        retry_after: Duration,
    },
    /// Only a device credential can unlock the alias again.
    #[error("permanently locked out")]
    PermanentlyLockedOut,
    /// There is nothing to authenticate with.
    #[error("no authenticatable context: {0}")]
    NoAuthenticatableContext(String),
    /// The platform has no biometric support.
    #[error("biometrics unsupported")]
    Unsupported,
    /// The prompt was not answered in time.
    #[error("timed out")]
    TimedOut,
    /// A token could not be redeemed.
    #[error("{0}")]
    Unauthorized(String),
    /// Any other platform failure.
    #[error("{0}")]
    Platform(String),
    /// Lockout state could not be read or written.
    #[error(transparent)]
    Storage(#[from] KeyGateStorageError),
}

/// The externally observable state of one alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    /// Nothing is happening.
    Idle,
    /// A prompt is on screen.
    Prompting,
    /// A token was issued and has not been redeemed or expired yet.
    Authorized,
    /// The last prompt was dismissed.
    Canceled,
    /// The last prompt saw a mismatch.
    Failed,
    /// Cooling down.
    LockedOut {
        /// Time left in the cool-down.
        retry_after: Duration,
    },
    /// Waiting for a device credential.
    PermanentlyLockedOut,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Idle,
    Prompting,
    Authorized,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct Grant {
    nonce: u64,
    expires_at: Instant,
}

type Counters = (u32, u32, Option<Instant>, bool);

#[derive(Debug, Default)]
struct Entry {
    phase: Phase,
    failures: u32,
    lockouts: u32,
    locked_until: Option<Instant>,
    permanent: bool,
    grant: Option<Grant>,
}

impl Entry {
    fn restore(lockout: Lockout) -> Self {
        Self {
            failures: lockout.failures,
            lockouts: lockout.lockouts,
            locked_until: lockout.deadline(),
            permanent: lockout.permanent,
            ..Self::default()
        }
    }

    fn counters(&self) -> Counters {
        (self.failures, self.lockouts, self.locked_until, self.permanent)
    }

    fn lockout(&self) -> Lockout {
        Lockout {
            failures: self.failures,
            lockouts: self.lockouts,
            locked_until: self
                .locked_until
                .filter(|until| *until > Instant::now())
                .map(ledger::wall_clock),
            permanent: self.permanent,
        }
    }

    /// Whether the entry holds nothing a fresh one would not.
    fn is_settled(&self) -> bool {
        self.phase == Phase::Idle && self.grant.is_none() && self.counters() == Counters::default()
    }
}

type Entries = Mutex<HashMap<KeyAlias, Entry>>;

/// Resets an alias from `Prompting` to `Idle` if the prompt future is dropped
/// before an outcome was recorded.
struct PromptGuard<'a> {
    entries: &'a Entries,
    alias: &'a KeyAlias,
    armed: bool,
}

impl PromptGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for PromptGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut entries = self.entries.lock();
        if let Some(entry) = entries.get_mut(self.alias)
            && entry.phase == Phase::Prompting
        {
            tracing::debug!(alias = %self.alias, "Prompt abandoned");
            entry.phase = Phase::Idle;
        }
    }
}

fn nonce_seed() -> u64 {
    let mut seed = [0u8; 8];
    match getrandom::getrandom(&mut seed) {
        Ok(()) => u64::from_le_bytes(seed),
        Err(error) => {
            tracing::warn!(%error, "No randomness for token nonces; seeding from the clock");
            keygate_common::time::unix_millis()
        }
    }
}

/// Per-alias authentication state machine in front of a [`BiometricPlatform`].
///
/// Lockout state is kept in `ledger`. A gate caches what it loaded, so one
/// ledger should back at most one gate per process.
pub struct BiometricGate<P, B> {
    platform: Arc<P>,
    config: GateConfig,
    ledger: B,
    entries: Entries,
    nonces: AtomicU64,
}

impl<P, B> BiometricGate<P, B>
where
    P: BiometricPlatform,
    B: StorageBackend<Key = String, Value = Vec<u8>>,
{
    /// Create a gate that prompts through `platform` and keeps lockouts in
    /// `ledger`.
    pub fn new(platform: Arc<P>, config: GateConfig, ledger: B) -> Self {
        Self {
            platform,
            config,
            ledger,
            entries: Mutex::new(HashMap::new()),
            nonces: AtomicU64::new(nonce_seed()),
        }
    }

    /// The limits this gate enforces.
    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Prompt for a biometric and, on a match, issue a single-use token for
    /// `alias`.
    ///
    /// Requests made while the alias is locked out are rejected without
    /// showing a prompt. Dropping the returned future dismisses the prompt
    /// and returns the alias to `Idle`.
    pub async fn authorize(
        &self,
        alias: &KeyAlias,
        prompt: &PromptConfig,
    ) -> Result<AuthorizationToken, GateError> {
        match self.run_prompt(alias, prompt, AuthMethod::Biometric).await? {
            Some(token) => Ok(token),
            None => Err(GateError::Platform("no token issued".into())),
        }
    }

    /// Prompt for the device credential and, on a match, clear every lockout
    /// recorded for `alias`.
    pub async fn recover_with_device_credential(
        &self,
        alias: &KeyAlias,
        prompt: &PromptConfig,
    ) -> Result<(), GateError> {
        self.run_prompt(alias, prompt, AuthMethod::DeviceCredential)
            .await
            .map(|_| ())
    }

    /// Consume `token` and check it against the outstanding grant for
    /// `alias`.
    ///
    /// A token is rejected when it was issued for another alias or by
    /// another gate, when a newer token superseded it, or when it expired.
    pub fn redeem(
        &self,
        token: AuthorizationToken,
        alias: &KeyAlias,
    ) -> Result<Authorization, GateError> {
        let mut entries = self.entries.lock();

        if token.alias != *alias {
            return Err(GateError::Unauthorized(format!(
                "token was issued for '{}', not '{}'",
                token.alias, alias
            )));
        }

        let Some(entry) = entries.get_mut(alias) else {
            return Err(GateError::Unauthorized("no outstanding authorization".into()));
        };

        let Some(grant) = entry.grant.take() else {
            return Err(GateError::Unauthorized("no outstanding authorization".into()));
        };

        if grant.nonce != token.nonce {
            entry.grant = Some(grant);
            return Err(GateError::Unauthorized(
                "token was superseded by a newer authorization".into(),
            ));
        }

        if entry.phase == Phase::Authorized {
            entry.phase = Phase::Idle;
        }
        if entry.is_settled() {
            entries.remove(alias);
        }

        if Instant::now() >= grant.expires_at {
            tracing::debug!(%alias, "Rejected expired authorization");
            return Err(GateError::Unauthorized("token expired".into()));
        }

        Ok(Authorization::new(alias.clone()))
    }

    /// The current state of `alias`.
    pub async fn state(&self, alias: &KeyAlias) -> Result<GateState, GateError> {
        self.hydrate(alias).await?;

        let entries = self.entries.lock();
        let Some(entry) = entries.get(alias) else {
            return Ok(GateState::Idle);
        };

        if entry.permanent {
            return Ok(GateState::PermanentlyLockedOut);
        }

        let now = Instant::now();
        if let Some(until) = entry.locked_until
            && until > now
        {
            return Ok(GateState::LockedOut {
                retry_after: until - now,
            });
        }

        Ok(match entry.phase {
            Phase::Idle => GateState::Idle,
            Phase::Prompting => GateState::Prompting,
            Phase::Authorized => match entry.grant {
                Some(grant) if grant.expires_at > now => GateState::Authorized,
                _ => GateState::Idle,
            },
            Phase::Canceled => GateState::Canceled,
            Phase::Failed => GateState::Failed,
        })
    }

    /// Drop everything recorded for `alias` except lockouts.
    pub fn forget(&self, alias: &KeyAlias) {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(alias) else {
            return;
        };
        if entry.phase == Phase::Prompting {
            entry.grant = None;
            return;
        }
        if entry.counters() == Counters::default() {
            entries.remove(alias);
        } else {
            entry.grant = None;
            entry.phase = Phase::Idle;
        }
    }

    async fn run_prompt(
        &self,
        alias: &KeyAlias,
        prompt: &PromptConfig,
        method: AuthMethod,
    ) -> Result<Option<AuthorizationToken>, GateError> {
        self.hydrate(alias).await?;
        let before = self.admit(alias, method)?;

        let mut guard = PromptGuard {
            entries: &self.entries,
            alias,
            armed: true,
        };

        let request = AuthenticationRequest {
            alias: alias.clone(),
            prompt: prompt.clone(),
            method,
        };

        tracing::debug!(%alias, ?method, "Prompting");
        let outcome =
            tokio::time::timeout(self.config.prompt_timeout(), self.platform.authenticate(&request))
                .await;
        guard.disarm();

        let (result, changed) = {
            let mut entries = self.entries.lock();
            let entry = entries.entry(alias.clone()).or_default();
            let result = match outcome {
                Ok(outcome) => self.settle(alias, entry, method, outcome),
                Err(_) => {
                    tracing::info!(%alias, "Prompt timed out");
                    entry.phase = Phase::Idle;
                    Err(GateError::TimedOut)
                }
            };
            let changed = (entry.counters() != before).then(|| entry.lockout());
            if entry.is_settled() {
                entries.remove(alias);
            }
            (result, changed)
        };

        if let Some(lockout) = changed {
            self.persist(alias, lockout).await?;
        }
        result
    }

    fn settle(
        &self,
        alias: &KeyAlias,
        entry: &mut Entry,
        method: AuthMethod,
        outcome: AuthOutcome,
    ) -> Result<Option<AuthorizationToken>, GateError> {
        match outcome {
            AuthOutcome::Matched => {
                entry.failures = 0;
                entry.lockouts = 0;
                entry.locked_until = None;
                match method {
                    AuthMethod::Biometric => {
                        let token = self.issue(alias, entry);
                        tracing::debug!(%alias, "Authorized");
                        Ok(Some(token))
                    }
                    AuthMethod::DeviceCredential => {
                        entry.permanent = false;
                        entry.phase = Phase::Idle;
                        tracing::info!(%alias, "Lockouts cleared by device credential");
                        Ok(None)
                    }
                }
            }
            AuthOutcome::Canceled => {
                tracing::debug!(%alias, "Prompt canceled");
                entry.phase = Phase::Canceled;
                Err(GateError::Canceled)
            }
            AuthOutcome::Mismatch => match method {
                AuthMethod::Biometric => self.record_failure(alias, entry),
                AuthMethod::DeviceCredential => {
                    tracing::debug!(%alias, "Device credential rejected");
                    entry.phase = Phase::Failed;
                    Err(GateError::CredentialRejected)
                }
            },
            AuthOutcome::LockedOut => self.lock_out(alias, entry),
            AuthOutcome::PermanentlyLockedOut => {
                tracing::warn!(%alias, "Platform reported a permanent lockout");
                entry.phase = Phase::Idle;
                entry.permanent = true;
                entry.locked_until = None;
                Err(GateError::PermanentlyLockedOut)
            }
            AuthOutcome::Unavailable(reason) => {
                entry.phase = Phase::Idle;
                Err(GateError::NoAuthenticatableContext(reason))
            }
            AuthOutcome::Unsupported => {
                entry.phase = Phase::Idle;
                Err(GateError::Unsupported)
            }
            AuthOutcome::Error(reason) => {
                tracing::warn!(%alias, %reason, "Platform authentication error");
                entry.phase = Phase::Idle;
                Err(GateError::Platform(reason))
            }
        }
    }

    /// Load the persisted lockout of `alias` unless it is already cached.
    async fn hydrate(&self, alias: &KeyAlias) -> Result<(), GateError> {
        let cached = self.entries.lock().contains_key(alias);
        if cached {
            return Ok(());
        }

        let Some(bytes) = self
            .ledger
            .get(&alias.storage_key())
            .await
            .map_err(|error| GateError::Storage(error.into()))?
        else {
            return Ok(());
        };

        let lockout: Lockout = serde_json::from_slice(&bytes)
            .map_err(|error| GateError::Platform(format!("unreadable lockout record: {error}")))?;
        if lockout.is_clear() {
            return Ok(());
        }

        tracing::debug!(%alias, ?lockout, "Restored lockout state");
        self.entries
            .lock()
            .entry(alias.clone())
            .or_insert_with(|| Entry::restore(lockout));
        Ok(())
    }

    async fn persist(&self, alias: &KeyAlias, lockout: Lockout) -> Result<(), GateError> {
        let mut ledger = self.ledger.clone();
        let key = alias.storage_key();

        let written = if lockout.is_clear() {
            ledger.delete(&key).await.map(|_| ())
        } else {
            let bytes = serde_json::to_vec(&lockout)
                .map_err(|error| GateError::Platform(error.to_string()))?;
            ledger.set(key, bytes).await
        };

        written.map_err(|error| {
            let error: KeyGateStorageError = error.into();
            tracing::warn!(%alias, %error, "Failed to persist lockout state");
            GateError::Storage(error)
        })
    }

    /// Admit a prompt for `alias` and return its counters as they were
    /// before admission.
    fn admit(&self, alias: &KeyAlias, method: AuthMethod) -> Result<Counters, GateError> {
        let mut entries = self.entries.lock();
        let entry = entries.entry(alias.clone()).or_default();
        let before = entry.counters();

        if entry.phase == Phase::Prompting {
            return Err(GateError::Busy(alias.clone()));
        }

        if method == AuthMethod::Biometric {
            if entry.permanent {
                return Err(GateError::PermanentlyLockedOut);
            }
            if let Some(until) = entry.locked_until {
                let now = Instant::now();
                if until > now {
                    return Err(GateError::LockedOut {
                        retry_after: until - now,
                    });
                }
                entry.locked_until = None;
                entry.failures = 0;
            }
        }

        entry.phase = Phase::Prompting;
        Ok(before)
    }

    fn issue(&self, alias: &KeyAlias, entry: &mut Entry) -> AuthorizationToken {
        let nonce = self.nonces.fetch_add(1, Ordering::Relaxed);
        let expires_at = Instant::now() + self.config.token_ttl();
        entry.grant = Some(Grant { nonce, expires_at });
        entry.phase = Phase::Authorized;
        AuthorizationToken {
            alias: alias.clone(),
            nonce,
            expires_at,
        }
    }

    fn remaining_attempts(&self, entry: &Entry) -> u32 {
        self.config
            .max_failed_attempts
            .saturating_sub(entry.failures)
    }

    fn record_failure(
        &self,
        alias: &KeyAlias,
        entry: &mut Entry,
    ) -> Result<Option<AuthorizationToken>, GateError> {
        entry.failures += 1;
        if entry.failures >= self.config.max_failed_attempts {
            return self.lock_out(alias, entry);
        }
        entry.phase = Phase::Failed;
        let remaining_attempts = self.remaining_attempts(entry);
        tracing::debug!(%alias, remaining_attempts, "Authentication failed");
        Err(GateError::Failed { remaining_attempts })
    }

    fn lock_out(
        &self,
        alias: &KeyAlias,
        entry: &mut Entry,
    ) -> Result<Option<AuthorizationToken>, GateError> {
        entry.phase = Phase::Idle;
        entry.failures = 0;

        if entry.lockouts >= self.config.max_lockouts {
            tracing::warn!(%alias, "Escalated to permanent lockout");
            entry.permanent = true;
            entry.locked_until = None;
            return Err(GateError::PermanentlyLockedOut);
        }

        entry.lockouts += 1;
        let retry_after = self.config.lockout_cooldown();
        entry.locked_until = Some(Instant::now() + retry_after);
        tracing::warn!(%alias, lockouts = entry.lockouts, ?retry_after, "Locked out");
        Err(GateError::LockedOut { retry_after })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{manager::MemoryBackend, platform::SimulatedPlatform};

    fn alias(name: &str) -> KeyAlias {
        KeyAlias::new(name).unwrap()
    }

    type Gate = BiometricGate<SimulatedPlatform, MemoryBackend>;

    fn gate(platform: &Arc<SimulatedPlatform>) -> Gate {
        BiometricGate::new(platform.clone(), GateConfig::default(), MemoryBackend::default())
    }

    #[tokio::test(start_paused = true)]
    async fn it_issues_a_token_that_redeems_once() {
        let platform = Arc::new(SimulatedPlatform::default());
        let gate = gate(&platform);
        let user = alias("user-42");

        let token = gate.authorize(&user, &PromptConfig::default()).await.unwrap();
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Authorized);

        let authorization = gate.redeem(token, &user).unwrap();
        assert_eq!(authorization.alias(), &user);
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn it_rejects_superseded_tokens() {
        let platform = Arc::new(SimulatedPlatform::default());
        let gate = gate(&platform);
        let user = alias("user-42");

        let first = gate.authorize(&user, &PromptConfig::default()).await.unwrap();
        let second = gate.authorize(&user, &PromptConfig::default()).await.unwrap();

        assert!(matches!(
            gate.redeem(first, &user),
            Err(GateError::Unauthorized(_))
        ));
        assert!(gate.redeem(second, &user).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn it_rejects_expired_tokens() {
        let platform = Arc::new(SimulatedPlatform::default());
        let gate = gate(&platform);
        let user = alias("user-42");

        let token = gate.authorize(&user, &PromptConfig::default()).await.unwrap();
        tokio::time::advance(gate.config().token_ttl() + Duration::from_millis(1)).await;

        assert!(token.is_expired());
        assert!(matches!(
            gate.redeem(token, &user),
            Err(GateError::Unauthorized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn it_rejects_tokens_for_another_alias() {
        let platform = Arc::new(SimulatedPlatform::default());
        let gate = gate(&platform);

        let token = gate
            .authorize(&alias("user-42"), &PromptConfig::default())
            .await
            .unwrap();
        assert!(matches!(
            gate.redeem(token, &alias("user-7")),
            Err(GateError::Unauthorized(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn it_locks_out_after_consecutive_failures() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.set_default_outcome(AuthOutcome::Mismatch);
        let gate = gate(&platform);
        let user = alias("user-7");

        for remaining in (1..5).rev() {
            assert_eq!(
                gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
                GateError::Failed {
                    remaining_attempts: remaining
                }
            );
        }
        assert!(matches!(
            gate.authorize(&user, &PromptConfig::default()).await,
            Err(GateError::LockedOut { .. })
        ));
        assert_eq!(platform.prompt_count(), 5);

        assert!(matches!(
            gate.authorize(&user, &PromptConfig::default()).await,
            Err(GateError::LockedOut { .. })
        ));
        assert_eq!(platform.prompt_count(), 5);

        tokio::time::advance(gate.config().lockout_cooldown()).await;
        platform.set_default_outcome(AuthOutcome::Matched);
        assert!(gate.authorize(&user, &PromptConfig::default()).await.is_ok());
        assert_eq!(platform.prompt_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn a_success_resets_the_failure_count() {
        let platform = Arc::new(SimulatedPlatform::default());
        let gate = gate(&platform);
        let user = alias("user-7");

        for _ in 0..4 {
            platform.push_outcome(AuthOutcome::Mismatch);
        }
        for _ in 0..4 {
            let _ = gate.authorize(&user, &PromptConfig::default()).await;
        }
        assert!(gate.authorize(&user, &PromptConfig::default()).await.is_ok());

        platform.push_outcome(AuthOutcome::Mismatch);
        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::Failed {
                remaining_attempts: 4
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn it_escalates_to_a_permanent_lockout() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.set_default_outcome(AuthOutcome::Mismatch);
        let config = GateConfig {
            max_failed_attempts: 1,
            max_lockouts: 2,
            ..GateConfig::default()
        };
        let gate = BiometricGate::new(platform.clone(), config, MemoryBackend::default());
        let user = alias("user-7");

        for _ in 0..2 {
            assert!(matches!(
                gate.authorize(&user, &PromptConfig::default()).await,
                Err(GateError::LockedOut { .. })
            ));
            tokio::time::advance(config.lockout_cooldown()).await;
        }
        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::PermanentlyLockedOut
        );
        assert_eq!(gate.state(&user).await.unwrap(), GateState::PermanentlyLockedOut);

        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::PermanentlyLockedOut
        );

        platform.set_default_outcome(AuthOutcome::Matched);
        gate.recover_with_device_credential(&user, &PromptConfig::default())
            .await
            .unwrap();
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Idle);
        assert!(gate.authorize(&user, &PromptConfig::default()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn it_honors_platform_lockouts() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform
            .push_outcome(AuthOutcome::LockedOut)
            .push_outcome(AuthOutcome::PermanentlyLockedOut);
        let gate = gate(&platform);

        assert!(matches!(
            gate.authorize(&alias("a"), &PromptConfig::default()).await,
            Err(GateError::LockedOut { .. })
        ));
        assert_eq!(
            gate.authorize(&alias("b"), &PromptConfig::default())
                .await
                .unwrap_err(),
            GateError::PermanentlyLockedOut
        );
    }

    #[tokio::test(start_paused = true)]
    async fn it_allows_a_retry_after_cancel() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.push_outcome(AuthOutcome::Canceled);
        let gate = gate(&platform);
        let user = alias("user-42");

        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::Canceled
        );
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Canceled);
        assert!(gate.authorize(&user, &PromptConfig::default()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn it_reports_busy_while_prompting() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.set_latency(Duration::from_secs(1));
        let gate = Arc::new(gate(&platform));
        let user = alias("user-42");

        let first = {
            let gate = gate.clone();
            let user = user.clone();
            tokio::spawn(async move { gate.authorize(&user, &PromptConfig::default()).await })
        };
        tokio::task::yield_now().await;
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Prompting);

        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::Busy(user.clone())
        );
        assert!(
            gate.authorize(&alias("user-7"), &PromptConfig::default())
                .await
                .is_ok()
        );

        assert!(first.await.unwrap().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_a_prompt_returns_to_idle() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.set_latency(Duration::from_secs(1));
        let gate = gate(&platform);
        let user = alias("user-42");

        let abandoned = tokio::time::timeout(
            Duration::from_millis(10),
            gate.authorize(&user, &PromptConfig::default()),
        )
        .await;
        assert!(abandoned.is_err());
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn it_times_out_unanswered_prompts() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.set_latency(Duration::from_secs(3600));
        let gate = gate(&platform);
        let user = alias("user-42");

        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::TimedOut
        );
        assert_eq!(gate.state(&user).await.unwrap(), GateState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn a_rejected_device_credential_keeps_the_lockout() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.push_outcome(AuthOutcome::PermanentlyLockedOut);
        let gate = gate(&platform);
        let user = alias("user-7");

        assert_eq!(
            gate.authorize(&user, &PromptConfig::default()).await.unwrap_err(),
            GateError::PermanentlyLockedOut
        );

        platform.push_outcome(AuthOutcome::Mismatch);
        assert_eq!(
            gate.recover_with_device_credential(&user, &PromptConfig::default())
                .await
                .unwrap_err(),
            GateError::CredentialRejected
        );
        assert_eq!(gate.state(&user).await.unwrap(), GateState::PermanentlyLockedOut);
    }

    #[tokio::test]
    async fn lockouts_outlive_the_gate_that_recorded_them() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.set_default_outcome(AuthOutcome::Mismatch);
        let ledger = MemoryBackend::default();
        let user = alias("user-7");

        let first = BiometricGate::new(platform.clone(), GateConfig::default(), ledger.clone());
        for _ in 0..5 {
            let _ = first.authorize(&user, &PromptConfig::default()).await;
        }
        assert!(matches!(
            first.state(&user).await.unwrap(),
            GateState::LockedOut { .. }
        ));
        drop(first);

        let second = BiometricGate::new(platform.clone(), GateConfig::default(), ledger.clone());
        assert!(matches!(
            second.state(&user).await.unwrap(),
            GateState::LockedOut { .. }
        ));
        assert!(matches!(
            second.authorize(&user, &PromptConfig::default()).await,
            Err(GateError::LockedOut { .. })
        ));
        assert_eq!(platform.prompt_count(), 5);
    }

    #[tokio::test]
    async fn recovery_clears_the_persisted_lockout() {
        let platform = Arc::new(SimulatedPlatform::default());
        platform.push_outcome(AuthOutcome::PermanentlyLockedOut);
        let ledger = MemoryBackend::default();
        let user = alias("user-7");

        let first = BiometricGate::new(platform.clone(), GateConfig::default(), ledger.clone());
        let _ = first.authorize(&user, &PromptConfig::default()).await;
        assert_eq!(ledger.len().await, 1);

        first
            .recover_with_device_credential(&user, &PromptConfig::default())
            .await
            .unwrap();
        assert!(ledger.is_empty().await);

        let second = BiometricGate::new(platform.clone(), GateConfig::default(), ledger);
        assert_eq!(second.state(&user).await.unwrap(), GateState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn settled_aliases_are_not_retained() {
        let platform = Arc::new(SimulatedPlatform::default());
        let gate = gate(&platform);

        for n in 0..16 {
            let user = alias(&format!("user-{n}"));
            let token = gate.authorize(&user, &PromptConfig::default()).await.unwrap();
            gate.redeem(token, &user).unwrap();
        }
        assert!(gate.entries.lock().is_empty());

        let user = alias("user-42");
        let _token = gate.authorize(&user, &PromptConfig::default()).await.unwrap();
        gate.forget(&user);
        assert!(gate.entries.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn tokens_only_redeem_at_the_issuing_gate() {
        let platform = Arc::new(SimulatedPlatform::default());
        let issuer = gate(&platform);
        let other = gate(&platform);
        let user = alias("user-42");

        let token = issuer.authorize(&user, &PromptConfig::default()).await.unwrap();
        let _outstanding = other.authorize(&user, &PromptConfig::default()).await.unwrap();

        assert!(matches!(
            other.redeem(token, &user),
            Err(GateError::Unauthorized(_))
        ));
    }
}
