use std::fmt;

use tokio::time::Instant;

use crate::alias::KeyAlias;

/// Proof that the user just authenticated for one alias.
///
/// A token is issued by [`super::BiometricGate::authorize`] and can be
/// redeemed exactly once, before it expires, through
/// [`super::BiometricGate::redeem`]. It is deliberately neither `Clone` nor
/// serializable: there is no way to hold on to an authentication beyond the
/// single operation it was granted for.
#[must_use = "an unredeemed token authorizes nothing"]
pub struct AuthorizationToken {
    pub(super) alias: KeyAlias,
    pub(super) nonce: u64,
    pub(super) expires_at: Instant,
}

impl AuthorizationToken {
    /// The alias this token was issued for.
    pub fn alias(&self) -> &KeyAlias {
        &self.alias
    }

    /// Whether the token can no longer be redeemed because its time is up.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

impl fmt::Debug for AuthorizationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationToken")
            .field("alias", &self.alias)
            .field("expired", &self.is_expired())
            .finish_non_exhaustive()
    }
}

/// A redeemed [`AuthorizationToken`].
///
/// Only the gate can mint one, and key stores require one for every
/// private-key operation.
#[derive(Debug)]
pub struct Authorization {
    alias: KeyAlias,
}

impl Authorization {
    pub(crate) fn new(alias: KeyAlias) -> Self {
        Self { alias }
    }

    /// The alias the user authenticated for.
    pub fn alias(&self) -> &KeyAlias {
        &self.alias
    }
}
