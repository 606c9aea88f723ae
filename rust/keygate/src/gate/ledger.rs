use std::time::Duration;

use keygate_common::time::unix_millis;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Lockout bookkeeping for one alias as it is persisted between processes.
///
/// Deadlines are stored as unix milliseconds and mapped back onto the
/// monotonic clock when the record is loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(super) struct Lockout {
    pub failures: u32,
    pub lockouts: u32,
    pub locked_until: Option<u64>,
    pub permanent: bool,
}

impl Lockout {
    /// Nothing worth remembering.
    pub fn is_clear(&self) -> bool {
        *self == Self::default()
    }

    /// The cool-down deadline on the monotonic clock, if it has not passed.
    pub fn deadline(&self) -> Option<Instant> {
        let remaining = self.locked_until?.checked_sub(unix_millis())?;
        (remaining > 0).then(|| Instant::now() + Duration::from_millis(remaining))
    }
}

/// The wall-clock equivalent of a monotonic `deadline`.
pub(super) fn wall_clock(deadline: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(Instant::now());
    unix_millis().saturating_add(u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX))
}
