//! Wall-clock timestamps for persisted records.
//!
//! Monotonic deadlines (lockouts, token expiry) use `tokio::time::Instant`
//! instead; these helpers only stamp records with when they were written.

use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(not(target_arch = "wasm32"))]
fn system_time() -> SystemTime {
    SystemTime::now()
}

#[cfg(target_arch = "wasm32")]
fn system_time() -> SystemTime {
    use web_time::web::SystemTimeExt;
    web_time::SystemTime::now().to_std()
}

/// Milliseconds since the unix epoch, saturating at zero for clocks set
/// before 1970.
pub fn unix_millis() -> u64 {
    system_time()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}
