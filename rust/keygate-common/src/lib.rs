#![warn(missing_docs)]

//! Small helpers shared by the keygate crates: digests for fingerprinting
//! keys and enrollment sets, a per-key async lock, target-dependent `Send`
//! bounds and record timestamps.

mod sync;
pub use sync::*;

mod fingerprint;
pub use fingerprint::*;

pub mod time;
