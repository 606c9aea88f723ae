#![warn(missing_docs)]

//! Storage backends for keygate.
//!
//! A [StorageBackend] is a small async key/value facade. The key store keeps
//! one sealed record per alias in it, and the change detector keeps one
//! enrollment baseline per alias. Two implementations ship here: an
//! in-memory backend for tests and ephemeral sessions, and a file-system
//! backend for persistent stores.

mod error;
pub use error::*;

mod backend;
pub use backend::*;
