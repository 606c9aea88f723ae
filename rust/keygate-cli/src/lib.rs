//! The `keygate` command-line tool.
//!
//! Keys live in a directory (`--store`), prompts are answered on the
//! terminal, and the enrollment set is named by `--enrollment`.

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(not(target_arch = "wasm32"))]
pub mod console;
