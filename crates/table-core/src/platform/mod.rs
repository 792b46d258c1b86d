//! Platform abstraction layer.
//!
//! All `#[cfg]` blocks for OS-specific behavior live here rather than being
//! scattered through the orchestration code.

pub mod process;

pub use process::{is_process_alive, kill_process_group};
