//! Host application scripting bridge
//!
//! The host evaluates script source and answers with a string. Calls are
//! opaque and potentially slow; nothing here assumes they finish promptly.

mod bridge;
pub mod script;

pub use bridge::{BridgeError, HostBridge, ProcessBridge, UnavailableBridge, create_bridge};
pub use script::{ADD_MARKER, PROJECT_SUMMARY, extract_code_block, normalize_result, run_dynamic_call};

#[cfg(test)]
pub use bridge::mock;
