//! Bridge layer for the Hyperliquid MCP adapter.
//!
//! Turns structured call arguments into the SDK bridge's command-line
//! vocabulary ([`flags`]) and runs the bridge as a subprocess ([`client`]).

pub mod client;
pub mod flags;

pub use client::ProcessBridge;
pub use flags::{build_invocation, flag_name, flag_value, to_flags, BridgeFields};
