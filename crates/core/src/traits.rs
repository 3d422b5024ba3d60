use crate::models::*;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Bridge Executor Trait
// ---------------------------------------------------------------------------

/// Errors that can occur while running the bridge subprocess.
///
/// Business failures reported by the bridge itself (`{"error": ...}` on
/// stdout) are not errors at this level; they arrive as a successful value.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Failed to start bridge process: {0}")]
    Spawn(String),
    #[error("Bridge process failed ({status}): {stderr}")]
    Exit { status: String, stderr: String },
    #[error("Bridge returned invalid JSON: {0}")]
    Parse(String),
    #[error("Bridge process timed out after {0:?}")]
    Timeout(Duration),
    #[error("Bridge I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of one bridge call: the decoded stdout payload or a failure.
pub type BridgeResult = Result<Value, BridgeError>;

/// Runs one bridge invocation to completion.
///
/// The production implementation spawns a subprocess; tests substitute an
/// in-memory double.
#[async_trait]
pub trait BridgeExecutor: Send + Sync {
    async fn run(&self, invocation: &BridgeInvocation) -> BridgeResult;
}
