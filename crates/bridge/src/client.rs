use async_trait::async_trait;
use hlmcp_core::*;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Longest stderr excerpt carried in an [`BridgeError::Exit`].
const STDERR_TAIL_BYTES: usize = 2048;

/// Longest stdout excerpt quoted in a parse error.
const STDOUT_EXCERPT_BYTES: usize = 200;

/// Runs the SDK bridge as a subprocess, one process per invocation.
///
/// Spawns `<program> <args...> <command> <flags...>` and decodes the JSON
/// value it prints. No pooling; concurrency is unbounded unless a cap is
/// configured.
pub struct ProcessBridge {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    permits: Option<Arc<Semaphore>>,
}

impl ProcessBridge {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
            permits: config
                .max_concurrent_calls
                .map(|limit| Arc::new(Semaphore::new(limit.max(1)))),
        }
    }

    #[cfg(test)]
    fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    async fn execute(&self, invocation: &BridgeInvocation) -> BridgeResult {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .args(invocation.to_args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd
            .spawn()
            .map_err(|e| BridgeError::Spawn(format!("{}: {}", self.program, e)))?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| BridgeError::Timeout(limit))??,
            None => child.wait_with_output().await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            return Err(BridgeError::Exit {
                status: output.status.to_string(),
                stderr: if stderr.is_empty() {
                    "no output on stderr".to_string()
                } else {
                    tail(stderr, STDERR_TAIL_BYTES).to_string()
                },
            });
        }

        parse_output(&output.stdout)
    }
}

#[async_trait]
impl BridgeExecutor for ProcessBridge {
    async fn run(&self, invocation: &BridgeInvocation) -> BridgeResult {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .clone()
                    .acquire_owned()
                    .await
                    .map_err(|_| BridgeError::Spawn("bridge limiter closed".to_string()))?,
            ),
            None => None,
        };

        let started = Instant::now();
        debug!(command = %invocation.command, program = %self.program, "Spawning bridge");

        let result = self.execute(invocation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => debug!(command = %invocation.command, elapsed_ms, "Bridge completed"),
            Err(e) => warn!(command = %invocation.command, elapsed_ms, "Bridge failed: {}", e),
        }
        result
    }
}

/// Decode the bridge's stdout.
///
/// The whole output is tried as one JSON value first; failing that, its
/// first non-empty line.
pub fn parse_output(stdout: &[u8]) -> BridgeResult {
    let text = String::from_utf8_lossy(stdout);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(BridgeError::Parse("bridge produced no output".to_string()));
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(whole_err) => {
            let first_line = trimmed
                .lines()
                .map(str::trim)
                .find(|line| !line.is_empty())
                .unwrap_or(trimmed);
            serde_json::from_str::<Value>(first_line).map_err(|_| {
                BridgeError::Parse(format!(
                    "{} (output: {})",
                    whole_err,
                    head(first_line, STDOUT_EXCERPT_BYTES)
                ))
            })
        }
    }
}

/// Leading slice of at most `max_len` bytes, on a char boundary.
fn head(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut end = max_len;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Trailing slice of at most `max_len` bytes, on a char boundary.
fn tail(s: &str, max_len: usize) -> &str {
    if s.len() <= max_len {
        return s;
    }
    let mut start = s.len() - max_len;
    while start < s.len() && !s.is_char_boundary(start) {
        start += 1;
    }
    &s[start..]
}
