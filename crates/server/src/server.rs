//! Stdio MCP front-end.
//!
//! Reads newline-delimited JSON-RPC from the host and answers each request
//! on its own task, so a slow bridge call never blocks the ones behind it.
//!
//! ```text
//! host ──stdin──▶ McpServer::serve ──spawn──▶ handle_request
//!                                              ├── ResourceCatalog::read ─┐
//!                                              └── ToolDispatcher::call ──┴─▶ BridgeExecutor
//! host ◀─stdout── shared writer ◀──────────────────── one line per response
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::protocol::*;
use crate::resources::ResourceError;
use crate::state::AppState;
use crate::tools::ToolError;
use hlmcp_core::JSON_MIME_TYPE;

/// Default time in-flight requests get to finish once input stops.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Lifecycle of the host channel. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unconnected,
    Connected,
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Channel already {0:?}; a server serves one channel once")]
    AlreadyStarted(ChannelState),
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),
}

type SharedWriter<W> = Arc<Mutex<BufWriter<W>>>;

pub struct McpServer {
    state: Arc<AppState>,
    channel: watch::Sender<ChannelState>,
    shutdown_grace: Duration,
}

impl McpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        let (channel, _) = watch::channel(ChannelState::Unconnected);
        Self {
            state,
            channel,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Watch channel state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ChannelState> {
        self.channel.subscribe()
    }

    pub fn channel_state(&self) -> ChannelState {
        *self.channel.borrow()
    }

    /// Serve one channel until EOF, a read error, or `shutdown` completes.
    ///
    /// In-flight requests then get the grace period to write their
    /// responses; whatever is still running after that is aborted.
    pub async fn serve<R, W, F>(&self, reader: R, writer: W, shutdown: F) -> Result<(), ServerError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
        F: Future<Output = ()>,
    {
        let current = self.channel_state();
        if current != ChannelState::Unconnected {
            return Err(ServerError::AlreadyStarted(current));
        }
        self.channel.send_replace(ChannelState::Connected);
        info!("MCP channel connected");

        let writer: SharedWriter<W> = Arc::new(Mutex::new(BufWriter::new(writer)));
        let mut lines = BufReader::new(reader).lines();
        let mut tasks: JoinSet<()> = JoinSet::new();
        tokio::pin!(shutdown);

        let result = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, no longer reading from host");
                    break Ok(());
                }
                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!("Request handler panicked: {}", e);
                        }
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let trimmed = line.trim();
                        if trimmed.is_empty() {
                            continue;
                        }
                        self.dispatch_line(trimmed, &writer, &mut tasks).await;
                    }
                    Ok(None) => {
                        info!("Host closed the channel (EOF)");
                        break Ok(());
                    }
                    Err(e) => {
                        error!("Failed to read from host: {}", e);
                        break Err(ServerError::Io(e));
                    }
                }
            }
        };

        self.drain(&mut tasks).await;
        if let Err(e) = writer.lock().await.flush().await {
            warn!("Failed to flush output: {}", e);
        }

        self.channel.send_replace(ChannelState::Closed);
        info!("MCP channel closed");
        result
    }

    async fn dispatch_line<W>(&self, line: &str, writer: &SharedWriter<W>, tasks: &mut JoinSet<()>)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        match parse_incoming(line) {
            Ok(IncomingMessage::Request(request)) => {
                debug!(method = %request.method, id = %request.id, "Request received");
                let state = self.state.clone();
                let writer = writer.clone();
                tasks.spawn(async move {
                    let response = handle_request(&state, request).await;
                    if let Err(e) = write_response(&writer, &response).await {
                        warn!("Failed to write response: {}", e);
                    }
                });
            }
            Ok(IncomingMessage::Notification(notification)) => {
                handle_notification(&notification);
            }
            Err(e) => {
                warn!("Rejected message: {}", e);
                let response = JsonRpcResponse::failure(&e.id(), e.code(), e.to_string());
                if let Err(e) = write_response(writer, &response).await {
                    warn!("Failed to write response: {}", e);
                }
            }
        }
    }

    async fn drain(&self, tasks: &mut JoinSet<()>) {
        if tasks.is_empty() {
            return;
        }
        info!(in_flight = tasks.len(), "Waiting for in-flight requests");

        let finished = tokio::time::timeout(self.shutdown_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;

        if finished.is_err() {
            warn!(
                remaining = tasks.len(),
                grace_ms = self.shutdown_grace.as_millis() as u64,
                "Grace period elapsed, aborting in-flight requests"
            );
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }
    }
}

async fn write_response<W>(writer: &Mutex<BufWriter<W>>, response: &JsonRpcResponse) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut line = serde_json::to_string(response)?;
    line.push('\n');

    let mut writer = writer.lock().await;
    writer.write_all(line.as_bytes()).await?;
    writer.flush().await
}

// ----- Request handling -----

/// Answer one request. Never fails: every outcome becomes a response.
pub async fn handle_request(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let id = &request.id;
    match request.method.as_str() {
        "initialize" => handle_initialize(&request),
        "ping" => JsonRpcResponse::success(id, json!({})),
        "resources/list" => respond(
            id,
            &json!({ "resources": state.resources.list_resources() }),
        ),
        "resources/templates/list" => respond(
            id,
            &json!({ "resourceTemplates": state.resources.list_resource_templates() }),
        ),
        "resources/read" => handle_resources_read(state, &request).await,
        "tools/list" => respond(id, &json!({ "tools": state.tools.list_tools() })),
        "tools/call" => handle_tools_call(state, &request).await,
        other => JsonRpcResponse::failure(
            id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {}", other),
        ),
    }
}

fn handle_initialize(request: &JsonRpcRequest) -> JsonRpcResponse {
    let params: InitializeParams = request
        .params
        .clone()
        .and_then(|p| serde_json::from_value(p).ok())
        .unwrap_or_default();

    let protocol_version = params
        .protocol_version
        .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(&v.as_str()))
        .unwrap_or_else(|| LATEST_PROTOCOL_VERSION.to_string());
    info!(%protocol_version, "Host initialized session");

    let result = InitializeResult {
        protocol_version,
        capabilities: ServerCapabilities {
            tools: Some(ToolsCapability::default()),
            resources: Some(ResourcesCapability::default()),
        },
        server_info: ServerInfo {
            name: "hyperliquid-mcp".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
    };
    respond(&request.id, &result)
}

async fn handle_resources_read(state: &AppState, request: &JsonRpcRequest) -> JsonRpcResponse {
    let params: ReadResourceParams = match parse_params(request) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let read = state
        .resources
        .read(&state.config, state.executor.as_ref(), &params.uri)
        .await;

    match read {
        Ok(value) => respond(
            &request.id,
            &ResourceReadResult {
                contents: vec![ResourceContent {
                    uri: params.uri,
                    mime_type: JSON_MIME_TYPE.to_string(),
                    text: pretty(&value),
                }],
            },
        ),
        Err(e @ ResourceError::InvalidUri(_)) => {
            warn!(uri = %params.uri, "No resource matches URI");
            JsonRpcResponse::failure(&request.id, error_codes::INVALID_REQUEST, e.to_string())
        }
        Err(ResourceError::Bridge(e)) => {
            warn!(uri = %params.uri, "Resource read failed: {}", e);
            JsonRpcResponse::failure(
                &request.id,
                error_codes::INTERNAL_ERROR,
                format!("Error reading resource {}: {}", params.uri, e),
            )
        }
    }
}

async fn handle_tools_call(state: &AppState, request: &JsonRpcRequest) -> JsonRpcResponse {
    let params: CallToolParams = match parse_params(request) {
        Ok(p) => p,
        Err(response) => return response,
    };

    let call_id = Uuid::new_v4();
    let span = info_span!("tool_call", %call_id, tool = %params.name);

    async {
        let arguments = params.arguments.clone().unwrap_or_default();
        let started = Instant::now();
        let outcome = state.tools.call(&params.name, &arguments).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(value) => {
                let result = tool_result_from_value(&value);
                info!(elapsed_ms, is_error = result.is_error, "Tool call completed");
                result
            }
            Err(ToolError::UnknownTool(name)) => {
                warn!("Unknown tool requested");
                return JsonRpcResponse::failure(
                    &request.id,
                    error_codes::METHOD_NOT_FOUND,
                    format!("Unknown tool: {}", name),
                );
            }
            Err(e) => {
                warn!(elapsed_ms, "Tool call failed: {}", e);
                ToolCallResult::text(format!("Error executing tool {}: {}", params.name, e), true)
            }
        };
        respond(&request.id, &result)
    }
    .instrument(span)
    .await
}

/// Turn a bridge payload into a tool result.
///
/// The bridge reports business failures as `{"error": ...}` with a zero exit
/// status; a present, non-null `error` member marks the result as failed.
pub fn tool_result_from_value(value: &Value) -> ToolCallResult {
    match value.get("error") {
        Some(error) if !error.is_null() => {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            ToolCallResult::text(format!("Error: {}", message), true)
        }
        _ => ToolCallResult::text(pretty(value), false),
    }
}

fn handle_notification(notification: &JsonRpcNotification) {
    match notification.method.as_str() {
        "notifications/initialized" => info!("Host finished initialization"),
        "notifications/cancelled" => debug!(params = ?notification.params, "Host cancelled a request"),
        other => debug!(method = other, "Ignoring notification"),
    }
}

fn parse_params<T: DeserializeOwned>(request: &JsonRpcRequest) -> Result<T, JsonRpcResponse> {
    let params = request.params.clone().ok_or_else(|| {
        JsonRpcResponse::failure(&request.id, error_codes::INVALID_PARAMS, "Missing params")
    })?;
    serde_json::from_value(params).map_err(|e| {
        JsonRpcResponse::failure(
            &request.id,
            error_codes::INVALID_PARAMS,
            format!("Invalid params: {}", e),
        )
    })
}

fn respond<T: Serialize>(id: &Value, result: &T) -> JsonRpcResponse {
    match serde_json::to_value(result) {
        Ok(value) => JsonRpcResponse::success(id, value),
        Err(e) => JsonRpcResponse::failure(
            id,
            error_codes::INTERNAL_ERROR,
            format!("Failed to encode result: {}", e),
        ),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
