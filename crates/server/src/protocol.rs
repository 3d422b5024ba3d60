//! JSON-RPC 2.0 and MCP message types used by the stdio front-end.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC protocol version constant.
pub const JSONRPC_VERSION: &str = "2.0";

/// Newest MCP protocol revision this server speaks.
pub const LATEST_PROTOCOL_VERSION: &str = "2025-06-18";

/// Revisions accepted from a client's `initialize` request.
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

// ---------------------------------------------------------------------------
// JSON-RPC 2.0 core types
// ---------------------------------------------------------------------------

/// A JSON-RPC 2.0 request (has an `id`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Value::Number(id.into()),
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no `id`, never answered).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: &Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.clone(),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: &Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.clone(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// A JSON-RPC error object.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Standard JSON-RPC error codes.
pub mod error_codes {
    /// Parse error: invalid JSON.
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid request; also used for resource URIs that match nothing.
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found; also used for unknown tool names.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error.
    pub const INTERNAL_ERROR: i64 = -32603;
}

// ---------------------------------------------------------------------------
// Incoming message classification
// ---------------------------------------------------------------------------

/// A message read from the host.
#[derive(Debug, Clone)]
pub enum IncomingMessage {
    Request(JsonRpcRequest),
    Notification(JsonRpcNotification),
}

/// Why an incoming line could not be turned into a message.
#[derive(Debug, thiserror::Error)]
pub enum IncomingError {
    /// Not JSON at all.
    #[error("Parse error: {0}")]
    Parse(serde_json::Error),
    /// Well-formed JSON that is not a request or notification object.
    #[error("Invalid request: {message}")]
    InvalidRequest { id: Value, message: String },
}

impl IncomingError {
    /// JSON-RPC error code to answer with.
    pub fn code(&self) -> i64 {
        match self {
            IncomingError::Parse(_) => error_codes::PARSE_ERROR,
            IncomingError::InvalidRequest { .. } => error_codes::INVALID_REQUEST,
        }
    }

    pub fn id(&self) -> Value {
        match self {
            IncomingError::Parse(_) => Value::Null,
            IncomingError::InvalidRequest { id, .. } => id.clone(),
        }
    }
}

/// Parse a JSON line into a request or notification.
///
/// Anything with a non-null `id` is a request. A structural error keeps the
/// request id, when there is one, so the host can correlate the failure.
pub fn parse_incoming(line: &str) -> Result<IncomingMessage, IncomingError> {
    let raw: Value = serde_json::from_str(line).map_err(IncomingError::Parse)?;

    let id = raw.get("id").cloned().unwrap_or(Value::Null);
    let invalid = |e: serde_json::Error| IncomingError::InvalidRequest {
        id: id.clone(),
        message: e.to_string(),
    };

    if !id.is_null() {
        Ok(IncomingMessage::Request(
            serde_json::from_value(raw).map_err(invalid)?,
        ))
    } else {
        Ok(IncomingMessage::Notification(
            serde_json::from_value(raw).map_err(invalid)?,
        ))
    }
}

// ---------------------------------------------------------------------------
// MCP payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    #[serde(default)]
    pub protocol_version: Option<String>,
}

/// Server info returned during initialization.
#[derive(Debug, Clone, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ToolsCapability {
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResourcesCapability {
    pub subscribe: bool,
    pub list_changed: bool,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct ServerCapabilities {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
}

/// Result of the `initialize` request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    pub capabilities: ServerCapabilities,
    pub server_info: ServerInfo,
}

/// Parameters of `resources/read`.
#[derive(Debug, Clone, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}

/// Parameters of `tools/call`.
#[derive(Debug, Clone, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Map<String, Value>>,
}

/// Content of a read resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceContent {
    pub uri: String,
    pub mime_type: String,
    pub text: String,
}

/// Result of `resources/read`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceReadResult {
    pub contents: Vec<ResourceContent>,
}

/// Content item in a tool call result.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ToolCallContent {
    #[serde(rename = "text")]
    Text { text: String },
}

/// Result of `tools/call`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    pub content: Vec<ToolCallContent>,
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn text(text: impl Into<String>, is_error: bool) -> Self {
        Self {
            content: vec![ToolCallContent::Text { text: text.into() }],
            is_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_incoming_request() {
        let json = r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#;
        match parse_incoming(json).unwrap() {
            IncomingMessage::Request(req) => {
                assert_eq!(req.method, "tools/list");
                assert_eq!(req.id, serde_json::json!(1));
            }
            _ => panic!("expected request"),
        }
    }

    #[test]
    fn test_parse_incoming_string_id() {
        let json = r#"{"jsonrpc":"2.0","id":"abc","method":"ping"}"#;
        assert!(matches!(
            parse_incoming(json).unwrap(),
            IncomingMessage::Request(_)
        ));
    }

    #[test]
    fn test_parse_incoming_notification() {
        let json = r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#;
        match parse_incoming(json).unwrap() {
            IncomingMessage::Notification(notif) => {
                assert_eq!(notif.method, "notifications/initialized");
            }
            _ => panic!("expected notification"),
        }
    }

    #[test]
    fn test_parse_incoming_invalid_json() {
        let err = parse_incoming("not json").unwrap_err();
        assert!(matches!(err, IncomingError::Parse(_)));
        assert_eq!(err.code(), error_codes::PARSE_ERROR);
        assert_eq!(err.id(), Value::Null);
    }

    #[test]
    fn test_parse_incoming_invalid_request_keeps_id() {
        let err = parse_incoming(r#"{"jsonrpc":"2.0","id":1}"#).unwrap_err();
        assert!(matches!(err, IncomingError::InvalidRequest { .. }));
        assert_eq!(err.code(), error_codes::INVALID_REQUEST);
        assert_eq!(err.id(), serde_json::json!(1));

        let err = parse_incoming("[1, 2]").unwrap_err();
        assert_eq!(err.code(), error_codes::INVALID_REQUEST);
        assert_eq!(err.id(), Value::Null);
    }

    #[test]
    fn test_failure_response_serialization() {
        let resp = JsonRpcResponse::failure(
            &serde_json::json!(7),
            error_codes::METHOD_NOT_FOUND,
            "Unknown tool: nope",
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["id"], 7);
        assert_eq!(json["error"]["code"], -32601);
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_tool_call_result_serialization() {
        let json = serde_json::to_value(ToolCallResult::text("Error: boom", true)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "content": [{"type": "text", "text": "Error: boom"}],
                "isError": true
            })
        );
    }

    #[test]
    fn test_call_tool_params_null_arguments() {
        let params: CallToolParams =
            serde_json::from_value(serde_json::json!({"name": "get_market_data", "arguments": null}))
                .unwrap();
        assert!(params.arguments.is_none());
    }
}
