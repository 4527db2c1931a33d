//! Transport-independent MCP request handling.
//!
//! Supported methods: `initialize`, `ping`, `tools/list`, `tools/call`.
//! Notifications are accepted and never answered.

use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::core::SafetyLimits;
use crate::tools::{ToolError, ToolRegistry, QUERY_ARGUMENT};

use super::protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolDefinition,
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, JSONRPC_VERSION, LATEST_PROTOCOL_VERSION,
    METHOD_NOT_FOUND, PARSE_ERROR, SUPPORTED_PROTOCOL_VERSIONS,
};

/// Name reported in `serverInfo`
pub const SERVER_NAME: &str = "Firewall2";

/// MCP server over a set of tools
pub struct ToolServer {
    tools: ToolRegistry,
    limits: SafetyLimits,
}

impl ToolServer {
    pub fn new(tools: ToolRegistry, limits: SafetyLimits) -> Self {
        Self { tools, limits }
    }

    /// Tool definitions in registration order
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|tool| ToolDefinition {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                input_schema: tool.input_schema(),
            })
            .collect()
    }

    /// Handle one raw JSON-RPC message
    ///
    /// Returns `None` when the message needs no reply.
    pub async fn handle_message(&self, raw: &str) -> Option<JsonRpcResponse> {
        let value: Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Unparsable JSON-RPC message");
                return Some(JsonRpcResponse::failure(
                    Value::Null,
                    JsonRpcError::new(PARSE_ERROR, format!("Parse error: {}", e)),
                ));
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(value) {
            Ok(request) => self.handle(request).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
            )),
        }
    }

    /// Handle a parsed request
    #[instrument(skip(self, request), fields(method = %request.method))]
    pub async fn handle(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            debug!("Notification received");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::new(INVALID_REQUEST, "jsonrpc must be \"2.0\""),
            ));
        }

        let outcome = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&request.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": self.list_tools() })),
            "tools/call" => self.call_tool(request.params).await.and_then(|result| {
                serde_json::to_value(result)
                    .map_err(|e| JsonRpcError::new(INTERNAL_ERROR, e.to_string()))
            }),
            other => Err(JsonRpcError::new(
                METHOD_NOT_FOUND,
                format!("Method not found: {}", other),
            )),
        };

        Some(match outcome {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = requested
            .filter(|v| SUPPORTED_PROTOCOL_VERSIONS.contains(v))
            .unwrap_or(LATEST_PROTOCOL_VERSION);

        info!(protocol_version = version, "Client initialized");

        json!({
            "protocolVersion": version,
            "capabilities": { "tools": { "listChanged": false } },
            "serverInfo": {
                "name": SERVER_NAME,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    /// Run a tool under the safety limits
    ///
    /// Tool failures and limit violations come back as `isError` results;
    /// bad params and unknown tools are protocol errors.
    async fn call_tool(&self, params: Value) -> Result<CallToolResult, JsonRpcError> {
        let params: CallToolParams = serde_json::from_value(params)
            .map_err(|e| JsonRpcError::new(INVALID_PARAMS, format!("Invalid params: {}", e)))?;

        let tool = self.tools.get(&params.name).ok_or_else(|| {
            JsonRpcError::new(INVALID_PARAMS, format!("Unknown tool: {}", params.name))
        })?;

        if let Some(query) = params.arguments.get(QUERY_ARGUMENT).and_then(Value::as_str) {
            if let Err(violation) = self.limits.validate_input(query) {
                warn!(tool = %params.name, %violation, "Safety limit violated");
                return Ok(CallToolResult::error(violation.to_string()));
            }
        }

        info!(tool = %params.name, "Calling tool");
        let call = tool.call(params.arguments);
        match tokio::time::timeout(self.limits.tool_timeout(), call).await {
            Ok(Ok(result)) => {
                debug!(tool = %params.name, pass = result.is_pass(), "Tool finished");
                Ok(CallToolResult::json(result.to_value()))
            }
            Ok(Err(ToolError::InvalidArguments(message))) => {
                Err(JsonRpcError::new(INVALID_PARAMS, message))
            }
            Ok(Err(ToolError::Failed(e))) => {
                warn!(tool = %params.name, error = %e, "Tool failed");
                Ok(CallToolResult::error(format!("{:#}", e)))
            }
            Err(_) => {
                let violation = self.limits.timeout_violation(&params.name);
                warn!(tool = %params.name, %violation, "Tool timed out");
                Ok(CallToolResult::error(violation.to_string()))
            }
        }
    }
}
