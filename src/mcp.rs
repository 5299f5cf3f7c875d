//! MCP server: JSON-RPC 2.0 over stdio or HTTP.
//!
//! Exposes two tools, `find_mcp` and `add_mcp`. Requests without an id are
//! notifications and get no response.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::app::{AppService, SERVICE_NAME};
use crate::format::{format_install_guide, format_ranking};

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpRequest {
    #[serde(default)]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct McpError {
    pub code: i32,
    pub message: String,
}

impl McpResponse {
    fn result(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(McpError {
                code,
                message: message.into(),
            }),
        }
    }
}

fn tool_definitions() -> Value {
    json!([
        {
            "name": "find_mcp",
            "description": "Find MCP connectors that fit a request. Describe what you want to do in plain words, for example \"I'm hungry\" or \"what's the weather tomorrow\".",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "What the user wants to do"
                    }
                },
                "required": ["query"]
            }
        },
        {
            "name": "add_mcp",
            "description": "Show the link and steps to add an MCP connector found with find_mcp.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "mcpId": {
                        "type": "string",
                        "description": "Id of the connector, as returned by find_mcp"
                    }
                },
                "required": ["mcpId"]
            }
        }
    ])
}

/// Text content block returned from `tools/call`.
fn text_content(text: String, is_error: bool) -> Value {
    let mut result = json!({ "content": [{ "type": "text", "text": text }] });
    if is_error {
        result["isError"] = json!(true);
    }
    result
}

pub struct McpServer {
    service: Arc<AppService>,
}

impl McpServer {
    pub fn new(service: Arc<AppService>) -> Self {
        Self { service }
    }

    /// Handle one raw JSON-RPC message. `None` for notifications.
    ///
    /// Blocks on provider calls.
    pub fn handle_message(&self, message: &str) -> Option<McpResponse> {
        let value: Value = match serde_json::from_str(message) {
            Ok(value) => value,
            Err(e) => {
                return Some(McpResponse::error(
                    Value::Null,
                    PARSE_ERROR,
                    format!("Parse error: {e}"),
                ))
            }
        };

        let id = value.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<McpRequest>(value) {
            Ok(request) => self.handle(request),
            Err(e) => Some(McpResponse::error(
                id,
                INVALID_REQUEST,
                format!("Invalid request: {e}"),
            )),
        }
    }

    pub fn handle(&self, request: McpRequest) -> Option<McpResponse> {
        let Some(id) = request.id else {
            log::debug!("notification {}", request.method);
            return None;
        };

        if request.jsonrpc != "2.0" {
            return Some(McpResponse::error(
                id,
                INVALID_REQUEST,
                "jsonrpc must be \"2.0\"",
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => McpResponse::result(id, self.initialize()),
            "ping" => McpResponse::result(id, json!({})),
            "tools/list" => McpResponse::result(id, json!({ "tools": tool_definitions() })),
            "tools/call" => match self.call_tool(&request.params) {
                Ok(result) => McpResponse::result(id, result),
                Err(message) => McpResponse::error(id, INVALID_PARAMS, message),
            },
            method => {
                McpResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {method}"))
            }
        };
        Some(response)
    }

    fn initialize(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION")
            }
        })
    }

    fn call_tool(&self, params: &Value) -> Result<Value, String> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or("Missing tool name")?;
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        log::info!("tools/call {name}");
        match name {
            "find_mcp" => {
                let query = arguments
                    .get("query")
                    .and_then(Value::as_str)
                    .filter(|q| !q.trim().is_empty())
                    .ok_or("find_mcp requires a non-empty `query`")?;

                let result = self.service.find_mcp(query);
                Ok(text_content(format_ranking(&result), !result.success))
            }
            "add_mcp" => {
                let mcp_id = match arguments.get("mcpId") {
                    Some(Value::String(id)) => id.clone(),
                    Some(Value::Number(id)) => id.to_string(),
                    _ => return Err("add_mcp requires `mcpId`".to_string()),
                };

                let guide = self.service.add_mcp(&mcp_id);
                Ok(text_content(format_install_guide(&guide), !guide.success))
            }
            other => Err(format!("Unknown tool: {other}")),
        }
    }
}

/// Serve newline-delimited JSON-RPC on stdin/stdout until EOF.
pub async fn run_stdio(server: Arc<McpServer>) -> anyhow::Result<()> {
    let mut reader = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut line = String::new();

    log::info!("MCP server ready on stdio");
    loop {
        line.clear();
        if reader.read_line(&mut line).await? == 0 {
            // EOF - client disconnected
            break;
        }

        let message = line.trim();
        if message.is_empty() {
            continue;
        }

        let server = server.clone();
        let Some(response) = tokio::task::block_in_place(move || server.handle_message(message))
        else {
            continue;
        };

        let mut out = serde_json::to_string(&response)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    log::info!("stdin closed, stopping");
    Ok(())
}
