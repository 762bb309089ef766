// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON-RPC 2.0 message shapes shared by the stdio and HTTP transports.

use serde::{Deserialize, Serialize};

use mnemos_core::Error;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// A schema entry from `tools/list`, cached at connect time.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "inputSchema", default = "default_schema")]
    pub input_schema: serde_json::Value,
}

fn default_schema() -> serde_json::Value {
    serde_json::json!({"type": "object", "properties": {}})
}

#[derive(Debug, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<serde_json::Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: &str, params: Option<serde_json::Value>) -> RpcRequest {
        RpcRequest {
            jsonrpc: "2.0",
            id,
            method: method.to_string(),
            params,
        }
    }

    /// The `initialize` handshake sent before anything else.
    pub fn initialize(id: u64) -> RpcRequest {
        RpcRequest::new(
            id,
            "initialize",
            Some(serde_json::json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "clientInfo": {"name": "mnemos", "version": env!("CARGO_PKG_VERSION")}
            })),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

/// Extract the tool list from a `tools/list` result.
pub fn parse_tool_list(result: &serde_json::Value) -> Result<Vec<ToolDescriptor>, Error> {
    let tools = result
        .get("tools")
        .cloned()
        .unwrap_or_else(|| result.clone());
    serde_json::from_value(tools)
        .map_err(|e| Error::upstream(format!("malformed tools/list result: {e}")))
}

/// Extract the first text content of a `tools/call` result.
pub fn parse_call_result(result: &serde_json::Value) -> String {
    if let Some(items) = result.get("content").and_then(|c| c.as_array()) {
        for item in items {
            if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                return text.to_string();
            }
        }
        if !items.is_empty() {
            return items[0].to_string();
        }
    }
    "Tool call succeeded but returned no content".to_string()
}

/// Turn an RPC-level error into the taxonomy.
pub fn rpc_error(server: &str, error: RpcError) -> Error {
    Error::upstream(format!(
        "tool server '{server}' returned error {}: {}",
        error.code, error.message
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_serializes_to_jsonrpc_2() {
        let req = RpcRequest::new(7, "tools/list", None);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["jsonrpc"], "2.0");
        assert_eq!(value["id"], 7);
        assert_eq!(value["method"], "tools/list");
        assert!(value.get("params").is_none());
    }

    #[test]
    fn initialize_carries_protocol_version() {
        let req = RpcRequest::initialize(1);
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["params"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["params"]["clientInfo"]["name"], "mnemos");
    }

    #[test]
    fn tool_list_parses_with_and_without_wrapper() {
        let wrapped = json!({"tools": [{"name": "fetch", "description": "d",
                                         "inputSchema": {"type": "object"}}]});
        let tools = parse_tool_list(&wrapped).unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, "fetch");

        let bare = json!([{"name": "other"}]);
        let tools = parse_tool_list(&bare).unwrap();
        assert_eq!(tools[0].name, "other");
        assert_eq!(tools[0].input_schema["type"], "object");
    }

    #[test]
    fn call_result_prefers_text_content() {
        let result = json!({"content": [
            {"type": "image", "data": "..."},
            {"type": "text", "text": "the answer"}
        ]});
        assert_eq!(parse_call_result(&result), "the answer");
    }

    #[test]
    fn call_result_without_content_reports_cleanly() {
        assert!(parse_call_result(&json!({})).contains("no content"));
    }

    #[test]
    fn response_parses_error_branch() {
        let raw = r#"{"jsonrpc": "2.0", "id": 3,
                      "error": {"code": -32601, "message": "method not found"}}"#;
        let resp: RpcResponse = serde_json::from_str(raw).unwrap();
        let err = rpc_error("srv", resp.error.unwrap());
        assert_eq!(err.kind(), "upstream_failure");
        assert!(err.to_string().contains("method not found"));
    }
}
