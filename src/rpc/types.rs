use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomainFailure, ProtocolError, Result};

pub const JSONRPC_VERSION: &str = "2.0";

/// Outbound JSON-RPC 2.0 envelope. Ids are unique within one client
/// instance, not across the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// Inbound JSON-RPC 2.0 envelope. Exactly one of `result` / `error` is
/// expected; both absent is a protocol violation.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcErrorObject {
    pub code: i64,
    pub message: String,
}

/// Unwrap a response into its result, mapping a JSON-RPC error object to
/// a protocol error.
pub(crate) fn extract_result(response: JsonRpcResponse) -> Result<Value> {
    if let Some(error) = response.error {
        return Err(ProtocolError::Rpc {
            code: error.code,
            message: error.message,
        }
        .into());
    }

    response
        .result
        .ok_or_else(|| ProtocolError::MissingResult.into())
}

/// A callable backend tool, as advertised by `tools/list`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// JSON-schema-like shape of the tool's arguments.
    #[serde(default)]
    pub input_schema: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ToolListResult {
    pub tools: Vec<ToolDescriptor>,
}

/// One piece of a tool result. The protocol allows shapes beyond plain
/// text; unknown ones are preserved raw rather than rejected.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ToolContent {
    Text { text: String },
    Other(Value),
}

/// Result envelope of `tools/call`.
///
/// A structurally successful RPC response can still carry a tool-level
/// failure; `is_error` is that discriminant, kept separate from transport
/// and protocol errors.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Vec<ToolContent>,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolCallResult {
    pub fn ok(&self) -> bool {
        !self.is_error
    }

    /// Concatenated text segments of the result.
    pub fn text(&self) -> String {
        let mut out = String::new();
        for content in &self.content {
            if let ToolContent::Text { text } = content {
                out.push_str(text);
            }
        }
        out
    }

    /// Promote a tool-level failure to a domain error.
    pub fn checked(self) -> Result<Self> {
        if self.is_error {
            return Err(DomainFailure::ToolFailed {
                message: self.text(),
            }
            .into());
        }
        Ok(self)
    }
}
