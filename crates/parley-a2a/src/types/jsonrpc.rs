//! JSON-RPC 2.0 envelope and method parameter types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Message, PushNotificationConfig};
use crate::error::JsonRpcError;

/// The JSON-RPC protocol version.
pub const JSONRPC_VERSION: &str = "2.0";

/// Identifier of a JSON-RPC request.
///
/// `Null` covers both an explicit `null` and an absent id; responses always
/// carry the field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    /// String identifier.
    String(String),
    /// Numeric identifier.
    Number(serde_json::Number),
    /// No usable identifier.
    #[default]
    Null,
}

impl RequestId {
    /// Interpret a raw `id` member. `None` means the value is an object,
    /// array or boolean and therefore not a valid id.
    pub fn from_value(value: Option<&serde_json::Value>) -> Option<Self> {
        match value {
            None | Some(serde_json::Value::Null) => Some(RequestId::Null),
            Some(serde_json::Value::String(s)) => Some(RequestId::String(s.clone())),
            Some(serde_json::Value::Number(n)) => Some(RequestId::Number(n.clone())),
            Some(_) => None,
        }
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        RequestId::String(s.to_string())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        RequestId::String(s)
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        RequestId::Number(n.into())
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestId::String(s) => write!(f, "{s}"),
            RequestId::Number(n) => write!(f, "{n}"),
            RequestId::Null => write!(f, "null"),
        }
    }
}

/// Represents a successful JSON-RPC 2.0 Response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcSuccessResponse {
    /// Always "2.0".
    pub jsonrpc: String,
    /// The identifier established by the client.
    pub id: RequestId,
    /// The result of the method invocation.
    pub result: serde_json::Value,
}

/// Represents a JSON-RPC 2.0 Error Response object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcErrorResponse {
    /// Always "2.0".
    pub jsonrpc: String,
    /// The identifier established by the client, null when it was unusable.
    pub id: RequestId,
    /// An object describing the error.
    pub error: JsonRpcError,
}

/// Either kind of JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonRpcResponse {
    /// Successful result
    Success(JsonRpcSuccessResponse),
    /// Error object
    Error(JsonRpcErrorResponse),
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: RequestId, result: serde_json::Value) -> Self {
        JsonRpcResponse::Success(JsonRpcSuccessResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result,
        })
    }

    /// Build an error response.
    pub fn error(id: RequestId, error: impl Into<JsonRpcError>) -> Self {
        JsonRpcResponse::Error(JsonRpcErrorResponse {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            error: error.into(),
        })
    }

    /// The response id.
    pub fn id(&self) -> &RequestId {
        match self {
            JsonRpcResponse::Success(r) => &r.id,
            JsonRpcResponse::Error(r) => &r.id,
        }
    }

    /// The error object, if this is an error response.
    pub fn as_error(&self) -> Option<&JsonRpcError> {
        match self {
            JsonRpcResponse::Error(r) => Some(&r.error),
            JsonRpcResponse::Success(_) => None,
        }
    }

    /// The result, if this is a success response.
    pub fn as_result(&self) -> Option<&serde_json::Value> {
        match self {
            JsonRpcResponse::Success(r) => Some(&r.result),
            JsonRpcResponse::Error(_) => None,
        }
    }
}

/// Parameters for `message/send` and `message/stream`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendParams {
    /// The message being sent to the agent.
    pub message: Message,
    /// Identifier of the sending agent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Per-request options.
    #[serde(default)]
    pub configuration: MessageSendConfiguration,
    /// Extra metadata merged into the task.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl MessageSendParams {
    /// Creates new send parameters with a message.
    pub fn new(message: Message) -> Self {
        Self {
            message,
            from: None,
            configuration: MessageSendConfiguration::default(),
            metadata: HashMap::new(),
        }
    }
}

/// Options for a send or stream request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSendConfiguration {
    /// Number of recent history entries returned with the task.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
    /// Push config registered for the task before execution starts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notification_config: Option<PushNotificationConfig>,
}

/// Parameters for `tasks/get`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueryParams {
    /// The unique identifier of the task.
    pub id: String,
    /// The number of recent history entries to return.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<usize>,
}

/// Parameters naming a single task (`tasks/cancel`, `tasks/resubscribe`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskIdParams {
    /// The unique identifier of the task.
    pub id: String,
}

/// Parameters for push config `get` and `delete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfigTaskParams {
    /// Task the config belongs to.
    #[serde(alias = "id")]
    pub task_id: String,
}

/// Parameters for push config `list`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushConfigListParams {
    /// Restrict the listing to one task.
    #[serde(default, alias = "id", skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}
