//! A2A Protocol Error Types
//!
//! Every failure inside the engine is an [`A2aError`]. Each variant maps to
//! exactly one JSON-RPC error code from the canonical table below, so domain
//! errors can never surface as `INTERNAL_ERROR` by accident.
//!
//! | Code   | Meaning                                     |
//! |--------|---------------------------------------------|
//! | -32700 | Parse error                                 |
//! | -32600 | Invalid request                             |
//! | -32601 | Method not found                            |
//! | -32602 | Invalid params                              |
//! | -32603 | Internal error                              |
//! | -32001 | Task not found                              |
//! | -32002 | Task not cancelable                         |
//! | -32003 | Push notifications not supported            |
//! | -32004 | Unsupported operation                       |
//! | -32005 | Content type not supported                  |
//! | -32006 | Invalid agent response                      |
//! | -32007 | Authenticated extended card not configured  |
//! | -31401 | Unauthenticated                             |

use parley_core::StoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::types::TaskState;

/// Result type for A2A operations
pub type A2aResult<T> = Result<T, A2aError>;

/// Errors that can occur in A2A protocol operations
#[derive(Debug, Error)]
pub enum A2aError {
    /// Task not found
    #[error("Task not found: {task_id}")]
    TaskNotFound { task_id: String },

    /// Task is terminal and cannot be canceled
    #[error("Task {task_id} cannot be canceled: state is {state}")]
    TaskNotCancelable { task_id: String, state: TaskState },

    /// Task is in a terminal state and cannot accept new messages
    #[error("Task {task_id} is in terminal state: {state}")]
    TaskTerminated { task_id: String, state: TaskState },

    /// Invalid task state transition
    #[error("Invalid state transition for task {task_id}: {from} -> {to}")]
    InvalidStateTransition {
        task_id: String,
        from: TaskState,
        to: TaskState,
    },

    /// No push notification config registered for the task
    #[error("Push notification config not found for task: {task_id}")]
    PushConfigNotFound { task_id: String },

    /// Push notifications are disabled on this agent
    #[error("Push notifications are not supported")]
    PushNotificationNotSupported,

    /// Operation not supported by this agent
    #[error("Unsupported operation: {reason}")]
    UnsupportedOperation { reason: String },

    /// Request content type not accepted
    #[error("Content type not supported: {content_type}")]
    ContentTypeNotSupported { content_type: String },

    /// The agent executor broke the event protocol
    #[error("Invalid agent response: {reason}")]
    InvalidAgentResponse { reason: String },

    /// No authenticated extended card is configured
    #[error("Authenticated extended card is not configured")]
    ExtendedCardNotConfigured,

    /// Caller must authenticate first
    #[error("Authentication required")]
    AuthenticationRequired,

    /// Request body is not valid JSON
    #[error("Parse error: {reason}")]
    ParseError { reason: String },

    /// Envelope failed validation
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// Unknown JSON-RPC method
    #[error("Method not found: {method}")]
    MethodNotFound { method: String },

    /// Method parameters failed validation
    #[error("Invalid params: {reason}")]
    InvalidParams { reason: String },

    /// Storage backend failure
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl A2aError {
    /// Create a task not found error
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    /// Create a task terminated error
    pub fn task_terminated(task_id: impl Into<String>, state: TaskState) -> Self {
        Self::TaskTerminated {
            task_id: task_id.into(),
            state,
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            reason: reason.into(),
        }
    }

    /// Create an invalid agent response error
    pub fn invalid_agent_response(reason: impl Into<String>) -> Self {
        Self::InvalidAgentResponse {
            reason: reason.into(),
        }
    }

    /// Create an invalid request error
    pub fn invalid_request(reason: impl Into<String>) -> Self {
        Self::InvalidRequest {
            reason: reason.into(),
        }
    }

    /// Create an invalid params error
    pub fn invalid_params(reason: impl Into<String>) -> Self {
        Self::InvalidParams {
            reason: reason.into(),
        }
    }

    /// Create an internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// JSON-RPC error code for this error.
    pub fn code(&self) -> JsonRpcErrorCode {
        match self {
            A2aError::TaskNotFound { .. } | A2aError::PushConfigNotFound { .. } => {
                JsonRpcErrorCode::TaskNotFound
            }
            A2aError::TaskNotCancelable { .. } => JsonRpcErrorCode::TaskNotCancelable,
            A2aError::PushNotificationNotSupported => {
                JsonRpcErrorCode::PushNotificationNotSupported
            }
            A2aError::TaskTerminated { .. }
            | A2aError::InvalidStateTransition { .. }
            | A2aError::UnsupportedOperation { .. } => JsonRpcErrorCode::UnsupportedOperation,
            A2aError::ContentTypeNotSupported { .. } => JsonRpcErrorCode::ContentTypeNotSupported,
            A2aError::InvalidAgentResponse { .. } => JsonRpcErrorCode::InvalidAgentResponse,
            A2aError::ExtendedCardNotConfigured => {
                JsonRpcErrorCode::AuthenticatedExtendedCardNotConfigured
            }
            A2aError::AuthenticationRequired => JsonRpcErrorCode::Unauthenticated,
            A2aError::ParseError { .. } => JsonRpcErrorCode::ParseError,
            A2aError::InvalidRequest { .. } => JsonRpcErrorCode::InvalidRequest,
            A2aError::MethodNotFound { .. } => JsonRpcErrorCode::MethodNotFound,
            A2aError::InvalidParams { .. } => JsonRpcErrorCode::InvalidParams,
            A2aError::Storage(_)
            | A2aError::SerializationError(_)
            | A2aError::InternalError { .. } => JsonRpcErrorCode::InternalError,
        }
    }

    /// Whether this error is an unexpected failure rather than a protocol outcome.
    pub fn is_internal(&self) -> bool {
        self.code() == JsonRpcErrorCode::InternalError
    }
}

/// JSON-RPC 2.0 error codes, including the A2A-specific range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum JsonRpcErrorCode {
    /// Invalid JSON was received by the server.
    ParseError = -32700,
    /// The JSON sent is not a valid Request object.
    InvalidRequest = -32600,
    /// The method does not exist / is not available.
    MethodNotFound = -32601,
    /// Invalid method parameter(s).
    InvalidParams = -32602,
    /// Internal JSON-RPC error.
    InternalError = -32603,
    /// Task not found.
    TaskNotFound = -32001,
    /// Task cannot be canceled.
    TaskNotCancelable = -32002,
    /// Push notification not supported.
    PushNotificationNotSupported = -32003,
    /// Operation not supported.
    UnsupportedOperation = -32004,
    /// Content type not supported.
    ContentTypeNotSupported = -32005,
    /// Invalid agent response.
    InvalidAgentResponse = -32006,
    /// Authenticated extended card not configured.
    AuthenticatedExtendedCardNotConfigured = -32007,
    /// Request does not carry valid credentials.
    Unauthenticated = -31401,
}

impl JsonRpcErrorCode {
    /// Numeric wire value.
    pub fn as_i32(self) -> i32 {
        self as i32
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// A number indicating the error type.
    pub code: i32,
    /// A short description of the error.
    pub message: String,
    /// Additional information about the error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl JsonRpcError {
    /// Creates a new JSON-RPC error.
    pub fn new(code: JsonRpcErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: code.as_i32(),
            message: message.into(),
            data: None,
        }
    }
}

impl fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&A2aError> for JsonRpcError {
    fn from(err: &A2aError) -> Self {
        // Backend details (paths, serde positions) stay in the logs.
        let message = match err {
            A2aError::Storage(_) => "Internal error: storage failure".to_string(),
            A2aError::SerializationError(_) => "Internal error: serialization failure".to_string(),
            other => other.to_string(),
        };
        JsonRpcError::new(err.code(), message)
    }
}

impl From<A2aError> for JsonRpcError {
    fn from(err: A2aError) -> Self {
        JsonRpcError::from(&err)
    }
}
