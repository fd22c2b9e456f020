//! A2A protocol data types
//!
//! One schema for the current protocol revision ([`PROTOCOL_VERSION`]);
//! older persisted shapes are upgraded by [`record::migrate`].
//!
//! ## Module Structure
//!
//! - [`task`] - Task lifecycle and status types
//! - [`message`] - Message and role types
//! - [`part`] - Content part types (text, file, data)
//! - [`artifact`] - Task output artifacts
//! - [`agent_card`] - Agent capability discovery
//! - [`streaming`] - Events published on the event bus
//! - [`push`] - Push notification configs
//! - [`jsonrpc`] - JSON-RPC envelope and method params
//! - [`record`] - Versioned persistence records

mod agent_card;
mod artifact;
pub mod jsonrpc;
mod message;
mod part;
mod push;
pub mod record;
mod streaming;
mod task;

/// Protocol revision of the current schema.
pub const PROTOCOL_VERSION: &str = "0.3";

pub use agent_card::{AgentCapabilities, AgentCard, AgentProvider, AgentSkill};
pub use artifact::Artifact;
pub use jsonrpc::{
    JSONRPC_VERSION, JsonRpcErrorResponse, JsonRpcResponse, JsonRpcSuccessResponse,
    MessageSendConfiguration, MessageSendParams, PushConfigListParams, PushConfigTaskParams,
    RequestId, TaskIdParams, TaskQueryParams,
};
pub use message::{Message, MessageKind, Role};
pub use part::{DataPart, FileContent, FilePart, Part, TextPart};
pub use push::{PushNotificationConfig, TaskPushNotificationConfig};
pub use streaming::{
    ArtifactUpdateKind, Event, StatusUpdateKind, TaskArtifactUpdateEvent, TaskStatusUpdateEvent,
};
pub use task::{Task, TaskKind, TaskState, TaskStatus};
