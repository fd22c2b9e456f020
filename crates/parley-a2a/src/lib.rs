//! # Parley A2A - Agent2Agent Protocol Engine
//!
//! JSON-RPC 2.0 method surface for the A2A protocol, with a persistent task
//! lifecycle, per-task event streaming over SSE and push-notification
//! subscription management.
//!
//! ## Components
//!
//! - **Dispatcher**: validates envelopes and routes methods ([`Dispatcher`])
//! - **Task Store**: authoritative tasks with terminal-state enforcement ([`store::TaskStore`])
//! - **Push Registry**: webhook configs keyed by task ([`store::PushRegistry`])
//! - **Event Bus**: ordered per-task fan-out ([`events::EventBus`])
//! - **Streaming Coordinator**: runs executors and mirrors events ([`streaming::StreamingCoordinator`])
//! - **Executor**: the pluggable agent logic ([`executor::AgentExecutor`])
//! - **Server**: axum transport (requires `server` feature)
//!
//! ## Example: Dispatching a request
//!
//! ```rust
//! use parley_a2a::executor::ReferenceExecutor;
//! use parley_a2a::{CallContext, Dispatcher};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::builder(ReferenceExecutor::default()).build();
//! let request = serde_json::json!({"jsonrpc": "2.0", "id": 1, "method": "ping"});
//!
//! let response = dispatcher
//!     .dispatch(request, CallContext::default())
//!     .await
//!     .into_response()
//!     .unwrap();
//! assert_eq!(response.as_result().unwrap()["status"], "pong");
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod executor;
pub mod store;
pub mod streaming;
pub mod types;

// Server module (requires server feature)
#[cfg(feature = "server")]
pub mod server;

pub use config::{ConfigError, ServerConfig, ServerConfigBuilder, StoreKind};
pub use dispatcher::{CallContext, DispatchOutcome, Dispatcher, DispatcherBuilder, Method};
pub use error::{A2aError, A2aResult, JsonRpcError, JsonRpcErrorCode};
pub use events::{EventBus, EventBusManager, EventSubscriber};
pub use executor::{AgentExecutor, CancellationRegistry, ReferenceExecutor, RequestContext};
pub use store::{PushRegistry, TaskStore};
pub use streaming::{SseFrame, StreamingCoordinator};
pub use types::{
    AgentCard, Artifact, Event, Message, Part, PushNotificationConfig, Task, TaskState,
    TaskStatus,
};

#[cfg(feature = "server")]
pub use server::A2aServer;
