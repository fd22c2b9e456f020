//! # Parley
//!
//! Parley is an Agent2Agent (A2A) protocol engine: a JSON-RPC 2.0
//! dispatcher, a persistent task state machine, per-task event buses and
//! Server-Sent-Events streaming, fronted by an Axum HTTP server.
//!
//! ## Crates
//!
//! - [`core`]: the key-value persistence contract and its backends
//! - [`a2a`]: protocol types, dispatcher, task store, event bus, streaming and server
//!
//! ## Quick Start
//!
//! ```rust
//! use parley::{CallContext, Dispatcher, ReferenceExecutor};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let dispatcher = Dispatcher::builder(ReferenceExecutor::default()).build();
//! let request = json!({
//!     "jsonrpc": "2.0",
//!     "id": 1,
//!     "method": "message/send",
//!     "params": {
//!         "message": {
//!             "messageId": "m1",
//!             "role": "user",
//!             "parts": [{ "kind": "text", "text": "hello" }]
//!         }
//!     }
//! });
//!
//! let response = dispatcher
//!     .dispatch(request, CallContext::default())
//!     .await
//!     .into_response()
//!     .unwrap();
//! assert_eq!(response.as_result().unwrap()["status"]["state"], "completed");
//! # }
//! ```

pub use parley_a2a as a2a;
pub use parley_core as core;

pub use parley_a2a::{
    A2aError, A2aResult, A2aServer, AgentCard, AgentExecutor, CallContext, DispatchOutcome,
    Dispatcher, EventBus, Message, ReferenceExecutor, RequestContext, ServerConfig,
    ServerConfigBuilder, Task, TaskState,
};
pub use parley_core::{FileStore, InMemoryStore, KvStore};
