//! A2A JSON-RPC over HTTP
//!
//! Exposes a [`Dispatcher`] on a single JSON-RPC endpoint plus the
//! well-known agent card routes.
//!
//! - `POST /` - JSON-RPC requests; streaming methods answer with `text/event-stream`
//! - `GET /.well-known/agent.json` and `GET /.well-known/agent-card.json` - public agent card
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_a2a::executor::ReferenceExecutor;
//! use parley_a2a::server::A2aServer;
//! use parley_a2a::Dispatcher;
//!
//! #[tokio::main]
//! async fn main() {
//!     let dispatcher = Dispatcher::builder(ReferenceExecutor::default()).build();
//!     A2aServer::new(dispatcher).serve("0.0.0.0:8080").await.unwrap();
//! }
//! ```

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::{
        IntoResponse, Response,
        sse::{Event, Sse},
    },
    routing::{get, post},
};
use futures::StreamExt;
use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::dispatcher::{CallContext, DispatchOutcome, Dispatcher};
use crate::error::{A2aError, A2aResult};
use crate::executor::AgentExecutor;
use crate::streaming::SseFrame;
use crate::types::{AgentCard, JsonRpcResponse, RequestId};

#[derive(Clone)]
struct AppState {
    dispatcher: Arc<Dispatcher>,
    auth_token: Option<Arc<str>>,
}

/// HTTP front end for a [`Dispatcher`].
pub struct A2aServer {
    dispatcher: Arc<Dispatcher>,
    auth_token: Option<String>,
    enable_cors: bool,
}

impl A2aServer {
    /// Serve `dispatcher` without authentication and with permissive CORS.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher: Arc::new(dispatcher),
            auth_token: None,
            enable_cors: true,
        }
    }

    /// Build the dispatcher and server described by `config`.
    pub fn from_config(config: &ServerConfig, executor: impl AgentExecutor) -> Self {
        let mut builder = Dispatcher::builder(executor)
            .store(config.open_store())
            .agent_card(config.agent_card())
            .sse_buffer(config.sse_buffer);
        if let Some(card) = config.extended_card() {
            builder = builder.extended_card(card);
        }
        Self::new(builder.build())
            .with_auth_token(config.auth_token.clone())
            .with_cors(config.enable_cors)
    }

    /// Require `Authorization: Bearer <token>` for authenticated methods.
    pub fn with_auth_token(mut self, token: Option<String>) -> Self {
        self.auth_token = token;
        self
    }

    /// Toggle permissive CORS.
    pub fn with_cors(mut self, enabled: bool) -> Self {
        self.enable_cors = enabled;
        self
    }

    /// The dispatcher behind this server.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Build the Axum router for this server
    pub fn router(&self) -> Router {
        let state = AppState {
            dispatcher: Arc::clone(&self.dispatcher),
            auth_token: self.auth_token.as_deref().map(Arc::from),
        };

        let router = Router::new()
            .route("/", post(json_rpc))
            .route("/.well-known/agent.json", get(agent_card))
            .route("/.well-known/agent-card.json", get(agent_card))
            .with_state(state)
            .layer(TraceLayer::new_for_http());

        if self.enable_cors {
            router.layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
        } else {
            router
        }
    }

    /// Serve on `addr` until the process is stopped.
    pub async fn serve(self, addr: &str) -> A2aResult<()> {
        self.serve_with_shutdown(addr, std::future::pending()).await
    }

    /// Serve on `addr` until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, addr: &str, shutdown: F) -> A2aResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| A2aError::internal_error(format!("Failed to bind to {addr}: {e}")))?;

        let card = self.dispatcher.agent_card();
        info!(
            name = %card.name,
            url = %card.url,
            address = %addr,
            streaming = card.capabilities.streaming,
            "A2A server starting"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| A2aError::internal_error(format!("Server error: {e}")))?;

        info!("A2A server stopped");
        Ok(())
    }
}

// =============================================================================
// Route Handlers
// =============================================================================

/// GET /.well-known/agent.json - Agent card discovery
async fn agent_card(State(state): State<AppState>) -> Json<AgentCard> {
    let card = state.dispatcher.agent_card();
    debug!(name = %card.name, "Serving agent card");
    Json(card.clone())
}

/// POST / - JSON-RPC endpoint
async fn json_rpc(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    if let Some(content_type) = headers.get(header::CONTENT_TYPE) {
        let content_type = content_type.to_str().unwrap_or_default();
        if !is_json(content_type) {
            let error = A2aError::ContentTypeNotSupported {
                content_type: content_type.to_string(),
            };
            return Json(JsonRpcResponse::error(RequestId::Null, &error)).into_response();
        }
    }

    let ctx = CallContext {
        authenticated: is_authenticated(&headers, state.auth_token.as_deref()),
    };

    let outcome = match std::str::from_utf8(&body) {
        Ok(body) => state.dispatcher.dispatch_str(body, ctx).await,
        Err(e) => DispatchOutcome::Response(JsonRpcResponse::error(
            RequestId::Null,
            &A2aError::ParseError {
                reason: e.to_string(),
            },
        )),
    };

    match outcome {
        DispatchOutcome::Response(response) => Json(response).into_response(),
        DispatchOutcome::Stream(frames) => {
            let events = frames.map(|frame| Ok::<_, Infallible>(sse_event(frame)));
            Sse::new(events).into_response()
        }
    }
}

fn is_json(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

fn is_authenticated(headers: &HeaderMap, token: Option<&str>) -> bool {
    let Some(expected) = token else {
        return false;
    };
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|presented| presented.trim() == expected)
}

fn sse_event(frame: SseFrame) -> Event {
    let event = Event::default().data(frame.data);
    match frame.event {
        Some(name) => event.event(name),
        None => event,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn json_content_types() {
        assert!(is_json("application/json"));
        assert!(is_json("application/json; charset=utf-8"));
        assert!(is_json("application/vnd.a2a+json"));
        assert!(!is_json("text/plain"));
        assert!(!is_json(""));
    }

    #[test]
    fn bearer_token_gate() {
        let mut headers = HeaderMap::new();
        assert!(!is_authenticated(&headers, Some("secret")));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        assert!(is_authenticated(&headers, Some("secret")));
        assert!(!is_authenticated(&headers, Some("other")));
        assert!(!is_authenticated(&headers, None));

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic secret"));
        assert!(!is_authenticated(&headers, Some("secret")));
    }
}
