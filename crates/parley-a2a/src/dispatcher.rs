//! JSON-RPC entry point of the engine.
//!
//! The [`Dispatcher`] validates the request envelope, routes by method and
//! turns every outcome, including handler panics, into a well-formed
//! JSON-RPC response. Streaming methods yield an SSE frame stream instead.
//!
//! Envelope checks run in this order, each failing with its own code:
//!
//! 1. `jsonrpc` must be `"2.0"` (INVALID_REQUEST)
//! 2. `method` must be a non-empty string (INVALID_REQUEST)
//! 3. `id`, if present, must be a string, number or null (INVALID_REQUEST, id null)
//! 4. `params`, if present, must be an object (INVALID_PARAMS)

use futures::FutureExt;
use parley_core::{InMemoryStore, KvStore};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use crate::error::{A2aError, A2aResult, JsonRpcError};
use crate::events::{EventBus, EventBusManager};
use crate::executor::{AgentExecutor, CancellationRegistry};
use crate::store::{PushRegistry, TaskStore};
use crate::streaming::{FrameStream, StreamingCoordinator};
use crate::types::{
    AgentCard, JSONRPC_VERSION, JsonRpcResponse, MessageSendParams, PushConfigListParams,
    PushConfigTaskParams, RequestId, TaskIdParams, TaskPushNotificationConfig, TaskQueryParams,
};

/// Default number of SSE frames buffered per client.
pub const DEFAULT_SSE_BUFFER: usize = 16;

/// Every method the engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    MessageSend,
    MessageStream,
    TasksGet,
    TasksCancel,
    TasksResubscribe,
    PushConfigSet,
    PushConfigGet,
    PushConfigList,
    PushConfigDelete,
    GetAgentCard,
    GetAuthenticatedExtendedCard,
    Ping,
}

impl Method {
    /// All methods, in documentation order.
    pub const ALL: [Method; 12] = [
        Method::MessageSend,
        Method::MessageStream,
        Method::TasksGet,
        Method::TasksCancel,
        Method::TasksResubscribe,
        Method::PushConfigSet,
        Method::PushConfigGet,
        Method::PushConfigList,
        Method::PushConfigDelete,
        Method::GetAgentCard,
        Method::GetAuthenticatedExtendedCard,
        Method::Ping,
    ];

    /// Wire name of the method.
    pub fn as_str(self) -> &'static str {
        match self {
            Method::MessageSend => "message/send",
            Method::MessageStream => "message/stream",
            Method::TasksGet => "tasks/get",
            Method::TasksCancel => "tasks/cancel",
            Method::TasksResubscribe => "tasks/resubscribe",
            Method::PushConfigSet => "tasks/pushNotificationConfig/set",
            Method::PushConfigGet => "tasks/pushNotificationConfig/get",
            Method::PushConfigList => "tasks/pushNotificationConfig/list",
            Method::PushConfigDelete => "tasks/pushNotificationConfig/delete",
            Method::GetAgentCard => "get_agent_card",
            Method::GetAuthenticatedExtendedCard => "agent/getAuthenticatedExtendedCard",
            Method::Ping => "ping",
        }
    }

    /// Look up a method by wire name.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == name)
    }

    /// Whether the method answers with an SSE stream.
    pub fn is_streaming(self) -> bool {
        matches!(self, Method::MessageStream | Method::TasksResubscribe)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-call facts supplied by the transport.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallContext {
    /// Whether the caller passed the transport's authentication gate
    pub authenticated: bool,
}

impl CallContext {
    /// Context of an authenticated caller.
    pub fn authenticated() -> Self {
        Self {
            authenticated: true,
        }
    }
}

/// Result of dispatching one request.
pub enum DispatchOutcome {
    /// A single JSON-RPC response
    Response(JsonRpcResponse),
    /// SSE frames; the response body is the stream itself
    Stream(FrameStream),
}

impl DispatchOutcome {
    /// The response, if this outcome is not a stream.
    pub fn into_response(self) -> Option<JsonRpcResponse> {
        match self {
            DispatchOutcome::Response(response) => Some(response),
            DispatchOutcome::Stream(_) => None,
        }
    }

    /// The stream, if this outcome is one.
    pub fn into_stream(self) -> Option<FrameStream> {
        match self {
            DispatchOutcome::Stream(stream) => Some(stream),
            DispatchOutcome::Response(_) => None,
        }
    }
}

impl fmt::Debug for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchOutcome::Response(response) => f.debug_tuple("Response").field(response).finish(),
            DispatchOutcome::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

enum Handled {
    Value(Value),
    Stream(FrameStream),
}

/// Routes JSON-RPC requests to the task store, push registry and
/// streaming coordinator.
pub struct Dispatcher {
    tasks: Arc<TaskStore>,
    push: Arc<PushRegistry>,
    coordinator: Arc<StreamingCoordinator>,
    cancellations: Arc<CancellationRegistry>,
    executor: Arc<dyn AgentExecutor>,
    card: AgentCard,
    extended_card: Option<AgentCard>,
}

impl Dispatcher {
    /// Start building a dispatcher around `executor`.
    pub fn builder(executor: impl AgentExecutor) -> DispatcherBuilder {
        DispatcherBuilder::new(Arc::new(executor))
    }

    /// The task store.
    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    /// The push notification registry.
    pub fn push_registry(&self) -> &Arc<PushRegistry> {
        &self.push
    }

    /// The streaming coordinator.
    pub fn coordinator(&self) -> &Arc<StreamingCoordinator> {
        &self.coordinator
    }

    /// The public agent card.
    pub fn agent_card(&self) -> &AgentCard {
        &self.card
    }

    /// Decode a raw request body and dispatch it.
    pub async fn dispatch_str(&self, body: &str, ctx: CallContext) -> DispatchOutcome {
        match serde_json::from_str::<Value>(body) {
            Ok(request) => self.dispatch(request, ctx).await,
            Err(e) => {
                tracing::debug!(error = %e, "Unparseable request body");
                DispatchOutcome::Response(JsonRpcResponse::error(
                    RequestId::Null,
                    &A2aError::ParseError {
                        reason: e.to_string(),
                    },
                ))
            }
        }
    }

    /// Dispatch a decoded request.
    pub async fn dispatch(&self, request: Value, ctx: CallContext) -> DispatchOutcome {
        let (id, method, params) = match validate(request) {
            Ok(valid) => valid,
            Err((id, error)) => {
                tracing::debug!(id = %id, error = %error, "Rejected request envelope");
                return DispatchOutcome::Response(JsonRpcResponse::error(id, &error));
            }
        };
        tracing::debug!(method = %method, id = %id, "Dispatching request");

        let handled = AssertUnwindSafe(self.handle(method, params, &id, ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!(method = %method, "Handler panicked");
                Err(A2aError::internal_error("handler panicked"))
            });

        match handled {
            Ok(Handled::Value(result)) => {
                DispatchOutcome::Response(JsonRpcResponse::success(id, result))
            }
            Ok(Handled::Stream(stream)) => DispatchOutcome::Stream(stream),
            Err(e) => {
                if e.is_internal() {
                    tracing::error!(method = %method, error = %e, "Request failed");
                } else {
                    tracing::debug!(method = %method, error = %e, "Request rejected");
                }
                DispatchOutcome::Response(JsonRpcResponse::error(id, JsonRpcError::from(&e)))
            }
        }
    }

    async fn handle(
        &self,
        method: Method,
        params: Value,
        id: &RequestId,
        ctx: CallContext,
    ) -> A2aResult<Handled> {
        match method {
            Method::MessageSend => self.message_send(decode(method, params)?).await,
            Method::MessageStream => self.message_stream(decode(method, params)?, id),
            Method::TasksGet => self.tasks_get(decode(method, params)?),
            Method::TasksCancel => self.tasks_cancel(decode(method, params)?).await,
            Method::TasksResubscribe => self.tasks_resubscribe(decode(method, params)?, id),
            Method::PushConfigSet => self.push_set(decode(method, params)?),
            Method::PushConfigGet => self.push_get(decode(method, params)?),
            Method::PushConfigList => self.push_list(decode(method, params)?),
            Method::PushConfigDelete => self.push_delete(decode(method, params)?),
            Method::GetAgentCard => Ok(Handled::Value(serde_json::to_value(&self.card)?)),
            Method::GetAuthenticatedExtendedCard => self.extended_card(ctx),
            Method::Ping => Ok(Handled::Value(json!({ "status": "pong" }))),
        }
    }

    fn ensure_streaming(&self) -> A2aResult<()> {
        if self.card.capabilities.streaming {
            Ok(())
        } else {
            Err(A2aError::unsupported("streaming is not enabled for this agent"))
        }
    }

    fn ensure_push(&self) -> A2aResult<()> {
        if self.card.capabilities.push_notifications {
            Ok(())
        } else {
            Err(A2aError::PushNotificationNotSupported)
        }
    }

    fn check_inline_push(&self, params: &MessageSendParams) -> A2aResult<()> {
        match &params.configuration.push_notification_config {
            Some(config) => {
                self.ensure_push()?;
                config.validate()
            }
            None => Ok(()),
        }
    }

    fn register_inline_push(&self, task_id: &str, params: &MessageSendParams) -> A2aResult<()> {
        let Some(config) = &params.configuration.push_notification_config else {
            return Ok(());
        };
        if !self.push.set_config(task_id, config.clone())? {
            return Err(A2aError::internal_error("push notification config was not stored"));
        }
        Ok(())
    }

    async fn message_send(&self, params: MessageSendParams) -> A2aResult<Handled> {
        self.check_inline_push(&params)?;
        let history_length = params.configuration.history_length;
        let session = self.coordinator.prepare(params.clone())?;
        self.register_inline_push(session.task_id(), &params)?;
        let task = self.coordinator.run(session).await?;
        Ok(Handled::Value(serde_json::to_value(
            task.with_history_limit(history_length),
        )?))
    }

    fn message_stream(&self, params: MessageSendParams, id: &RequestId) -> A2aResult<Handled> {
        self.ensure_streaming()?;
        self.check_inline_push(&params)?;
        let session = self.coordinator.prepare(params.clone())?;
        self.register_inline_push(session.task_id(), &params)?;
        Ok(Handled::Stream(
            self.coordinator.spawn_stream(session, id.clone()),
        ))
    }

    fn tasks_get(&self, params: TaskQueryParams) -> A2aResult<Handled> {
        let task = self.tasks.require_task(&params.id)?;
        Ok(Handled::Value(serde_json::to_value(
            task.with_history_limit(params.history_length),
        )?))
    }

    async fn tasks_cancel(&self, params: TaskIdParams) -> A2aResult<Handled> {
        let task = self.tasks.cancel_task(&params.id)?;
        self.cancellations.cancel(&params.id);

        let bus = self
            .coordinator
            .buses()
            .get(&params.id)
            .unwrap_or_else(|| Arc::new(EventBus::new(&params.id)));
        if let Err(e) = self.executor.cancel(&params.id, &bus).await {
            tracing::warn!(task_id = %params.id, error = %e, "Executor cancel hook failed");
        }
        Ok(Handled::Value(serde_json::to_value(task)?))
    }

    fn tasks_resubscribe(&self, params: TaskIdParams, id: &RequestId) -> A2aResult<Handled> {
        self.ensure_streaming()?;
        Ok(Handled::Stream(
            self.coordinator.resubscribe(&params.id, id.clone())?,
        ))
    }

    fn push_set(&self, params: TaskPushNotificationConfig) -> A2aResult<Handled> {
        self.ensure_push()?;
        params.config.validate()?;
        if !self.push.set_config(&params.task_id, params.config.clone())? {
            return Err(A2aError::internal_error("push notification config was not stored"));
        }
        Ok(Handled::Value(serde_json::to_value(params)?))
    }

    fn push_get(&self, params: PushConfigTaskParams) -> A2aResult<Handled> {
        self.ensure_push()?;
        let config = self.push.get_config(&params.task_id)?;
        Ok(Handled::Value(serde_json::to_value(config)?))
    }

    fn push_list(&self, params: PushConfigListParams) -> A2aResult<Handled> {
        self.ensure_push()?;
        let configs = self.push.list_configs(params.task_id.as_deref())?;
        Ok(Handled::Value(serde_json::to_value(configs)?))
    }

    fn push_delete(&self, params: PushConfigTaskParams) -> A2aResult<Handled> {
        self.ensure_push()?;
        if !self.push.delete_config(&params.task_id)? {
            return Err(A2aError::PushConfigNotFound {
                task_id: params.task_id,
            });
        }
        Ok(Handled::Value(json!({ "taskId": params.task_id, "deleted": true })))
    }

    fn extended_card(&self, ctx: CallContext) -> A2aResult<Handled> {
        if !ctx.authenticated {
            return Err(A2aError::AuthenticationRequired);
        }
        let card = self
            .extended_card
            .as_ref()
            .ok_or(A2aError::ExtendedCardNotConfigured)?;
        Ok(Handled::Value(serde_json::to_value(card)?))
    }
}

/// Check the envelope and split it into id, method and params.
fn validate(request: Value) -> Result<(RequestId, Method, Value), (RequestId, A2aError)> {
    let Value::Object(mut envelope) = request else {
        return Err((
            RequestId::Null,
            A2aError::invalid_request("request must be a JSON object"),
        ));
    };
    let id = RequestId::from_value(envelope.get("id"));
    let echo = id.clone().unwrap_or_default();

    if envelope.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
        return Err((echo, A2aError::invalid_request("jsonrpc must be \"2.0\"")));
    }
    let name = match envelope.get("method").and_then(Value::as_str) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            return Err((
                echo,
                A2aError::invalid_request("method must be a non-empty string"),
            ));
        }
    };
    let Some(id) = id else {
        return Err((
            RequestId::Null,
            A2aError::invalid_request("id must be a string, number or null"),
        ));
    };
    let params = match envelope.remove("params") {
        None | Some(Value::Null) => Value::Object(Map::new()),
        Some(params @ Value::Object(_)) => params,
        Some(_) => {
            return Err((id, A2aError::invalid_params("params must be an object")));
        }
    };
    let Some(method) = Method::parse(&name) else {
        return Err((id, A2aError::MethodNotFound { method: name }));
    };
    Ok((id, method, params))
}

fn decode<P: DeserializeOwned>(method: Method, params: Value) -> A2aResult<P> {
    serde_json::from_value(params)
        .map_err(|e| A2aError::invalid_params(format!("{method}: {e}")))
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    executor: Arc<dyn AgentExecutor>,
    backend: Option<Arc<dyn KvStore>>,
    card: Option<AgentCard>,
    extended_card: Option<AgentCard>,
    sse_buffer: usize,
}

impl DispatcherBuilder {
    /// Create a builder around `executor`.
    pub fn new(executor: Arc<dyn AgentExecutor>) -> Self {
        Self {
            executor,
            backend: None,
            card: None,
            extended_card: None,
            sse_buffer: DEFAULT_SSE_BUFFER,
        }
    }

    /// Persist tasks and push configs in `backend` (default: in-memory).
    pub fn store(mut self, backend: Arc<dyn KvStore>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Public agent card (default: streaming and push notifications enabled).
    pub fn agent_card(mut self, card: AgentCard) -> Self {
        self.card = Some(card);
        self
    }

    /// Card served to authenticated callers.
    pub fn extended_card(mut self, card: AgentCard) -> Self {
        self.extended_card = Some(card);
        self
    }

    /// Frames buffered per streaming client.
    pub fn sse_buffer(mut self, frames: usize) -> Self {
        self.sse_buffer = frames;
        self
    }

    /// Wire up the stores, bus manager and coordinator.
    pub fn build(self) -> Dispatcher {
        let backend = self
            .backend
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let tasks = Arc::new(TaskStore::new(backend.clone()));
        let push = Arc::new(PushRegistry::new(backend, tasks.clone()));
        let cancellations = Arc::new(CancellationRegistry::new());
        let coordinator = Arc::new(StreamingCoordinator::new(
            tasks.clone(),
            Arc::new(EventBusManager::new()),
            cancellations.clone(),
            self.executor.clone(),
            self.sse_buffer,
        ));

        let card = self.card.unwrap_or_else(|| {
            AgentCard::new("Parley Reference Agent", "http://localhost:8080")
                .with_streaming(true)
                .with_push_notifications(true)
        });
        let card = card.with_extended_card(self.extended_card.is_some());

        Dispatcher {
            tasks,
            push,
            coordinator,
            cancellations,
            executor: self.executor,
            card,
            extended_card: self.extended_card,
        }
    }
}
