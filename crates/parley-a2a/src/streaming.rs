//! Bridges `message/send` and `message/stream` requests to executor runs.
//!
//! A run owns its task's event bus for its whole duration. Two subscribers
//! are attached in this order: one mirroring every event into the
//! [`TaskStore`], one turning events into SSE frames for the client. The
//! frame channel is bounded, so a slow client slows the executor down.

use async_trait::async_trait;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::error::{A2aError, A2aResult, JsonRpcError};
use crate::events::{BusLease, EventBusManager, EventSubscriber};
use crate::executor::{AgentExecutor, CancellationRegistry, RequestContext};
use crate::store::TaskStore;
use crate::types::{Event, JsonRpcResponse, MessageSendParams, RequestId, Task, TaskState};

/// Description given to tasks created implicitly by an inbound message.
pub const PLACEHOLDER_DESCRIPTION: &str = "Task created from inbound message";

/// Stream of SSE frames produced by a run or a resubscription.
pub type FrameStream = ReceiverStream<SseFrame>;

/// One Server-Sent-Events frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SseFrame {
    /// Event name, `None` for plain data frames
    pub event: Option<String>,

    /// JSON payload
    pub data: String,
}

impl SseFrame {
    /// Frame carrying a JSON-RPC success response for `result`.
    pub fn result(id: &RequestId, result: Value) -> Self {
        Self::encode(None, &JsonRpcResponse::success(id.clone(), result))
    }

    /// `error` frame carrying a JSON-RPC error response.
    pub fn error(id: &RequestId, error: &A2aError) -> Self {
        Self::encode(
            Some("error"),
            &JsonRpcResponse::error(id.clone(), JsonRpcError::from(error)),
        )
    }

    fn encode(event: Option<&str>, response: &JsonRpcResponse) -> Self {
        let data = serde_json::to_string(response).unwrap_or_else(|e| {
            format!(
                r#"{{"jsonrpc":"2.0","id":null,"error":{{"code":-32603,"message":"Internal error: {e}"}}}}"#
            )
        });
        Self {
            event: event.map(str::to_owned),
            data,
        }
    }

    /// Wire form: optional `event:` line, `data:` line, blank line.
    pub fn to_wire(&self) -> String {
        match &self.event {
            Some(event) => format!("event: {event}\ndata: {}\n\n", self.data),
            None => format!("data: {}\n\n", self.data),
        }
    }
}

/// Mirrors bus events into the task store.
struct SyncSubscriber {
    tasks: Arc<TaskStore>,
}

#[async_trait]
impl EventSubscriber for SyncSubscriber {
    async fn on_event(&self, event: &Event) -> A2aResult<()> {
        let task_id = event.task_id();
        let applied = match event {
            Event::Task(snapshot) => self.tasks.modify_task(task_id, |task| {
                task.status = snapshot.status.clone();
                task.history = snapshot.history.clone();
                task.artifacts = snapshot.artifacts.clone();
                task.metadata.extend(snapshot.metadata.clone());
                Ok(())
            }),
            Event::StatusUpdate(update) => self.tasks.modify_task(task_id, |task| {
                task.status = update.status.clone();
                if let Some(message) = &update.status.message {
                    task.add_message(message.clone());
                }
                task.metadata.extend(update.metadata.clone());
                Ok(())
            }),
            Event::ArtifactUpdate(update) => self.tasks.modify_task(task_id, |task| {
                task.apply_artifact_update(update);
                Ok(())
            }),
        };
        match applied {
            Ok(_) => Ok(()),
            Err(e @ A2aError::InvalidStateTransition { .. }) => {
                tracing::warn!(task_id = %task_id, error = %e, "Ignoring event for terminal task");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Forwards bus events to a client as SSE frames.
struct SseSubscriber {
    request_id: RequestId,
    sink: mpsc::Sender<SseFrame>,
    disconnected: AtomicBool,
}

impl SseSubscriber {
    fn new(request_id: RequestId, sink: mpsc::Sender<SseFrame>) -> Self {
        Self {
            request_id,
            sink,
            disconnected: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl EventSubscriber for SseSubscriber {
    async fn on_event(&self, event: &Event) -> A2aResult<()> {
        if self.disconnected.load(Ordering::Relaxed) {
            return Ok(());
        }
        let frame = SseFrame::result(&self.request_id, serde_json::to_value(event)?);
        if self.sink.send(frame).await.is_err() && !self.disconnected.swap(true, Ordering::Relaxed) {
            tracing::warn!(
                task_id = %event.task_id(),
                "Stream client disconnected; execution continues"
            );
        }
        Ok(())
    }
}

/// A prepared run: the task exists, the inbound message is in its history
/// and the bus is leased.
pub struct Session {
    ctx: RequestContext,
    lease: BusLease,
}

impl Session {
    /// Task the session runs.
    pub fn task_id(&self) -> &str {
        &self.ctx.task_id
    }

    /// Context of the run.
    pub fn context(&self) -> &RequestContext {
        &self.ctx
    }
}

/// Runs executors against leased event buses.
pub struct StreamingCoordinator {
    tasks: Arc<TaskStore>,
    buses: Arc<EventBusManager>,
    cancellations: Arc<CancellationRegistry>,
    executor: Arc<dyn AgentExecutor>,
    buffer: usize,
}

impl StreamingCoordinator {
    /// Create a coordinator. `buffer` bounds the number of frames queued
    /// for a client.
    pub fn new(
        tasks: Arc<TaskStore>,
        buses: Arc<EventBusManager>,
        cancellations: Arc<CancellationRegistry>,
        executor: Arc<dyn AgentExecutor>,
        buffer: usize,
    ) -> Self {
        Self {
            tasks,
            buses,
            cancellations,
            executor,
            buffer: buffer.max(1),
        }
    }

    /// Prepare a run for an inbound message.
    ///
    /// Stamps missing task and context ids onto the message, leases the bus,
    /// fetches or creates the task, appends the message and persists it.
    /// Terminal tasks are refused with `UnsupportedOperation`.
    pub fn prepare(&self, params: MessageSendParams) -> A2aResult<Session> {
        let MessageSendParams {
            mut message,
            from,
            metadata,
            ..
        } = params;

        let task_id = message
            .task_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let lease = self.buses.lease(&task_id)?;

        let requested_context = message
            .context_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let (task, created) =
            self.tasks
                .get_or_create(&task_id, &requested_context, PLACEHOLDER_DESCRIPTION)?;
        if task.is_terminal() {
            return Err(A2aError::task_terminated(&task.id, task.state()));
        }

        message.task_id = Some(task_id.clone());
        message.context_id = Some(task.context_id.clone());

        let updated = self.tasks.modify_task(&task_id, |task| {
            task.add_message(message.clone());
            task.metadata.extend(metadata);
            if let Some(from) = from {
                task.metadata.insert("from".to_string(), Value::String(from));
            }
            Ok(())
        })?;

        let reference_tasks = message
            .reference_task_ids
            .iter()
            .filter_map(|id| self.tasks.get_task(id).ok().flatten())
            .collect();

        tracing::debug!(task_id = %task_id, created, "Run prepared");
        Ok(Session {
            ctx: RequestContext {
                message,
                task_id: task_id.clone(),
                context_id: updated.context_id,
                existing_task: (!created).then_some(task),
                reference_tasks,
                cancellation: self.cancellations.token_for(&task_id),
            },
            lease,
        })
    }

    /// Run a prepared session to completion without a client stream and
    /// return the resulting task.
    pub async fn run(&self, session: Session) -> A2aResult<Task> {
        let task_id = session.ctx.task_id.clone();
        let outcome = AssertUnwindSafe(self.drive(session, None))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(A2aError::internal_error("executor panicked")));
        match outcome {
            Ok(()) => self.tasks.require_task(&task_id),
            Err(e) => {
                self.mark_failed(&task_id, &e);
                Err(e)
            }
        }
    }

    /// Run a prepared session in the background, streaming every event.
    ///
    /// The stream ends after the final event. If the run fails, the bus is
    /// released first and one `error` frame ends the stream.
    pub fn spawn_stream(self: &Arc<Self>, session: Session, request_id: RequestId) -> FrameStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let task_id = session.ctx.task_id.clone();
            let sink = Some((request_id.clone(), tx.clone()));
            let outcome = AssertUnwindSafe(this.drive(session, sink))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(A2aError::internal_error("executor panicked")));
            match outcome {
                Ok(()) => tracing::info!(task_id = %task_id, "Stream finished"),
                Err(e) => {
                    this.mark_failed(&task_id, &e);
                    let _ = tx.send(SseFrame::error(&request_id, &e)).await;
                }
            }
        });
        ReceiverStream::new(rx)
    }

    async fn drive(
        &self,
        session: Session,
        sink: Option<(RequestId, mpsc::Sender<SseFrame>)>,
    ) -> A2aResult<()> {
        let Session { ctx, lease } = session;
        let bus = lease.bus().clone();
        let task_id = ctx.task_id.clone();

        bus.subscribe(Arc::new(SyncSubscriber {
            tasks: self.tasks.clone(),
        }));
        if let Some((request_id, sink)) = sink {
            bus.subscribe(Arc::new(SseSubscriber::new(request_id, sink)));
        }

        let result = self.executor.execute(ctx, &bus).await;
        let sealed = bus.is_sealed();
        drop(lease);

        // Nothing may follow the final event, so late failures are only logged.
        match result {
            Err(e) if sealed => {
                tracing::error!(task_id = %task_id, error = %e, "Executor failed after its final event");
                Ok(())
            }
            Err(e) => Err(e),
            Ok(()) if !sealed => Err(A2aError::invalid_agent_response(format!(
                "executor returned without a final event for task '{task_id}'"
            ))),
            Ok(()) => Ok(()),
        }
    }

    fn mark_failed(&self, task_id: &str, error: &A2aError) {
        tracing::error!(task_id = %task_id, error = %error, "Run failed");
        let marked = self.tasks.modify_task(task_id, |task| {
            if !task.is_terminal() {
                task.set_state(TaskState::Failed);
            }
            Ok(())
        });
        if let Err(e) = marked {
            tracing::error!(task_id = %task_id, error = %e, "Failed to mark task as failed");
        }
    }

    /// Stream the current snapshot of `task_id`, then the live events of
    /// its active run, if any, until that run releases its bus.
    pub fn resubscribe(&self, task_id: &str, request_id: RequestId) -> A2aResult<FrameStream> {
        let task = self.tasks.require_task(task_id)?;
        let (tx, rx) = mpsc::channel(self.buffer);
        tx.try_send(SseFrame::result(&request_id, serde_json::to_value(Event::from(task.clone()))?))
            .map_err(|e| A2aError::internal_error(format!("resubscribe channel: {e}")))?;

        match self.buses.get(task_id) {
            Some(bus) if !task.is_terminal() && !bus.is_sealed() => {
                tracing::debug!(task_id = %task_id, "Resubscribed to live stream");
                bus.subscribe(Arc::new(SseSubscriber::new(request_id, tx)));
            }
            _ => tracing::debug!(task_id = %task_id, "Resubscribed to idle task"),
        }
        Ok(ReceiverStream::new(rx))
    }

    /// The task store runs write into.
    pub fn tasks(&self) -> &Arc<TaskStore> {
        &self.tasks
    }

    /// The bus manager runs lease from.
    pub fn buses(&self) -> &Arc<EventBusManager> {
        &self.buses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::ReferenceExecutor;
    use crate::types::{Message, TaskStatusUpdateEvent};
    use futures::StreamExt;
    use std::time::Duration;

    fn coordinator(executor: Arc<dyn AgentExecutor>) -> Arc<StreamingCoordinator> {
        Arc::new(StreamingCoordinator::new(
            Arc::new(TaskStore::in_memory()),
            Arc::new(EventBusManager::new()),
            Arc::new(CancellationRegistry::new()),
            executor,
            4,
        ))
    }

    fn reference() -> Arc<dyn AgentExecutor> {
        Arc::new(ReferenceExecutor::new(Duration::ZERO))
    }

    #[test]
    fn frames_use_sse_wire_format() {
        let frame = SseFrame::result(&RequestId::from(1), serde_json::json!({"a": 1}));
        assert_eq!(
            frame.to_wire(),
            "data: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"a\":1}}\n\n"
        );
        let error = SseFrame::error(&RequestId::from(1), &A2aError::internal_error("x"));
        assert!(error.to_wire().starts_with("event: error\ndata: "));
    }

    #[tokio::test]
    async fn stream_stamps_ids_and_syncs_store() {
        let coordinator = coordinator(reference());
        let session = coordinator
            .prepare(MessageSendParams::new(Message::user("hi")))
            .unwrap();
        let task_id = session.task_id().to_string();
        assert_eq!(session.context().message.task_id.as_deref(), Some(task_id.as_str()));

        let frames: Vec<SseFrame> = coordinator
            .spawn_stream(session, RequestId::from("req-1"))
            .collect()
            .await;
        assert!(frames.iter().all(|f| f.event.is_none()));
        let last: Value = serde_json::from_str(&frames.last().unwrap().data).unwrap();
        assert_eq!(last["id"], "req-1");
        assert_eq!(last["result"]["final"], true);

        let task = coordinator.tasks().require_task(&task_id).unwrap();
        assert_eq!(task.state(), TaskState::Completed);
        assert_eq!(task.artifacts.len(), 1);
        assert!(coordinator.buses().is_empty());
    }

    struct Silent;

    #[async_trait]
    impl AgentExecutor for Silent {
        async fn execute(&self, ctx: RequestContext, bus: &crate::events::EventBus) -> A2aResult<()> {
            bus.publish(ctx.status(TaskState::Working, false)).await
        }
    }

    #[tokio::test]
    async fn missing_final_event_is_an_error_frame() {
        let coordinator = coordinator(Arc::new(Silent));
        let session = coordinator
            .prepare(MessageSendParams::new(Message::user("hi")))
            .unwrap();
        let task_id = session.task_id().to_string();
        let frames: Vec<SseFrame> = coordinator
            .spawn_stream(session, RequestId::from(7))
            .collect()
            .await;

        let last = frames.last().unwrap();
        assert_eq!(last.event.as_deref(), Some("error"));
        let body: Value = serde_json::from_str(&last.data).unwrap();
        assert_eq!(body["error"]["code"], -32006);
        assert!(coordinator.buses().is_empty());
        assert_eq!(
            coordinator.tasks().require_task(&task_id).unwrap().state(),
            TaskState::Failed
        );
    }

    struct FailsAfterFinal;

    #[async_trait]
    impl AgentExecutor for FailsAfterFinal {
        async fn execute(&self, ctx: RequestContext, bus: &crate::events::EventBus) -> A2aResult<()> {
            bus.publish(ctx.status(TaskState::Completed, true)).await?;
            Err(A2aError::internal_error("late failure"))
        }
    }

    #[tokio::test]
    async fn failure_after_final_event_adds_no_frame() {
        let coordinator = coordinator(Arc::new(FailsAfterFinal));
        let session = coordinator
            .prepare(MessageSendParams::new(Message::user("hi")))
            .unwrap();
        let task_id = session.task_id().to_string();
        let frames: Vec<SseFrame> = coordinator
            .spawn_stream(session, RequestId::from(8))
            .collect()
            .await;

        assert_eq!(frames.len(), 1);
        assert!(frames[0].event.is_none());
        let body: Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(body["result"]["final"], true);
        assert_eq!(body["result"]["status"]["state"], "completed");
        assert_eq!(
            coordinator.tasks().require_task(&task_id).unwrap().state(),
            TaskState::Completed
        );
        assert!(coordinator.buses().is_empty());
    }

    struct Panicking;

    #[async_trait]
    impl AgentExecutor for Panicking {
        async fn execute(&self, _ctx: RequestContext, _bus: &crate::events::EventBus) -> A2aResult<()> {
            panic!("agent bug")
        }
    }

    #[tokio::test]
    async fn panics_release_the_bus() {
        let coordinator = coordinator(Arc::new(Panicking));
        let session = coordinator
            .prepare(MessageSendParams::new(Message::user("hi")))
            .unwrap();
        let err = coordinator.run(session).await.unwrap_err();
        assert!(err.is_internal());
        assert!(coordinator.buses().is_empty());
    }

    #[tokio::test]
    async fn terminal_tasks_are_refused() {
        let coordinator = coordinator(reference());
        let task = coordinator
            .tasks()
            .create_task("demo", Default::default(), Some("t1".into()))
            .unwrap();
        coordinator.tasks().cancel_task(&task.id).unwrap();

        let message = Message::user("again").with_task("t1", task.context_id);
        let err = coordinator
            .prepare(MessageSendParams::new(message))
            .err()
            .unwrap();
        assert!(matches!(err, A2aError::TaskTerminated { .. }));
        assert!(coordinator.buses().is_empty());
    }

    #[tokio::test]
    async fn late_events_for_canceled_task_are_ignored() {
        let coordinator = coordinator(reference());
        let task = coordinator
            .tasks()
            .create_task("demo", Default::default(), Some("t1".into()))
            .unwrap();
        coordinator.tasks().cancel_task("t1").unwrap();

        let sync = SyncSubscriber {
            tasks: coordinator.tasks().clone(),
        };
        let late = TaskStatusUpdateEvent::terminal("t1", task.context_id, TaskState::Completed);
        sync.on_event(&Event::from(late)).await.unwrap();
        assert_eq!(
            coordinator.tasks().require_task("t1").unwrap().state(),
            TaskState::Canceled
        );
    }

    #[tokio::test]
    async fn resubscribe_to_idle_task_yields_snapshot() {
        let coordinator = coordinator(reference());
        coordinator
            .tasks()
            .create_task("demo", Default::default(), Some("t1".into()))
            .unwrap();
        let frames: Vec<SseFrame> = coordinator
            .resubscribe("t1", RequestId::from(3))
            .unwrap()
            .collect()
            .await;
        assert_eq!(frames.len(), 1);
        let body: Value = serde_json::from_str(&frames[0].data).unwrap();
        assert_eq!(body["result"]["kind"], "task");
        assert!(matches!(
            coordinator.resubscribe("nope", RequestId::Null),
            Err(A2aError::TaskNotFound { .. })
        ));
    }
}
