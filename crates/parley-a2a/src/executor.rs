//! Agent execution boundary and the reference executor.
//!
//! An [`AgentExecutor`] performs the agent's actual work for one request and
//! reports progress exclusively by publishing events on the task's
//! [`EventBus`]. Every run ends with exactly one final status update.
//!
//! Cancellation is cooperative. `tasks/cancel` trips the task's
//! [`CancellationToken`]; executors observe it at their own checkpoints and
//! finish with a `canceled` final event.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_a2a::executor::{AgentExecutor, RequestContext};
//! use parley_a2a::events::EventBus;
//! use parley_a2a::types::{TaskState, TaskStatusUpdateEvent};
//! use parley_a2a::A2aResult;
//!
//! struct Done;
//!
//! #[async_trait::async_trait]
//! impl AgentExecutor for Done {
//!     async fn execute(&self, ctx: RequestContext, bus: &EventBus) -> A2aResult<()> {
//!         bus.publish(TaskStatusUpdateEvent::terminal(&ctx.task_id, &ctx.context_id, TaskState::Completed))
//!             .await
//!     }
//! }
//! ```

use async_trait::async_trait;
use dashmap::DashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::A2aResult;
use crate::events::EventBus;
use crate::types::{
    Artifact, Message, Task, TaskArtifactUpdateEvent, TaskState, TaskStatus,
    TaskStatusUpdateEvent,
};

/// Everything an executor needs for one run. Lives for that run only.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// The inbound message, stamped with task and context ids
    pub message: Message,

    /// Task being worked on
    pub task_id: String,

    /// Context of the task
    pub context_id: String,

    /// The task as it was before this request, `None` when it was just created
    pub existing_task: Option<Task>,

    /// Tasks listed in the message's `referenceTaskIds` that exist
    pub reference_tasks: Vec<Task>,

    /// Tripped when cancellation of the task is requested
    pub cancellation: CancellationToken,
}

impl RequestContext {
    /// Whether cancellation has been requested for this task.
    pub fn is_canceled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Status update for this task.
    pub fn status(&self, state: TaskState, is_final: bool) -> TaskStatusUpdateEvent {
        TaskStatusUpdateEvent::new(
            &self.task_id,
            &self.context_id,
            TaskStatus::new(state),
            is_final,
        )
    }
}

/// Pluggable agent logic.
#[async_trait]
pub trait AgentExecutor: Send + Sync + 'static {
    /// Run the agent for one request.
    ///
    /// Must publish a task snapshot first when `ctx.existing_task` is `None`,
    /// then status updates as the state changes, and finally exactly one
    /// status update with `final` set. Nothing may be published after it.
    async fn execute(&self, ctx: RequestContext, bus: &EventBus) -> A2aResult<()>;

    /// Hook invoked when cancellation of `task_id` is requested.
    ///
    /// The intent is already recorded on the task's token when this runs.
    /// `bus` is the live bus of a running stream, or a detached bus.
    async fn cancel(&self, task_id: &str, _bus: &EventBus) -> A2aResult<()> {
        tracing::debug!(task_id = %task_id, "Cancellation recorded");
        Ok(())
    }
}

/// Cancellation intent per task id.
///
/// Intent survives the run that was active when it was recorded, so the next
/// run for the same task observes it as well.
#[derive(Default)]
pub struct CancellationRegistry {
    tokens: DashMap<String, CancellationToken>,
}

impl CancellationRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Token of `task_id`, created on first use.
    pub fn token_for(&self, task_id: &str) -> CancellationToken {
        self.tokens
            .entry(task_id.to_string())
            .or_default()
            .value()
            .clone()
    }

    /// Record cancellation intent for `task_id`.
    pub fn cancel(&self, task_id: &str) {
        self.token_for(task_id).cancel();
    }

    /// Whether cancellation was requested for `task_id`.
    pub fn is_canceled(&self, task_id: &str) -> bool {
        self.tokens
            .get(task_id)
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Echo agent used for conformance testing.
///
/// Publishes a snapshot for new tasks, moves to `working`, simulates bounded
/// work, echoes the request text as an artifact and completes. A tripped
/// token at any checkpoint ends the run with `canceled`.
#[derive(Debug, Clone)]
pub struct ReferenceExecutor {
    work: Duration,
}

impl ReferenceExecutor {
    /// Create an executor simulating `work` of processing per request.
    pub fn new(work: Duration) -> Self {
        Self { work }
    }

    async fn run(&self, ctx: &RequestContext, bus: &EventBus) -> A2aResult<TaskState> {
        if ctx.existing_task.is_none() {
            let mut snapshot = Task::new(&ctx.task_id, &ctx.context_id);
            snapshot.add_message(ctx.message.clone());
            bus.publish(snapshot).await?;
        }

        bus.publish(ctx.status(TaskState::Working, false)).await?;
        if ctx.is_canceled() {
            return Ok(TaskState::Canceled);
        }

        tokio::select! {
            _ = ctx.cancellation.cancelled() => return Ok(TaskState::Canceled),
            _ = tokio::time::sleep(self.work) => {}
        }

        let echo = Artifact::text("echo", ctx.message.text()).with_name("echo");
        bus.publish(TaskArtifactUpdateEvent::new(&ctx.task_id, &ctx.context_id, echo))
            .await?;

        if ctx.is_canceled() {
            return Ok(TaskState::Canceled);
        }
        Ok(TaskState::Completed)
    }
}

impl Default for ReferenceExecutor {
    fn default() -> Self {
        Self::new(Duration::from_millis(50))
    }
}

#[async_trait]
impl AgentExecutor for ReferenceExecutor {
    async fn execute(&self, ctx: RequestContext, bus: &EventBus) -> A2aResult<()> {
        let state = match self.run(&ctx, bus).await {
            Ok(state) => state,
            Err(e) if bus.is_sealed() => return Err(e),
            Err(e) => {
                tracing::error!(task_id = %ctx.task_id, error = %e, "Reference executor failed");
                TaskState::Failed
            }
        };

        let reply = match state {
            TaskState::Completed => Message::agent(format!("echo: {}", ctx.message.text())),
            TaskState::Canceled => Message::agent("task canceled"),
            _ => Message::agent("task failed"),
        }
        .with_task(&ctx.task_id, &ctx.context_id);

        tracing::info!(task_id = %ctx.task_id, state = %state, "Reference executor finished");
        bus.publish(TaskStatusUpdateEvent::new(
            &ctx.task_id,
            &ctx.context_id,
            TaskStatus::new(state).with_message(reply),
            true,
        ))
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::FnSubscriber;
    use crate::types::Event;
    use std::sync::{Arc, Mutex};

    fn context(existing: Option<Task>, token: CancellationToken) -> RequestContext {
        RequestContext {
            message: Message::user("hello").with_task("t1", "c1"),
            task_id: "t1".into(),
            context_id: "c1".into(),
            existing_task: existing,
            reference_tasks: Vec::new(),
            cancellation: token,
        }
    }

    fn recorded(bus: &EventBus) -> Arc<Mutex<Vec<Event>>> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        bus.subscribe(Arc::new(FnSubscriber(move |event: &Event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        })));
        events
    }

    fn states(events: &[Event]) -> Vec<String> {
        events
            .iter()
            .map(|event| match event {
                Event::Task(task) => task.state().to_string(),
                Event::StatusUpdate(update) => update.status.state.to_string(),
                Event::ArtifactUpdate(_) => "artifact".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn new_task_runs_to_completion() {
        let bus = EventBus::new("t1");
        let events = recorded(&bus);
        ReferenceExecutor::new(Duration::ZERO)
            .execute(context(None, CancellationToken::new()), &bus)
            .await
            .unwrap();

        let events = events.lock().unwrap();
        assert_eq!(states(&events), vec!["submitted", "working", "artifact", "completed"]);
        assert_eq!(events.iter().filter(|e| e.is_final()).count(), 1);
        assert!(events.last().unwrap().is_final());
    }

    #[tokio::test]
    async fn existing_task_skips_snapshot() {
        let bus = EventBus::new("t1");
        let events = recorded(&bus);
        ReferenceExecutor::new(Duration::ZERO)
            .execute(
                context(Some(Task::new("t1", "c1")), CancellationToken::new()),
                &bus,
            )
            .await
            .unwrap();
        assert_eq!(
            states(&events.lock().unwrap()),
            vec!["working", "artifact", "completed"]
        );
    }

    #[tokio::test]
    async fn recorded_intent_is_honored() {
        let registry = CancellationRegistry::new();
        registry.cancel("t1");
        assert!(registry.is_canceled("t1"));

        let bus = EventBus::new("t1");
        let events = recorded(&bus);
        ReferenceExecutor::new(Duration::from_secs(60))
            .execute(context(None, registry.token_for("t1")), &bus)
            .await
            .unwrap();
        assert_eq!(
            states(&events.lock().unwrap()),
            vec!["submitted", "working", "canceled"]
        );
    }

    #[tokio::test]
    async fn cancel_during_work_ends_canceled() {
        let token = CancellationToken::new();
        let bus = Arc::new(EventBus::new("t1"));
        let events = recorded(&bus);

        let run = {
            let bus = bus.clone();
            let ctx = context(None, token.clone());
            tokio::spawn(async move {
                ReferenceExecutor::new(Duration::from_secs(60))
                    .execute(ctx, &bus)
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        token.cancel();
        run.await.unwrap().unwrap();

        let events = events.lock().unwrap();
        assert_eq!(states(&events).last().map(String::as_str), Some("canceled"));
    }
}
