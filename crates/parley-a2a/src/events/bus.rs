//! Per-task publish/subscribe channel.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::{A2aError, A2aResult};
use crate::types::Event;

/// Receives every event published on a bus it is subscribed to.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Handle one event. An error aborts the publish that delivered it.
    async fn on_event(&self, event: &Event) -> A2aResult<()>;
}

/// Subscriber backed by a synchronous closure.
pub struct FnSubscriber<F>(pub F);

#[async_trait]
impl<F> EventSubscriber for FnSubscriber<F>
where
    F: Fn(&Event) -> A2aResult<()> + Send + Sync,
{
    async fn on_event(&self, event: &Event) -> A2aResult<()> {
        (self.0)(event)
    }
}

/// Event bus for one task.
///
/// `publish` delivers to every subscriber in registration order and returns
/// only after the last one finished, so a slow subscriber slows the
/// publisher. Concurrent publishers are serialised. The bus seals itself
/// once a final event went through; publishing afterwards is an error.
pub struct EventBus {
    task_id: String,
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
    publish_lock: tokio::sync::Mutex<()>,
    sealed: AtomicBool,
}

impl EventBus {
    /// Create an empty bus for `task_id`.
    pub fn new(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            subscribers: RwLock::new(Vec::new()),
            publish_lock: tokio::sync::Mutex::new(()),
            sealed: AtomicBool::new(false),
        }
    }

    /// Task this bus carries events for.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Register a subscriber after all existing ones.
    pub fn subscribe(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(subscriber);
    }

    /// Drop every subscriber. Later publishes reach nobody until a new
    /// subscription is made.
    pub fn unsubscribe(&self) {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether a final event has been published.
    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Deliver `event` to every subscriber, in registration order.
    pub async fn publish(&self, event: impl Into<Event>) -> A2aResult<()> {
        let event = event.into();
        let _guard = self.publish_lock.lock().await;

        if self.is_sealed() {
            return Err(A2aError::invalid_agent_response(format!(
                "{} event published after the final event of task '{}'",
                event.kind(),
                self.task_id
            )));
        }
        if event.task_id() != self.task_id {
            tracing::warn!(
                task_id = %self.task_id,
                event_task_id = %event.task_id(),
                "Dropping event addressed to another task"
            );
            return Ok(());
        }

        let subscribers: Vec<_> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        tracing::debug!(
            task_id = %self.task_id,
            kind = event.kind(),
            subscribers = subscribers.len(),
            "Publishing event"
        );

        if event.is_final() {
            self.sealed.store(true, Ordering::Release);
        }
        for subscriber in subscribers {
            subscriber.on_event(&event).await?;
        }
        Ok(())
    }
}
