//! Authoritative task storage with lifecycle enforcement.

use parley_core::{InMemoryStore, KvStore};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use super::cache::WriteThroughCache;
use crate::error::{A2aError, A2aResult};
use crate::types::{Task, TaskState, record};

const NAMESPACE: &str = "task";

/// Metadata key holding the description passed to [`TaskStore::create_task`].
pub const DESCRIPTION_KEY: &str = "description";

/// Owns every [`Task`].
///
/// Tasks are persisted as versioned records through a write-through cache.
/// Each mutation is an atomic read-modify-write on one task id; concurrent
/// updates to the same id are last-write-wins. Tasks are never deleted.
pub struct TaskStore {
    cache: WriteThroughCache<Task>,
}

impl TaskStore {
    /// Create a task store on top of `backend`.
    pub fn new(backend: Arc<dyn KvStore>) -> Self {
        Self {
            cache: WriteThroughCache::with_codec(NAMESPACE, backend, encode, decode),
        }
    }

    /// Create a task store backed by a fresh [`InMemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStore::new()))
    }

    /// Create and persist a new submitted task.
    ///
    /// The id is `id` or a fresh UUID; the context id is taken from
    /// `context["contextId"]` or generated. `context` plus the description
    /// become the task metadata. Fails if the id is already taken.
    pub fn create_task(
        &self,
        description: &str,
        context: HashMap<String, Value>,
        id: Option<String>,
    ) -> A2aResult<Task> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let context_id = context
            .get("contextId")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let mut task = Task::new(id.clone(), context_id);
        task.metadata = context;
        task.metadata
            .insert(DESCRIPTION_KEY.to_string(), Value::String(description.to_string()));

        let created = self.cache.update(&id, |current| match current {
            Some(_) => Err(A2aError::invalid_params(format!("task '{id}' already exists"))),
            None => Ok(Some(task)),
        })?;
        tracing::info!(task_id = %id, "Task created");
        created.ok_or_else(|| A2aError::internal_error("task creation was not persisted"))
    }

    /// Fetch `id`, creating it in one atomic step when absent.
    ///
    /// Returns the task and whether it was created by this call.
    pub fn get_or_create(
        &self,
        id: &str,
        context_id: &str,
        description: &str,
    ) -> A2aResult<(Task, bool)> {
        let mut existing = None;
        let created = self.cache.update(id, |current| match current {
            Some(task) => {
                existing = Some(task.clone());
                Ok(None)
            }
            None => {
                let mut task = Task::new(id, context_id);
                task.metadata
                    .insert(DESCRIPTION_KEY.to_string(), Value::String(description.to_string()));
                Ok(Some(task))
            }
        })?;
        match (created, existing) {
            (Some(task), _) => {
                tracing::info!(task_id = %id, "Task created");
                Ok((task, true))
            }
            (None, Some(task)) => Ok((task, false)),
            (None, None) => Err(A2aError::internal_error("task lookup yielded nothing")),
        }
    }

    /// Look up a task.
    pub fn get_task(&self, id: &str) -> A2aResult<Option<Task>> {
        self.cache.get(id)
    }

    /// Look up a task, failing with `TaskNotFound` when absent.
    pub fn require_task(&self, id: &str) -> A2aResult<Task> {
        self.get_task(id)?.ok_or_else(|| A2aError::task_not_found(id))
    }

    /// Whether a task with `id` exists.
    pub fn task_exists(&self, id: &str) -> A2aResult<bool> {
        self.cache.contains(id)
    }

    /// Replace the stored task with `task`.
    ///
    /// The caller supplies the whole next value. A task whose stored state is
    /// terminal keeps that state: any update that would change it is rejected.
    pub fn update_task(&self, task: Task) -> A2aResult<Task> {
        let id = task.id.clone();
        let next_state = task.state();
        let stored = self.cache.update(&id, |current| match current {
            None => Err(A2aError::task_not_found(&id)),
            Some(current) if current.is_terminal() && current.state() != next_state => {
                Err(A2aError::InvalidStateTransition {
                    task_id: id.clone(),
                    from: current.state(),
                    to: next_state,
                })
            }
            Some(_) => Ok(Some(task)),
        });
        match stored {
            Ok(Some(task)) => {
                tracing::debug!(task_id = %id, state = %task.state(), "Task updated");
                Ok(task)
            }
            Ok(None) => Err(A2aError::internal_error("task update was not persisted")),
            Err(e) => {
                if matches!(e, A2aError::InvalidStateTransition { .. }) {
                    tracing::warn!(task_id = %id, error = %e, "Rejected task update");
                }
                Err(e)
            }
        }
    }

    /// Apply `f` to the stored task and persist the result atomically.
    pub fn modify_task<F>(&self, id: &str, f: F) -> A2aResult<Task>
    where
        F: FnOnce(&mut Task) -> A2aResult<()>,
    {
        self.cache
            .update(id, |current| {
                let current = current.ok_or_else(|| A2aError::task_not_found(id))?;
                let mut next = current.clone();
                f(&mut next)?;
                if current.is_terminal() && next.state() != current.state() {
                    return Err(A2aError::InvalidStateTransition {
                        task_id: id.to_string(),
                        from: current.state(),
                        to: next.state(),
                    });
                }
                Ok(Some(next))
            })?
            .ok_or_else(|| A2aError::internal_error("task update was not persisted"))
    }

    /// Move a task to `canceled`.
    ///
    /// Fails with `TaskNotFound` for an unknown id and `TaskNotCancelable`
    /// when the task already reached a terminal state.
    pub fn cancel_task(&self, id: &str) -> A2aResult<Task> {
        let canceled = self
            .cache
            .update(id, |current| match current {
                None => Err(A2aError::task_not_found(id)),
                Some(task) if task.is_terminal() => Err(A2aError::TaskNotCancelable {
                    task_id: id.to_string(),
                    state: task.state(),
                }),
                Some(task) => {
                    let mut task = task.clone();
                    task.set_state(TaskState::Canceled);
                    Ok(Some(task))
                }
            })?
            .ok_or_else(|| A2aError::internal_error("task cancel was not persisted"))?;
        tracing::info!(task_id = %id, "Task canceled");
        Ok(canceled)
    }

    /// All stored tasks, ordered by id.
    pub fn list_tasks(&self) -> A2aResult<Vec<Task>> {
        Ok(self.cache.list()?.into_iter().map(|(_, task)| task).collect())
    }
}

fn encode(task: &Task) -> A2aResult<String> {
    Ok(serde_json::to_string(&record::to_record(task)?)?)
}

fn decode(raw: &str) -> A2aResult<Task> {
    record::from_record(serde_json::from_str(raw)?)
}
