//! Events published on a task's event bus and streamed to clients.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Artifact, Task, TaskState, TaskStatus};

/// Event for task status updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    /// Task ID
    pub task_id: String,

    /// Context ID
    pub context_id: String,

    /// New status
    pub status: TaskStatus,

    /// Whether this is the last event of the stream
    #[serde(rename = "final")]
    pub is_final: bool,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Object discriminator, always `"status-update"`
    #[serde(default)]
    pub kind: StatusUpdateKind,
}

impl TaskStatusUpdateEvent {
    /// Create a status update for `state`
    pub fn new(
        task_id: impl Into<String>,
        context_id: impl Into<String>,
        status: TaskStatus,
        is_final: bool,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            status,
            is_final,
            metadata: HashMap::new(),
            kind: StatusUpdateKind::StatusUpdate,
        }
    }

    /// Final update moving the task into a terminal state
    pub fn terminal(task_id: impl Into<String>, context_id: impl Into<String>, state: TaskState) -> Self {
        Self::new(task_id, context_id, TaskStatus::new(state), true)
    }
}

/// Event for artifact updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    /// Task ID
    pub task_id: String,

    /// Context ID
    pub context_id: String,

    /// The artifact being added or updated
    pub artifact: Artifact,

    /// Extend an existing artifact with the same ID instead of replacing it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,

    /// Whether this is the last chunk of the artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Object discriminator, always `"artifact-update"`
    #[serde(default)]
    pub kind: ArtifactUpdateKind,
}

impl TaskArtifactUpdateEvent {
    /// Create an artifact update that replaces any artifact with the same ID
    pub fn new(task_id: impl Into<String>, context_id: impl Into<String>, artifact: Artifact) -> Self {
        Self {
            task_id: task_id.into(),
            context_id: context_id.into(),
            artifact,
            append: None,
            last_chunk: None,
            metadata: HashMap::new(),
            kind: ArtifactUpdateKind::ArtifactUpdate,
        }
    }
}

/// Discriminator for [`TaskStatusUpdateEvent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusUpdateKind {
    #[default]
    #[serde(rename = "status-update")]
    StatusUpdate,
}

/// Discriminator for [`TaskArtifactUpdateEvent`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactUpdateKind {
    #[default]
    #[serde(rename = "artifact-update")]
    ArtifactUpdate,
}

/// An event published on an event bus.
///
/// Each variant carries its own `kind` discriminator, so the union is
/// encoded untagged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Event {
    /// Full task snapshot
    Task(Box<Task>),

    /// Status transition
    StatusUpdate(TaskStatusUpdateEvent),

    /// Artifact produced or extended
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl Event {
    /// ID of the task the event belongs to
    pub fn task_id(&self) -> &str {
        match self {
            Event::Task(task) => &task.id,
            Event::StatusUpdate(e) => &e.task_id,
            Event::ArtifactUpdate(e) => &e.task_id,
        }
    }

    /// Whether this event ends the stream
    pub fn is_final(&self) -> bool {
        matches!(self, Event::StatusUpdate(e) if e.is_final)
    }

    /// Wire discriminator of the event
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Task(_) => "task",
            Event::StatusUpdate(_) => "status-update",
            Event::ArtifactUpdate(_) => "artifact-update",
        }
    }
}

impl From<Task> for Event {
    fn from(task: Task) -> Self {
        Event::Task(Box::new(task))
    }
}

impl From<TaskStatusUpdateEvent> for Event {
    fn from(event: TaskStatusUpdateEvent) -> Self {
        Event::StatusUpdate(event)
    }
}

impl From<TaskArtifactUpdateEvent> for Event {
    fn from(event: TaskArtifactUpdateEvent) -> Self {
        Event::ArtifactUpdate(event)
    }
}
