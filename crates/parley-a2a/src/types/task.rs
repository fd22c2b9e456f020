//! Task types for the A2A protocol.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::{Artifact, Message, TaskArtifactUpdateEvent};

/// A task represents a unit of work in the A2A protocol.
///
/// Tasks progress through a lifecycle of [`TaskState`]s and accumulate the
/// messages exchanged with the agent and the artifacts it produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for the task
    pub id: String,

    /// Conversation context the task belongs to
    pub context_id: String,

    /// Current status of the task
    pub status: TaskStatus,

    /// Messages exchanged during the task, oldest first
    #[serde(default)]
    pub history: Vec<Message>,

    /// Artifacts produced by the task
    #[serde(default)]
    pub artifacts: Vec<Artifact>,

    /// Additional metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,

    /// Object discriminator, always `"task"`
    #[serde(default)]
    pub kind: TaskKind,
}

impl Task {
    /// Create a new submitted task
    pub fn new(id: impl Into<String>, context_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            context_id: context_id.into(),
            status: TaskStatus::new(TaskState::Submitted),
            history: Vec::new(),
            artifacts: Vec::new(),
            metadata: HashMap::new(),
            kind: TaskKind::Task,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> TaskState {
        self.status.state
    }

    /// Add a message to the history
    pub fn add_message(&mut self, message: Message) {
        self.history.push(message);
    }

    /// Add an artifact to the task
    pub fn add_artifact(&mut self, artifact: Artifact) {
        self.artifacts.push(artifact);
    }

    /// Replace the status with a fresh one in `state`
    pub fn set_state(&mut self, state: TaskState) {
        self.status = TaskStatus::new(state);
    }

    /// Check if the task is in a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.state.is_terminal()
    }

    /// Apply an artifact update.
    ///
    /// An update whose artifact ID is unknown is added. A known ID is
    /// replaced, or extended with the new parts when `append` is set.
    pub fn apply_artifact_update(&mut self, update: &TaskArtifactUpdateEvent) {
        let incoming = &update.artifact;
        match self
            .artifacts
            .iter_mut()
            .find(|a| a.artifact_id == incoming.artifact_id)
        {
            Some(existing) if update.append.unwrap_or(false) => {
                existing.parts.extend(incoming.parts.iter().cloned());
                existing.metadata.extend(
                    incoming
                        .metadata
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone())),
                );
            }
            Some(existing) => *existing = incoming.clone(),
            None => self.artifacts.push(incoming.clone()),
        }
    }

    /// Copy of the task keeping only the last `limit` history entries
    pub fn with_history_limit(&self, limit: Option<usize>) -> Self {
        let mut task = self.clone();
        if let Some(limit) = limit {
            let skip = task.history.len().saturating_sub(limit);
            task.history.drain(..skip);
        }
        task
    }
}

/// Status of a task: its state plus an optional agent message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// Lifecycle state
    pub state: TaskState,

    /// Message accompanying the status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// When the status was set
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl TaskStatus {
    /// Create a status stamped with the current time
    pub fn new(state: TaskState) -> Self {
        Self {
            state,
            message: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach a message
    pub fn with_message(mut self, message: Message) -> Self {
        self.message = Some(message);
        self
    }
}

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Task was received but processing has not started
    Submitted,

    /// Task is actively being processed
    Working,

    /// Task requires additional input to proceed
    InputRequired,

    /// Task completed successfully
    Completed,

    /// Task was canceled by the client
    Canceled,

    /// Task failed due to an error
    Failed,

    /// Task was rejected by the agent
    Rejected,

    /// Task requires authentication to proceed
    AuthRequired,

    /// State could not be determined
    Unknown,
}

impl TaskState {
    /// Check if this state is terminal.
    ///
    /// No transition out of a terminal state is ever accepted.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed
                | TaskState::Canceled
                | TaskState::Failed
                | TaskState::Rejected
                | TaskState::Unknown
        )
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Canceled => "canceled",
            TaskState::Failed => "failed",
            TaskState::Rejected => "rejected",
            TaskState::AuthRequired => "auth-required",
            TaskState::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Discriminator for [`Task`] objects on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskKind {
    #[default]
    #[serde(rename = "task")]
    Task,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Part;

    #[test]
    fn new_task_is_submitted_with_empty_collections() {
        let task = Task::new("t1", "c1");
        assert_eq!(task.state(), TaskState::Submitted);
        assert!(task.history.is_empty());
        assert!(task.artifacts.is_empty());

        let json = serde_json::to_value(&task).unwrap();
        assert_eq!(json["kind"], "task");
        assert_eq!(json["contextId"], "c1");
        assert_eq!(json["status"]["state"], "submitted");
        assert_eq!(json["history"], serde_json::json!([]));
    }

    #[test]
    fn terminal_states() {
        for state in [
            TaskState::Completed,
            TaskState::Canceled,
            TaskState::Failed,
            TaskState::Rejected,
            TaskState::Unknown,
        ] {
            assert!(state.is_terminal(), "{state} should be terminal");
        }
        for state in [
            TaskState::Submitted,
            TaskState::Working,
            TaskState::InputRequired,
            TaskState::AuthRequired,
        ] {
            assert!(!state.is_terminal(), "{state} should not be terminal");
        }
    }

    #[test]
    fn state_uses_kebab_case() {
        let json = serde_json::to_string(&TaskState::InputRequired).unwrap();
        assert_eq!(json, "\"input-required\"");
        assert_eq!(TaskState::AuthRequired.to_string(), "auth-required");
    }

    #[test]
    fn history_limit_keeps_most_recent() {
        let mut task = Task::new("t1", "c1");
        for i in 0..5 {
            task.add_message(Message::user(format!("m{i}")));
        }
        let limited = task.with_history_limit(Some(2));
        assert_eq!(limited.history.len(), 2);
        assert_eq!(limited.history[0].text(), "m3");
        assert_eq!(limited.history[1].text(), "m4");
        assert_eq!(task.with_history_limit(None).history.len(), 5);
        assert_eq!(task.with_history_limit(Some(10)).history.len(), 5);
    }

    #[test]
    fn artifact_updates_replace_or_append() {
        let mut task = Task::new("t1", "c1");
        let update = |artifact: Artifact, append| TaskArtifactUpdateEvent {
            task_id: "t1".into(),
            context_id: "c1".into(),
            artifact,
            append,
            last_chunk: None,
            metadata: HashMap::new(),
            kind: Default::default(),
        };

        task.apply_artifact_update(&update(Artifact::text("a", "one"), None));
        task.apply_artifact_update(&update(Artifact::text("a", "two"), Some(true)));
        assert_eq!(task.artifacts.len(), 1);
        assert_eq!(task.artifacts[0].parts.len(), 2);

        task.apply_artifact_update(&update(Artifact::text("a", "three"), None));
        assert_eq!(task.artifacts[0].parts, vec![Part::text("three")]);

        task.apply_artifact_update(&update(Artifact::text("b", "other"), Some(true)));
        assert_eq!(task.artifacts.len(), 2);
    }
}
