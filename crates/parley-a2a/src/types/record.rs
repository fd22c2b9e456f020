//! Versioned persistence records for tasks.
//!
//! Every stored task carries a `protocolVersion`. Records written before the
//! field existed use the pre-0.3 shape (`messages` instead of `history`,
//! `sessionId`, a bare status string, `type`-tagged parts) and are upgraded
//! by [`migrate`] on read. Both directions are pure functions over JSON.

use serde_json::{Map, Value, json};

use super::{PROTOCOL_VERSION, Task};
use crate::error::A2aResult;

const VERSION_FIELD: &str = "protocolVersion";

/// Encode a task as a versioned record.
pub fn to_record(task: &Task) -> A2aResult<Value> {
    let mut value = serde_json::to_value(task)?;
    if let Value::Object(map) = &mut value {
        map.insert(VERSION_FIELD.to_string(), json!(PROTOCOL_VERSION));
    }
    Ok(value)
}

/// Decode a record of any known revision into a task.
pub fn from_record(record: Value) -> A2aResult<Task> {
    let mut record = migrate(record);
    if let Value::Object(map) = &mut record {
        map.remove(VERSION_FIELD);
    }
    Ok(serde_json::from_value(record)?)
}

/// Upgrade a record to the current shape. Current records pass through.
pub fn migrate(record: Value) -> Value {
    let Value::Object(mut map) = record else {
        return record;
    };
    if map.get(VERSION_FIELD).and_then(Value::as_str) == Some(PROTOCOL_VERSION) {
        return Value::Object(map);
    }

    rename(&mut map, "messages", "history");
    rename(&mut map, "sessionId", "contextId");
    if !map.contains_key("contextId") {
        let id = map.get("id").cloned().unwrap_or(Value::Null);
        map.insert("contextId".into(), id);
    }

    let timestamp = map
        .get("updatedAt")
        .or_else(|| map.get("createdAt"))
        .cloned()
        .unwrap_or_else(|| json!(chrono::Utc::now()));
    let status = map.remove("status").unwrap_or_else(|| json!("unknown"));
    let status = match status {
        Value::String(state) => json!({ "state": legacy_state(&state), "timestamp": timestamp }),
        Value::Object(mut status) => {
            if let Some(Value::String(state)) = status.get("state") {
                let state = legacy_state(state).to_string();
                status.insert("state".into(), Value::String(state));
            }
            status.entry("timestamp").or_insert(timestamp);
            Value::Object(status)
        }
        _ => json!({ "state": "unknown", "timestamp": timestamp }),
    };
    map.insert("status".into(), status);

    if let Some(created) = map.remove("createdAt") {
        let metadata = map
            .entry("metadata")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(metadata) = metadata {
            metadata.entry("createdAt").or_insert(created);
        }
    }
    map.remove("updatedAt");

    if let Some(Value::Array(history)) = map.get_mut("history") {
        history.iter_mut().for_each(migrate_message);
    }
    if let Some(Value::Array(artifacts)) = map.get_mut("artifacts") {
        artifacts.iter_mut().for_each(migrate_artifact);
    }
    map.insert("kind".into(), json!("task"));
    Value::Object(map)
}

fn legacy_state(state: &str) -> &str {
    match state {
        "cancelled" => "canceled",
        other => other,
    }
}

fn rename(map: &mut Map<String, Value>, from: &str, to: &str) {
    if let Some(value) = map.remove(from) {
        map.entry(to).or_insert(value);
    }
}

fn migrate_message(message: &mut Value) {
    let Value::Object(map) = message else {
        return;
    };
    rename(map, "id", "messageId");
    if !map.contains_key("messageId") {
        map.insert("messageId".into(), json!(uuid::Uuid::new_v4().to_string()));
    }
    map.remove("timestamp");
    map.insert("kind".into(), json!("message"));
    if let Some(Value::Array(parts)) = map.get_mut("parts") {
        parts.iter_mut().for_each(migrate_part);
    }
}

fn migrate_artifact(artifact: &mut Value) {
    let Value::Object(map) = artifact else {
        return;
    };
    rename(map, "id", "artifactId");
    rename(map, "label", "name");
    map.remove("mediaType");
    map.remove("isFinal");
    if let Some(Value::Array(parts)) = map.get_mut("parts") {
        parts.iter_mut().for_each(migrate_part);
    }
}

fn migrate_part(part: &mut Value) {
    let Value::Object(map) = part else {
        return;
    };
    rename(map, "type", "kind");
    match map.get("kind").and_then(Value::as_str) {
        Some("file") if !map.contains_key("file") => {
            let mut file = Map::new();
            if let Some(uri) = map.remove("uri") {
                file.insert("uri".into(), uri);
            }
            if let Some(mime) = map.remove("mediaType") {
                file.insert("mimeType".into(), mime);
            }
            if let Some(name) = map.remove("name") {
                file.insert("name".into(), name);
            }
            map.insert("file".into(), Value::Object(file));
        }
        Some("data") => {
            map.remove("mediaType");
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Artifact, Message, TaskState};

    #[test]
    fn current_records_round_trip() {
        let mut task = Task::new("t1", "c1");
        task.add_message(Message::user("hello"));
        task.add_artifact(Artifact::text("a1", "out"));
        task.set_state(TaskState::Working);

        let record = to_record(&task).unwrap();
        assert_eq!(record["protocolVersion"], PROTOCOL_VERSION);

        let decoded = from_record(record).unwrap();
        assert_eq!(decoded, task);
    }

    #[test]
    fn legacy_records_are_migrated() {
        let legacy = json!({
            "id": "old-1",
            "sessionId": "sess-9",
            "status": "cancelled",
            "messages": [
                {"id": "m1", "role": "user", "parts": [{"type": "text", "text": "hi"}]},
                {"role": "agent", "parts": [
                    {"type": "file", "uri": "https://x/f.pdf", "mediaType": "application/pdf"},
                    {"type": "data", "data": {"k": 1}, "mediaType": "application/json"}
                ]}
            ],
            "artifacts": [{"id": "a1", "label": "Output", "parts": [{"type": "text", "text": "done"}]}],
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-02T00:00:00Z"
        });

        let task = from_record(legacy).unwrap();
        assert_eq!(task.id, "old-1");
        assert_eq!(task.context_id, "sess-9");
        assert_eq!(task.state(), TaskState::Canceled);
        assert_eq!(task.history.len(), 2);
        assert_eq!(task.history[0].message_id, "m1");
        assert_eq!(task.history[0].text(), "hi");
        assert_eq!(task.artifacts[0].artifact_id, "a1");
        assert_eq!(task.artifacts[0].name.as_deref(), Some("Output"));
        assert_eq!(task.metadata["createdAt"], "2024-01-01T00:00:00Z");
        assert_eq!(task.status.timestamp.to_rfc3339(), "2024-01-02T00:00:00+00:00");
    }

    #[test]
    fn legacy_record_without_context_uses_task_id() {
        let task = from_record(json!({"id": "t9", "status": "working"})).unwrap();
        assert_eq!(task.context_id, "t9");
        assert_eq!(task.state(), TaskState::Working);
        assert!(task.history.is_empty());
    }
}
