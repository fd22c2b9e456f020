//! Push notification configuration types.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{A2aError, A2aResult};

/// Webhook the agent notifies about task updates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationConfig {
    /// Webhook URL
    pub url: String,

    /// Config identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Token echoed back to the webhook for validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Authentication descriptor for the webhook
    #[serde(default)]
    pub authentication: HashMap<String, serde_json::Value>,
}

impl PushNotificationConfig {
    /// Create a config for `url`
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            id: None,
            token: None,
            authentication: HashMap::new(),
        }
    }

    /// Check that the URL is an absolute http(s) URL
    pub fn validate(&self) -> A2aResult<()> {
        let parsed = url::Url::parse(&self.url)
            .map_err(|e| A2aError::invalid_params(format!("invalid push url '{}': {e}", self.url)))?;
        match parsed.scheme() {
            "http" | "https" => Ok(()),
            other => Err(A2aError::invalid_params(format!(
                "unsupported push url scheme '{other}'"
            ))),
        }
    }
}

/// A push notification config bound to a task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPushNotificationConfig {
    /// Task the config belongs to
    pub task_id: String,

    /// The config itself
    #[serde(alias = "pushNotificationConfig")]
    pub config: PushNotificationConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_http_urls() {
        assert!(PushNotificationConfig::new("https://x/webhook").validate().is_ok());
        assert!(PushNotificationConfig::new("http://localhost:9000/hook").validate().is_ok());
    }

    #[test]
    fn rejects_relative_and_non_http_urls() {
        assert!(PushNotificationConfig::new("/webhook").validate().is_err());
        assert!(PushNotificationConfig::new("ftp://x/webhook").validate().is_err());
    }

    #[test]
    fn accepts_both_param_spellings() {
        let short: TaskPushNotificationConfig = serde_json::from_value(serde_json::json!({
            "taskId": "t1", "config": {"url": "https://x/webhook"}
        }))
        .unwrap();
        let long: TaskPushNotificationConfig = serde_json::from_value(serde_json::json!({
            "taskId": "t1", "pushNotificationConfig": {"url": "https://x/webhook"}
        }))
        .unwrap();
        assert_eq!(short, long);
    }
}
