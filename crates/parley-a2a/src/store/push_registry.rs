//! Push notification configs keyed by task id.

use parley_core::KvStore;
use std::sync::Arc;

use super::TaskStore;
use super::cache::WriteThroughCache;
use crate::error::{A2aError, A2aResult};
use crate::types::{PushNotificationConfig, TaskPushNotificationConfig};

const NAMESPACE: &str = "push";

/// Registry of one webhook config per task.
///
/// Configs live in their own namespace, separate from task records. A
/// config can only be registered for a task the [`TaskStore`] knows; it is
/// removed only by [`PushRegistry::delete_config`].
pub struct PushRegistry {
    configs: WriteThroughCache<PushNotificationConfig>,
    tasks: Arc<TaskStore>,
}

impl PushRegistry {
    /// Create a registry sharing `backend` with the task store.
    pub fn new(backend: Arc<dyn KvStore>, tasks: Arc<TaskStore>) -> Self {
        Self {
            configs: WriteThroughCache::json(NAMESPACE, backend),
            tasks,
        }
    }

    fn ensure_task(&self, task_id: &str) -> A2aResult<()> {
        if self.tasks.task_exists(task_id)? {
            Ok(())
        } else {
            Err(A2aError::task_not_found(task_id))
        }
    }

    /// Register `config` for `task_id`, replacing any previous one.
    ///
    /// Fails with `TaskNotFound` for an unknown task. Returns `false` when
    /// the backend refused the write.
    pub fn set_config(&self, task_id: &str, config: PushNotificationConfig) -> A2aResult<bool> {
        self.ensure_task(task_id)?;
        match self.configs.put(task_id, config) {
            Ok(()) => {
                tracing::info!(task_id = %task_id, "Push notification config registered");
                Ok(true)
            }
            Err(A2aError::Storage(e)) => {
                tracing::error!(task_id = %task_id, error = %e, "Failed to store push config");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// Config registered for `task_id`.
    pub fn get_config(&self, task_id: &str) -> A2aResult<Option<PushNotificationConfig>> {
        self.ensure_task(task_id)?;
        self.configs.get(task_id)
    }

    /// Configs for one task, or for every task when `task_id` is `None`.
    pub fn list_configs(&self, task_id: Option<&str>) -> A2aResult<Vec<TaskPushNotificationConfig>> {
        match task_id {
            Some(task_id) => Ok(self
                .get_config(task_id)?
                .map(|config| TaskPushNotificationConfig {
                    task_id: task_id.to_string(),
                    config,
                })
                .into_iter()
                .collect()),
            None => Ok(self
                .configs
                .list()?
                .into_iter()
                .map(|(task_id, config)| TaskPushNotificationConfig { task_id, config })
                .collect()),
        }
    }

    /// Remove the config of `task_id`. Returns `false` when none existed.
    pub fn delete_config(&self, task_id: &str) -> A2aResult<bool> {
        self.ensure_task(task_id)?;
        let removed = self.configs.delete(task_id)?;
        if removed {
            tracing::info!(task_id = %task_id, "Push notification config deleted");
        }
        Ok(removed)
    }
}
