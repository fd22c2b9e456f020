//! Lifetime management for per-task event buses.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;

use super::EventBus;
use crate::error::{A2aError, A2aResult};

/// Registry of live event buses keyed by task id.
#[derive(Default)]
pub struct EventBusManager {
    buses: DashMap<String, Arc<EventBus>>,
}

impl EventBusManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus for `task_id`, created on first use.
    pub fn get_or_create(&self, task_id: &str) -> Arc<EventBus> {
        self.buses
            .entry(task_id.to_string())
            .or_insert_with(|| Arc::new(EventBus::new(task_id)))
            .value()
            .clone()
    }

    /// Bus for `task_id`, if one is live.
    pub fn get(&self, task_id: &str) -> Option<Arc<EventBus>> {
        self.buses.get(task_id).map(|bus| bus.value().clone())
    }

    /// Drop the bus of `task_id` and its subscribers.
    pub fn remove(&self, task_id: &str) -> bool {
        match self.buses.remove(task_id) {
            Some((_, bus)) => {
                bus.unsubscribe();
                true
            }
            None => false,
        }
    }

    /// Number of live buses.
    pub fn len(&self) -> usize {
        self.buses.len()
    }

    /// Whether no bus is live.
    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }

    /// Take exclusive ownership of a fresh bus for one streaming session.
    ///
    /// Fails with `UnsupportedOperation` while another session holds the
    /// task. The bus is removed when the returned lease is dropped.
    pub fn lease(self: &Arc<Self>, task_id: &str) -> A2aResult<BusLease> {
        match self.buses.entry(task_id.to_string()) {
            Entry::Occupied(_) => Err(A2aError::unsupported(format!(
                "task '{task_id}' already has an active stream"
            ))),
            Entry::Vacant(vacant) => {
                let bus = Arc::new(EventBus::new(task_id));
                vacant.insert(bus.clone());
                tracing::debug!(task_id = %task_id, "Event bus leased");
                Ok(BusLease {
                    manager: self.clone(),
                    bus,
                })
            }
        }
    }
}

/// Exclusive hold on a task's bus. Dropping it unsubscribes everyone and
/// removes the bus from the manager, on every exit path.
pub struct BusLease {
    manager: Arc<EventBusManager>,
    bus: Arc<EventBus>,
}

impl BusLease {
    /// The leased bus.
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }
}

impl Drop for BusLease {
    fn drop(&mut self) {
        self.bus.unsubscribe();
        let task_id = self.bus.task_id();
        let removed = self
            .manager
            .buses
            .remove_if(task_id, |_, bus| Arc::ptr_eq(bus, &self.bus))
            .is_some();
        tracing::debug!(task_id = %task_id, removed, "Event bus released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_is_idempotent() {
        let manager = EventBusManager::new();
        let a = manager.get_or_create("t1");
        let b = manager.get_or_create("t1");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(manager.len(), 1);
        assert!(manager.remove("t1"));
        assert!(!manager.remove("t1"));
        assert!(manager.is_empty());
    }

    #[test]
    fn lease_is_exclusive_and_released_on_drop() {
        let manager = Arc::new(EventBusManager::new());
        let lease = manager.lease("t1").unwrap();
        assert!(manager.get("t1").is_some());
        assert!(matches!(
            manager.lease("t1"),
            Err(A2aError::UnsupportedOperation { .. })
        ));

        drop(lease);
        assert!(manager.get("t1").is_none());
        assert!(manager.lease("t1").is_ok());
    }

    #[test]
    fn lease_released_on_panic() {
        let manager = Arc::new(EventBusManager::new());
        let inner = manager.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _lease = inner.lease("t1").unwrap();
            panic!("executor blew up");
        }));
        assert!(result.is_err());
        assert!(manager.is_empty());
    }
}
