//! Task and push-config storage on top of the [`parley_core::KvStore`] contract.

mod cache;
mod push_registry;
mod task_store;

pub use cache::WriteThroughCache;
pub use push_registry::PushRegistry;
pub use task_store::{DESCRIPTION_KEY, TaskStore};
