//! Event fan-out: one [`EventBus`] per streaming task, owned by the
//! [`EventBusManager`].

mod bus;
mod manager;

pub use bus::{EventBus, EventSubscriber, FnSubscriber};
pub use manager::{BusLease, EventBusManager};
