//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the application and the remote stores. Adapters implement these ports.
//!
//! - `KeyValueStore` - ephemeral state with expiry and pattern invalidation
//! - `MessageBus` - partitioned publish and consumer-group reads

mod key_value_store;
mod message_bus;

pub use key_value_store::{CacheError, KeyValueStore};
pub(crate) use key_value_store::{check_key, check_pattern};
pub use message_bus::{BusError, MessageBus};
