//! Adapters - Implementations of port interfaces.
//!
//! - `cache` - key/value store adapters (Redis, in-memory)
//! - `bus` - message bus adapters (Kafka, in-memory)
//! - `http` - response mapping for the API layer

pub mod bus;
pub mod cache;
pub mod http;

pub use bus::{InMemoryBus, KafkaBus};
pub use cache::{InMemoryCache, RedisCache};
