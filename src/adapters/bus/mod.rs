//! Message bus adapters.
//!
//! - `KafkaBus` - production adapter over a Kafka cluster
//! - `InMemoryBus` - single-process stand-in with the same routing

mod in_memory;
mod kafka;

pub use in_memory::InMemoryBus;
pub use kafka::{create_client_config, KafkaBus};
