//! chat-backbone - message bus and ephemeral state for a real-time chat service
//!
//! Provides the client-side adapters the chat API is built on: a Kafka
//! message bus with key-ordered partitions and consumer-group reads, a
//! Redis key/value store with expiry and pattern invalidation, and the
//! outcome type the API turns into responses.

pub mod adapters;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
