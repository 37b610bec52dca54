//! MessageBus port - partitioned publish and consumer-group reads.
//!
//! One adapter instance owns a publisher and a consumer bound to a single
//! topic. Delivery is at-least-once: the read cursor advances in memory on
//! every read and is committed on a fixed interval, so a crash between a
//! read and the next commit redelivers the uncommitted tail. Consumers must
//! tolerate duplicates.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{BusMessage, BusState, PublishReceipt};

/// Errors returned by message bus adapters.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BusError {
    /// The adapter has been closed.
    #[error("message bus adapter is closed")]
    Closed,

    /// The broker did not accept a write, or no message arrived, in time.
    #[error("message bus operation timed out after {0:?}")]
    Timeout(Duration),

    /// Broker unreachable or protocol failure.
    #[error("message bus transport error: {0}")]
    Transport(String),

    /// Rejected locally before reaching the broker.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Topic creation failed with something other than "already exists".
    #[error("failed to provision topic '{topic}': {reason}")]
    TopicProvisioning { topic: String, reason: String },
}

impl BusError {
    pub fn is_closed(&self) -> bool {
        matches!(self, BusError::Closed)
    }
}

/// Port for the chat message bus.
///
/// `publish` may be called concurrently. `read_next` is a single logical
/// reader: concurrent callers are serialised, never interleaved.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publishes `payload` routed by `key`.
    ///
    /// Success means the broker accepted the write at the configured
    /// acknowledgment level, not that it is durably stored.
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<PublishReceipt, BusError>;

    /// Waits for the next message for this consumer group.
    ///
    /// Never returns without a message unless the adapter is closed or the
    /// transport fails. Drop the future to cancel.
    async fn read_next(&self) -> Result<BusMessage, BusError>;

    /// Like [`read_next`](Self::read_next) with a deadline.
    async fn read_next_timeout(&self, deadline: Duration) -> Result<BusMessage, BusError> {
        match tokio::time::timeout(deadline, self.read_next()).await {
            Ok(result) => result,
            Err(_) => Err(BusError::Timeout(deadline)),
        }
    }

    /// Commits the current read position synchronously.
    async fn commit(&self) -> Result<(), BusError>;

    /// Flushes the publisher, makes a final commit and releases both
    /// handles. Flush and commit failures are logged, not returned. A second
    /// call returns [`BusError::Closed`].
    async fn close(&self) -> Result<(), BusError>;

    fn state(&self) -> BusState;
}
