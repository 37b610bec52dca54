//! In-memory message bus for testing and development.
//!
//! Models one topic with a fixed partition count and a single consumer
//! group. Routing uses the same key hash as the production adapter, so
//! per-key ordering holds exactly as it does against a broker.
//!
//! Commits happen on `commit`, on `close`, and on a fixed interval once
//! `spawn_auto_commit` is running. `restart_consumer` rewinds the read
//! position to the last commit, which is how tests observe at-least-once
//! redelivery.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::domain::{BusMessage, BusState, PublishReceipt, Topic};
use crate::ports::{BusError, MessageBus};

const DEFAULT_MAX_MESSAGE_BYTES: usize = 1_048_576;

#[derive(Debug)]
struct Log {
    partitions: Vec<Vec<BusMessage>>,
    /// Next offset to read, per partition.
    position: Vec<usize>,
    /// Last committed position, per partition.
    committed: Vec<usize>,
    /// Partition the next read starts scanning from.
    next_partition: usize,
}

impl Log {
    fn new(partitions: usize) -> Self {
        Self {
            partitions: vec![Vec::new(); partitions],
            position: vec![0; partitions],
            committed: vec![0; partitions],
            next_partition: 0,
        }
    }

    fn commit(&mut self) {
        self.committed = self.position.clone();
    }

    /// Takes the next unread message, visiting partitions round-robin so
    /// one busy key cannot starve the others.
    fn take_next(&mut self) -> Option<BusMessage> {
        let count = self.partitions.len();
        for step in 0..count {
            let p = (self.next_partition + step) % count;
            if let Some(message) = self.partitions[p].get(self.position[p]) {
                let message = message.clone();
                self.position[p] += 1;
                self.next_partition = (p + 1) % count;
                return Some(message);
            }
        }
        None
    }
}

/// In-memory message bus.
///
/// # Example
///
/// ```ignore
/// let bus = InMemoryBus::new(Topic::new("chat", 3));
/// bus.publish("u1", b"hello").await?;
/// let message = bus.read_next().await?;
/// ```
#[derive(Debug)]
pub struct InMemoryBus {
    topic: Topic,
    max_message_bytes: usize,
    log: Mutex<Log>,
    reader: Mutex<()>,
    signal: watch::Sender<u64>,
    closed: AtomicBool,
    created: Instant,
}

impl InMemoryBus {
    /// Creates a bus for `topic` with an attached consumer at the end of
    /// the (empty) log.
    pub fn new(topic: Topic) -> Self {
        let partitions = topic.partitions.max(1) as usize;
        let (signal, _) = watch::channel(0);
        Self {
            topic,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            log: Mutex::new(Log::new(partitions)),
            reader: Mutex::new(()),
            signal,
            closed: AtomicBool::new(false),
            created: Instant::now(),
        }
    }

    /// Set the largest payload `publish` accepts.
    pub fn with_max_message_bytes(mut self, bytes: usize) -> Self {
        self.max_message_bytes = bytes;
        self
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Commits the read position every `interval` until the bus is closed
    /// or dropped.
    pub fn spawn_auto_commit(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let bus: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(bus) = bus.upgrade() else { break };
                if bus.closed.load(Ordering::SeqCst) {
                    break;
                }
                bus.log.lock().await.commit();
            }
        })
    }

    // === Test Helpers ===

    /// Every message in the log, partition by partition.
    pub async fn published(&self) -> Vec<BusMessage> {
        self.log
            .lock()
            .await
            .partitions
            .iter()
            .flatten()
            .cloned()
            .collect()
    }

    /// Committed position per partition.
    pub async fn committed_offsets(&self) -> Vec<usize> {
        self.log.lock().await.committed.clone()
    }

    /// Rewinds the read position to the last commit, as a consumer in the
    /// same group does after a crash.
    pub async fn restart_consumer(&self) {
        let mut log = self.log.lock().await;
        log.position = log.committed.clone();
        log.next_partition = 0;
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }

    fn notify(&self) {
        self.signal.send_modify(|generation| *generation += 1);
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<PublishReceipt, BusError> {
        self.ensure_open()?;
        if payload.len() > self.max_message_bytes {
            return Err(BusError::InvalidMessage(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.max_message_bytes
            )));
        }

        let partition = self.topic.partition_for(key);
        let offset = {
            let mut log = self.log.lock().await;
            let records = &mut log.partitions[partition as usize];
            let offset = records.len() as i64;
            records.push(BusMessage {
                key: key.to_string(),
                payload: payload.to_vec(),
                partition,
                offset,
                timestamp_ms: Some(self.created.elapsed().as_millis() as i64),
            });
            offset
        };
        self.notify();

        Ok(PublishReceipt {
            partition,
            offset: Some(offset),
        })
    }

    async fn read_next(&self) -> Result<BusMessage, BusError> {
        let _reader = self.reader.lock().await;
        loop {
            // Subscribe before checking so a publish between the check and
            // the wait is not missed.
            let mut changed = self.signal.subscribe();
            self.ensure_open()?;
            if let Some(message) = self.log.lock().await.take_next() {
                return Ok(message);
            }
            if changed.changed().await.is_err() {
                return Err(BusError::Closed);
            }
        }
    }

    async fn commit(&self) -> Result<(), BusError> {
        self.ensure_open()?;
        self.log.lock().await.commit();
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        self.log.lock().await.commit();
        self.notify();
        tracing::debug!(topic = %self.topic.name, "In-memory bus closed");
        Ok(())
    }

    fn state(&self) -> BusState {
        if self.closed.load(Ordering::SeqCst) {
            BusState::Closed
        } else {
            BusState::Ready
        }
    }
}
