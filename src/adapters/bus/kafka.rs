//! Kafka-backed message bus for production deployments.
//!
//! One adapter owns a `FutureProducer` and a `StreamConsumer` bound to the
//! chat topic. Publishing computes the partition from the key with the same
//! hash the in-memory bus uses, so routing does not depend on the client's
//! partitioner settings.
//!
//! The consumer starts at the newest offset when its group has no commit,
//! stores offsets as messages are read, and commits them on the configured
//! interval. `close` makes one final synchronous commit.

use async_trait::async_trait;
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::config::KafkaConfig;
use crate::domain::{BusMessage, BusState, PublishReceipt, Topic};
use crate::ports::{BusError, MessageBus};

const CLIENT_ID: &str = "chat-backbone";

struct KafkaHandles {
    producer: FutureProducer,
    consumer: StreamConsumer,
}

/// Kafka message bus adapter.
pub struct KafkaBus {
    handles: RwLock<Option<Arc<KafkaHandles>>>,
    reader: Mutex<()>,
    shutdown: watch::Sender<bool>,
    closed: AtomicBool,
    topic: Topic,
    timeout: Duration,
    max_message_bytes: usize,
}

impl KafkaBus {
    /// Provision the topic (when configured), then build the producer and
    /// subscribe the consumer.
    pub async fn connect(config: &KafkaConfig) -> Result<Self, BusError> {
        let configured = config.topic();
        info!(
            brokers = %config.host_port,
            topic = %configured.name,
            partitions = configured.partitions,
            group = %config.consumer_group,
            "Initializing Kafka message bus"
        );

        if config.ensure_topic {
            ensure_topic(config, &configured).await?;
        }

        let producer: FutureProducer = producer_config(config)
            .create()
            .map_err(|e| BusError::Transport(format!("failed to create producer: {}", e)))?;

        // Route over the partitions the broker has, which may differ from
        // the configured count when the topic was created elsewhere.
        let live = fetch_partition_count(&producer, &configured.name, config.timeout()).await?;
        let topic = live_topic(configured, live)?;

        let consumer: StreamConsumer = consumer_config(config)
            .create()
            .map_err(|e| BusError::Transport(format!("failed to create consumer: {}", e)))?;
        consumer
            .subscribe(&[topic.name.as_str()])
            .map_err(|e| BusError::Transport(format!("failed to subscribe: {}", e)))?;

        let (shutdown, _) = watch::channel(false);
        info!(topic = %topic.name, partitions = topic.partitions, "Kafka message bus ready");

        Ok(Self {
            handles: RwLock::new(Some(Arc::new(KafkaHandles { producer, consumer }))),
            reader: Mutex::new(()),
            shutdown,
            closed: AtomicBool::new(false),
            topic,
            timeout: config.timeout(),
            max_message_bytes: config.max_message_bytes,
        })
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    async fn handles(&self) -> Result<Arc<KafkaHandles>, BusError> {
        self.handles
            .read()
            .await
            .as_ref()
            .map(Arc::clone)
            .ok_or(BusError::Closed)
    }
}

#[async_trait]
impl MessageBus for KafkaBus {
    async fn publish(&self, key: &str, payload: &[u8]) -> Result<PublishReceipt, BusError> {
        let handles = self.handles().await?;
        if payload.len() > self.max_message_bytes {
            return Err(BusError::InvalidMessage(format!(
                "payload of {} bytes exceeds limit of {}",
                payload.len(),
                self.max_message_bytes
            )));
        }

        let partition = self.topic.partition_for(key);
        let record = FutureRecord::to(&self.topic.name)
            .key(key)
            .payload(payload)
            .partition(partition);

        match handles
            .producer
            .send(record, Timeout::After(self.timeout))
            .await
        {
            Ok((partition, offset)) => {
                debug!(key = %key, partition = partition, offset = offset, "Message published");
                Ok(PublishReceipt {
                    partition,
                    offset: (offset >= 0).then_some(offset),
                })
            }
            Err((err, _)) => {
                error!(error = %err, key = %key, topic = %self.topic.name, "Failed to publish message");
                Err(map_produce_error(err, self.timeout))
            }
        }
    }

    async fn read_next(&self) -> Result<BusMessage, BusError> {
        let _reader = self.reader.lock().await;
        let mut shutdown = self.shutdown.subscribe();
        let handles = self.handles().await?;
        if *shutdown.borrow_and_update() {
            return Err(BusError::Closed);
        }

        tokio::select! {
            received = handles.consumer.recv() => match received {
                Ok(message) => Ok(to_bus_message(&message)),
                Err(err) => {
                    error!(error = %err, "Kafka consumer error");
                    Err(BusError::Transport(err.to_string()))
                }
            },
            _ = shutdown.changed() => Err(BusError::Closed),
        }
    }

    async fn commit(&self) -> Result<(), BusError> {
        let handles = self.handles().await?;
        tokio::task::spawn_blocking(move || commit_sync(&handles.consumer))
            .await
            .map_err(|e| BusError::Transport(e.to_string()))?
    }

    async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        let handles = self.handles.write().await.take();
        self.shutdown.send_replace(true);

        let Some(handles) = handles else {
            return Ok(());
        };

        let timeout = self.timeout;
        let released = tokio::task::spawn_blocking(move || {
            if let Err(e) = handles.producer.flush(Timeout::After(timeout)) {
                warn!(error = %e, "Failed to flush Kafka producer on close");
            }
            if let Err(e) = commit_sync(&handles.consumer) {
                warn!(error = %e, "Failed to commit offsets on close");
            }
            handles.consumer.unsubscribe();
        })
        .await;
        if let Err(e) = released {
            warn!(error = %e, "Kafka shutdown task failed");
        }

        info!(topic = %self.topic.name, "Kafka message bus closed");
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

impl std::fmt::Debug for KafkaBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaBus")
            .field("topic", &self.topic)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Shared client settings for the admin client, producer and consumer.
pub fn create_client_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.brokers().join(","))
        .set("client.id", CLIENT_ID);
    client_config
}

fn producer_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = create_client_config(config);
    client_config
        .set("acks", config.ack_level.as_acks())
        .set("allow.auto.create.topics", "false")
        .set("message.timeout.ms", millis(config.timeout()))
        .set("message.max.bytes", config.max_message_bytes.to_string());
    client_config
}

fn consumer_config(config: &KafkaConfig) -> ClientConfig {
    let mut client_config = create_client_config(config);
    client_config
        .set("group.id", &config.consumer_group)
        // Start from the newest offset when the group has no commit
        .set("auto.offset.reset", "latest")
        .set("enable.auto.commit", "true")
        .set("auto.commit.interval.ms", millis(config.commit_interval()))
        .set("allow.auto.create.topics", "false");
    client_config
}

fn millis(duration: Duration) -> String {
    duration.as_millis().to_string()
}

/// Creates the topic, treating "already exists" as success.
async fn ensure_topic(config: &KafkaConfig, topic: &Topic) -> Result<(), BusError> {
    let provisioning = |reason: String| BusError::TopicProvisioning {
        topic: topic.name.clone(),
        reason,
    };

    let admin: AdminClient<DefaultClientContext> = create_client_config(config)
        .create()
        .map_err(|e| provisioning(e.to_string()))?;

    let new_topic = NewTopic::new(
        &topic.name,
        topic.partitions,
        TopicReplication::Fixed(i32::from(topic.replication_factor)),
    );
    let options = AdminOptions::new().operation_timeout(Some(config.timeout()));

    let results = admin
        .create_topics(&[new_topic], &options)
        .await
        .map_err(|e| provisioning(e.to_string()))?;

    for result in results {
        match result {
            Ok(name) => info!(topic = %name, "Created topic"),
            Err((name, RDKafkaErrorCode::TopicAlreadyExists)) => {
                debug!(topic = %name, "Topic already exists")
            }
            Err((_, code)) => return Err(provisioning(code.to_string())),
        }
    }
    Ok(())
}

/// Partition count the cluster reports for `topic`. Zero when the topic
/// does not exist.
async fn fetch_partition_count(
    producer: &FutureProducer,
    topic: &str,
    timeout: Duration,
) -> Result<usize, BusError> {
    let producer = producer.clone();
    let name = topic.to_string();
    tokio::task::spawn_blocking(move || {
        let metadata = producer
            .client()
            .fetch_metadata(Some(name.as_str()), Timeout::After(timeout))
            .map_err(|e| BusError::Transport(format!("failed to fetch metadata: {}", e)))?;
        Ok(metadata
            .topics()
            .iter()
            .find(|t| t.name() == name)
            .map_or(0, |t| t.partitions().len()))
    })
    .await
    .map_err(|e| BusError::Transport(e.to_string()))?
}

/// Rebuilds `configured` with the partition count the broker reports.
fn live_topic(configured: Topic, live_partitions: usize) -> Result<Topic, BusError> {
    if live_partitions == 0 {
        return Err(BusError::TopicProvisioning {
            topic: configured.name,
            reason: "topic does not exist on the cluster".to_string(),
        });
    }
    let live = i32::try_from(live_partitions).unwrap_or(i32::MAX);
    if live != configured.partitions {
        warn!(
            topic = %configured.name,
            configured = configured.partitions,
            live = live,
            "Topic partition count differs from configuration; routing over live partitions"
        );
    }
    Ok(Topic {
        partitions: live,
        ..configured
    })
}

/// Synchronous commit of the stored offsets. Nothing to commit is success.
fn commit_sync(consumer: &StreamConsumer) -> Result<(), BusError> {
    match consumer.commit_consumer_state(CommitMode::Sync) {
        Ok(()) => Ok(()),
        Err(KafkaError::ConsumerCommit(RDKafkaErrorCode::NoOffset)) => Ok(()),
        Err(e) => Err(BusError::Transport(e.to_string())),
    }
}

fn map_produce_error(err: KafkaError, timeout: Duration) -> BusError {
    match err {
        KafkaError::MessageProduction(
            RDKafkaErrorCode::MessageTimedOut | RDKafkaErrorCode::QueueFull,
        ) => BusError::Timeout(timeout),
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageSizeTooLarge) => {
            BusError::InvalidMessage(err.to_string())
        }
        other => BusError::Transport(other.to_string()),
    }
}

fn to_bus_message<M: Message>(message: &M) -> BusMessage {
    BusMessage {
        key: message
            .key()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default(),
        payload: message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
        partition: message.partition(),
        offset: message.offset(),
        timestamp_ms: message.timestamp().to_millis(),
    }
}
