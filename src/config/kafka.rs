//! Kafka configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::domain::{AckLevel, Topic};

/// Kafka configuration
#[derive(Debug, Clone, Deserialize)]
pub struct KafkaConfig {
    /// Broker address (`host:port`, comma-separated for several brokers)
    pub host_port: String,

    /// Topic carrying chat messages
    pub chat_topic: String,

    /// Partition count used when provisioning the topic and routing keys
    #[serde(default = "default_partitions")]
    pub partitions: i32,

    /// Read/write timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Consumer commit interval in seconds (defaults to the timeout)
    pub commit_interval_secs: Option<u64>,

    /// Consumer group name
    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Producer acknowledgment level
    #[serde(default)]
    pub ack_level: AckLevel,

    /// Create the topic at startup if it does not exist
    #[serde(default = "default_ensure_topic")]
    pub ensure_topic: bool,

    /// Largest payload accepted by `publish`
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
}

impl KafkaConfig {
    /// Write timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Interval between background offset commits
    pub fn commit_interval(&self) -> Duration {
        Duration::from_secs(self.commit_interval_secs.unwrap_or(self.timeout_secs))
    }

    /// Topic description for provisioning and routing
    pub fn topic(&self) -> Topic {
        Topic::new(self.chat_topic.clone(), self.partitions)
    }

    /// Broker list as individual addresses
    pub fn brokers(&self) -> Vec<&str> {
        self.host_port
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// Validate Kafka configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        let brokers = self.brokers();
        if brokers.is_empty() {
            return Err(ValidationError::MissingRequired("KAFKA__HOST_PORT"));
        }
        for broker in brokers {
            let valid = broker
                .rsplit_once(':')
                .map(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok_and(|p| p > 0))
                .unwrap_or(false);
            if !valid {
                return Err(ValidationError::InvalidBrokerAddress(broker.to_string()));
            }
        }
        if self.chat_topic.is_empty() {
            return Err(ValidationError::MissingRequired("KAFKA__CHAT_TOPIC"));
        }
        if self.consumer_group.is_empty() {
            return Err(ValidationError::MissingRequired("KAFKA__CONSUMER_GROUP"));
        }
        if self.partitions < 1 {
            return Err(ValidationError::InvalidPartitionCount);
        }
        if self.timeout_secs == 0 || self.commit_interval_secs == Some(0) {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_message_bytes == 0 {
            return Err(ValidationError::InvalidMessageSize);
        }
        Ok(())
    }
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            host_port: String::new(),
            chat_topic: String::new(),
            partitions: default_partitions(),
            timeout_secs: default_timeout(),
            commit_interval_secs: None,
            consumer_group: default_consumer_group(),
            ack_level: AckLevel::default(),
            ensure_topic: default_ensure_topic(),
            max_message_bytes: default_max_message_bytes(),
        }
    }
}

fn default_partitions() -> i32 {
    1
}

fn default_timeout() -> u64 {
    1
}

fn default_consumer_group() -> String {
    "chat".to_string()
}

fn default_ensure_topic() -> bool {
    true
}

fn default_max_message_bytes() -> usize {
    1_048_576
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> KafkaConfig {
        KafkaConfig {
            host_port: "localhost:9092".to_string(),
            chat_topic: "chat_message".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_kafka_config_defaults() {
        let config = KafkaConfig::default();
        assert_eq!(config.partitions, 1);
        assert_eq!(config.consumer_group, "chat");
        assert_eq!(config.ack_level, AckLevel::None);
        assert!(config.ensure_topic);
    }

    #[test]
    fn test_commit_interval_falls_back_to_timeout() {
        let config = KafkaConfig {
            timeout_secs: 3,
            ..local()
        };
        assert_eq!(config.commit_interval(), Duration::from_secs(3));

        let config = KafkaConfig {
            commit_interval_secs: Some(7),
            ..config
        };
        assert_eq!(config.commit_interval(), Duration::from_secs(7));
    }

    #[test]
    fn test_brokers_split_on_commas() {
        let config = KafkaConfig {
            host_port: "k1:9092, k2:9092,".to_string(),
            ..local()
        };
        assert_eq!(config.brokers(), vec!["k1:9092", "k2:9092"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_topic_uses_partition_count() {
        let config = KafkaConfig {
            partitions: 4,
            ..local()
        };
        let topic = config.topic();
        assert_eq!(topic.name, "chat_message");
        assert_eq!(topic.partitions, 4);
    }

    #[test]
    fn test_validation_missing_broker() {
        let config = KafkaConfig {
            host_port: String::new(),
            ..local()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_validation_invalid_broker() {
        let config = KafkaConfig {
            host_port: "localhost".to_string(),
            ..local()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidBrokerAddress(_))
        ));
    }

    #[test]
    fn test_validation_zero_partitions() {
        let config = KafkaConfig {
            partitions: 0,
            ..local()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(local().validate().is_ok());
    }
}
