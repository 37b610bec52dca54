//! Message bus value types and partition routing.

use serde::{Deserialize, Serialize};
use std::fmt;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// A named, partitioned append-only log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

impl Topic {
    /// Creates a topic description with the fixed replication factor of 1.
    pub fn new(name: impl Into<String>, partitions: i32) -> Self {
        Self {
            name: name.into(),
            partitions: partitions.max(1),
            replication_factor: 1,
        }
    }

    /// Partition that a message with `key` is routed to.
    pub fn partition_for(&self, key: &str) -> i32 {
        partition_for(key.as_bytes(), self.partitions)
    }
}

/// Deterministic partition routing: FNV-1a (32 bit) of the key, modulo
/// the partition count.
///
/// Messages sharing a key always land on the same partition, which is
/// what gives per-key ordering. Matches librdkafka's `fnv1a` partitioner.
pub fn partition_for(key: &[u8], partitions: i32) -> i32 {
    if partitions <= 1 {
        return 0;
    }
    let hash = key.iter().fold(FNV_OFFSET_BASIS, |h, b| {
        (h ^ u32::from(*b)).wrapping_mul(FNV_PRIME)
    });
    (hash % partitions as u32) as i32
}

/// A message read from the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    /// Routing key the message was published with.
    pub key: String,
    /// Opaque payload.
    pub payload: Vec<u8>,
    pub partition: i32,
    pub offset: i64,
    /// Broker timestamp in milliseconds, when the broker reports one.
    pub timestamp_ms: Option<i64>,
}

impl BusMessage {
    /// Payload as UTF-8 text, if it is valid UTF-8.
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Decodes the payload as JSON.
    pub fn payload_json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.payload)
    }
}

/// Where a published message was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReceipt {
    pub partition: i32,
    /// Assigned offset. `None` when the ack level does not report one.
    pub offset: Option<i64>,
}

/// How many broker acknowledgments a publish waits for.
///
/// Chat traffic favours throughput, so the default is fire-and-forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckLevel {
    #[default]
    None,
    Leader,
    All,
}

impl AckLevel {
    /// Value of the producer `acks` setting.
    pub fn as_acks(&self) -> &'static str {
        match self {
            AckLevel::None => "0",
            AckLevel::Leader => "1",
            AckLevel::All => "all",
        }
    }
}

impl fmt::Display for AckLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AckLevel::None => "none",
            AckLevel::Leader => "leader",
            AckLevel::All => "all",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle of a bus adapter. `Uninitialized` is the time before a
/// connect call returns, so only the post-construction states exist here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Ready,
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn single_partition_always_routes_to_zero() {
        assert_eq!(partition_for(b"u1", 1), 0);
        assert_eq!(partition_for(b"anything", 0), 0);
    }

    #[test]
    fn fnv1a_reference_values() {
        // FNV-1a("a") = 0xe40c292c
        assert_eq!(partition_for(b"a", 1000), (0xe40c_292c_u32 % 1000) as i32);
        // Empty key hashes to the offset basis.
        assert_eq!(partition_for(b"", 7), (FNV_OFFSET_BASIS % 7) as i32);
    }

    #[test]
    fn topic_clamps_partition_count() {
        let topic = Topic::new("chat", 0);
        assert_eq!(topic.partitions, 1);
        assert_eq!(topic.replication_factor, 1);
    }

    #[test]
    fn ack_level_maps_to_producer_setting() {
        assert_eq!(AckLevel::None.as_acks(), "0");
        assert_eq!(AckLevel::Leader.as_acks(), "1");
        assert_eq!(AckLevel::All.as_acks(), "all");
        assert_eq!(AckLevel::default(), AckLevel::None);
    }

    #[test]
    fn ack_level_deserializes_lowercase() {
        let level: AckLevel = serde_json::from_str("\"leader\"").unwrap();
        assert_eq!(level, AckLevel::Leader);
    }

    #[test]
    fn payload_helpers_decode() {
        let msg = BusMessage {
            key: "u1".to_string(),
            payload: br#"{"text":"hi"}"#.to_vec(),
            partition: 0,
            offset: 3,
            timestamp_ms: None,
        };
        assert_eq!(msg.payload_str(), Some(r#"{"text":"hi"}"#));
        let value: serde_json::Value = msg.payload_json().unwrap();
        assert_eq!(value["text"], "hi");
    }

    proptest! {
        #[test]
        fn routing_is_deterministic_and_in_range(key in ".*", partitions in 1i32..64) {
            let first = partition_for(key.as_bytes(), partitions);
            let second = partition_for(key.as_bytes(), partitions);
            prop_assert_eq!(first, second);
            prop_assert!(first >= 0 && first < partitions);
        }
    }
}
