//! Message bus contract tests against the in-memory adapter.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use chat_backbone::adapters::bus::InMemoryBus;
use chat_backbone::domain::{BusState, Outcome, Topic};
use chat_backbone::ports::{BusError, MessageBus};

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct ChatEvent {
    from: String,
    to: String,
    body: String,
}

fn bus(partitions: i32) -> Arc<InMemoryBus> {
    Arc::new(InMemoryBus::new(Topic::new("chat_message", partitions)))
}

#[tokio::test]
async fn same_key_messages_arrive_in_publish_order() {
    let bus = bus(3);
    bus.publish("u1", b"a").await.unwrap();
    bus.publish("u1", b"b").await.unwrap();
    bus.publish("u2", b"c").await.unwrap();

    let mut payloads = Vec::new();
    for _ in 0..3 {
        payloads.push(bus.read_next().await.unwrap().payload);
    }

    let pos = |p: &[u8]| payloads.iter().position(|x| x == p).unwrap();
    assert!(pos(b"a") < pos(b"b"));
    assert!(payloads.iter().any(|p| p == b"c"));
}

#[tokio::test]
async fn per_key_order_holds_across_many_keys() {
    let bus = bus(4);
    let keys = ["u1", "u2", "u3", "u4", "u5"];
    for seq in 0..20u32 {
        for key in keys {
            bus.publish(key, &seq.to_be_bytes()).await.unwrap();
        }
    }

    let mut last = std::collections::HashMap::new();
    for _ in 0..(20 * keys.len()) {
        let message = bus.read_next().await.unwrap();
        let seq = u32::from_be_bytes(message.payload[..4].try_into().unwrap());
        if let Some(previous) = last.insert(message.key.clone(), seq) {
            assert!(previous < seq, "key {} went backwards", message.key);
        }
    }
}

#[tokio::test]
async fn json_payload_reaches_the_consumer_intact() {
    let bus = bus(2);
    let event = ChatEvent {
        from: "u1".to_string(),
        to: "u2".to_string(),
        body: "hi".to_string(),
    };
    bus.publish(&event.to, &serde_json::to_vec(&event).unwrap())
        .await
        .unwrap();

    let message = bus.read_next().await.unwrap();
    assert_eq!(message.key, "u2");
    assert_eq!(message.payload_json::<ChatEvent>().unwrap(), event);
}

#[tokio::test(start_paused = true)]
async fn read_next_waits_instead_of_returning_empty() {
    let bus = bus(1);
    let reader = Arc::clone(&bus);
    let pending = tokio::spawn(async move { reader.read_next().await });

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(!pending.is_finished());

    bus.publish("u1", b"wake").await.unwrap();
    let message = pending.await.unwrap().unwrap();
    assert_eq!(message.payload, b"wake");
}

#[tokio::test(start_paused = true)]
async fn dropping_the_read_future_cancels_it() {
    let bus = bus(1);
    let result = tokio::time::timeout(Duration::from_secs(1), bus.read_next()).await;
    assert!(result.is_err());

    // The reader slot is free again once the cancelled read is dropped.
    bus.publish("u1", b"next").await.unwrap();
    assert_eq!(bus.read_next().await.unwrap().payload, b"next");
}

#[tokio::test]
async fn concurrent_publishers_lose_nothing() {
    let bus = bus(3);
    let mut tasks = Vec::new();
    for p in 0..8 {
        let bus = Arc::clone(&bus);
        tasks.push(tokio::spawn(async move {
            for i in 0..25 {
                bus.publish(&format!("u{}", p), format!("{}-{}", p, i).as_bytes())
                    .await
                    .unwrap();
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(bus.published().await.len(), 200);
}

#[tokio::test]
async fn close_is_final() {
    let bus = bus(1);
    bus.publish("u1", b"a").await.unwrap();
    bus.read_next().await.unwrap();

    bus.close().await.unwrap();
    assert_eq!(bus.state(), BusState::Closed);
    assert_eq!(bus.committed_offsets().await, vec![1]);

    let err = bus.publish("u1", b"b").await.unwrap_err();
    assert!(matches!(err, BusError::Closed));
    let outcome: Outcome<()> = err.into();
    assert_eq!(outcome.code(), 500);

    assert!(bus.close().await.unwrap_err().is_closed());
}
