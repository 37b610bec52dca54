//! chat-backbone service entry point.
//!
//! Connects the cache and message bus adapters, then holds them until
//! ctrl-c. The API layer embeds the library and receives the adapters as
//! `Arc<dyn KeyValueStore>` / `Arc<dyn MessageBus>`.

use std::sync::Arc;

use chat_backbone::adapters::bus::KafkaBus;
use chat_backbone::adapters::cache::RedisCache;
use chat_backbone::config::AppConfig;
use chat_backbone::ports::{KeyValueStore, MessageBus};
use chat_backbone::telemetry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load_validated()?;
    telemetry::init(&config.logging)?;

    // Connecting verifies both stores are reachable before reporting ready.
    let _cache: Arc<dyn KeyValueStore> = Arc::new(RedisCache::connect(&config.redis).await?);
    let bus: Arc<dyn MessageBus> = Arc::new(KafkaBus::connect(&config.kafka).await?);

    tracing::info!(
        topic = %config.kafka.chat_topic,
        redis = %config.redis.address(),
        "chat-backbone started"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");

    if let Err(e) = bus.close().await {
        tracing::warn!(error = %e, "Message bus was already closed");
    }

    tracing::info!("chat-backbone stopped");
    Ok(())
}
