//! Key/value store adapters.
//!
//! ## Available Adapters
//!
//! - `InMemoryCache` - In-memory for testing and development
//! - `RedisCache` - Redis-backed for production
//!
//! ## Usage
//!
//! ```ignore
//! use chat_backbone::adapters::cache::{InMemoryCache, RedisCache};
//!
//! // For testing
//! let cache = InMemoryCache::new();
//!
//! // For production
//! let cache = RedisCache::connect(&config.redis).await?;
//! ```

mod in_memory;
mod redis;

pub use in_memory::InMemoryCache;
pub use redis::RedisCache;
