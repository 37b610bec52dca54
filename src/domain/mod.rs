//! Domain layer - value types shared by ports and adapters.
//!
//! - `bus` - topics, messages, partition routing, acknowledgment policy
//! - `cache` - key patterns and glob matching for affix scans
//! - `outcome` - closed outcome type and response envelope

pub mod bus;
pub mod cache;
pub mod outcome;

pub use bus::{partition_for, AckLevel, BusMessage, BusState, PublishReceipt, Topic};
pub use cache::{escape_glob, glob_match, KeyPattern};
pub use outcome::{Envelope, Outcome};
