//! CRMDesk Redis Data Layer
//!
//! Redis-backed record collections and wizard draft slots, plus the
//! in-process broadcast channel used to tell live views a collection changed.

pub mod broadcast;
pub mod client;
pub mod queries;
pub mod store;

pub use broadcast::{BroadcastReceiver, BroadcastSender, CollectionEvent, create_broadcast_channel};
pub use client::{RedisError, RedisPool, RedisResult, init_pool};
pub use queries::drafts;
pub use queries::records;
pub use store::{RedisDraftStore, RedisRecordStore};
