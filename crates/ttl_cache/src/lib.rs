//! In-memory TTL cache with explicit invalidation.
//!
//! Uses `DashMap` for concurrent access — request handlers mostly read on
//! the hot path, so this avoids a store-wide lock.

pub mod clock;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{CacheStore, MemoryCache, SharedCache};
