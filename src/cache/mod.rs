//! Fragment cache: entries, keys, the store contract and regeneration
//! locks.

mod entry;
mod key;
mod lock;
mod store;

pub use entry::{CacheEntry, CacheExtra};
pub use key::CacheKeyBuilder;
pub use lock::{LockGuard, LockToken};
pub use store::{CacheStore, DEFAULT_LOCK_HOLD, MemoryCacheStore};
