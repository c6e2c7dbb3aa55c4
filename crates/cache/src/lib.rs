//! Namespaced TTL cache
//!
//! One `CacheStore` instance is built at process start and injected into
//! every component that loads shared read-only data (scenario definitions,
//! merged objection sets, model handles). There is no ambient global cache.
//!
//! Eviction model: entries expire after a per-namespace TTL (checked on
//! `get`), and when a namespace is at capacity the single oldest-inserted
//! entry is evicted before a new one goes in. Hits update recency metadata
//! (last access, access count) for observability.
//!
//! Each namespace carries its own lock so scenario loads never contend with
//! objection-set loads.

mod store;
mod ttl;

pub use store::{CacheStore, CacheStoreOptions, ModelHandle};
pub use ttl::{CacheOptions, CacheStats, TtlCache};
