//! Model caching system for optimizing model lifecycle.
//!
//! Models are loaded lazily on first demand, exactly once per descriptor even
//! under concurrent demand, and kept until they are evicted or the cache is
//! shut down.

#[allow(clippy::module_inception)]
pub mod cache;
pub mod config;
pub mod types;

pub use cache::ModelCache;
pub use config::{CacheConfig, CacheConfigError};
pub use types::{CacheError, CacheStats, CachedModel};
