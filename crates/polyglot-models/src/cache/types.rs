//! Core data types for model caching.

use polyglot_abstraction::{ModelError, TranslationModel};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::registry::ModelDescriptor;

/// A ready model held by the cache, with usage metadata.
#[derive(Clone)]
pub struct CachedModel {
    /// The loaded model instance.
    pub model: Arc<dyn TranslationModel>,
    /// The descriptor the model was loaded for.
    pub descriptor: Arc<ModelDescriptor>,
    /// Timestamp of last access.
    pub last_accessed: Instant,
    /// Number of times this model has been handed out.
    pub access_count: u64,
    /// Timestamp when the model became ready.
    pub loaded_at: Instant,
    /// How long the load took, retries included.
    pub load_duration: Duration,
}

impl CachedModel {
    /// Create a new entry for a freshly loaded model.
    ///
    /// The access count starts at zero: the callers that waited on the load
    /// are not counted as hits.
    pub fn new(
        model: Arc<dyn TranslationModel>,
        descriptor: Arc<ModelDescriptor>,
        load_duration: Duration,
    ) -> Self {
        let now = Instant::now();
        Self { model, descriptor, last_accessed: now, access_count: 0, loaded_at: now, load_duration }
    }

    /// Update the last accessed timestamp and increment access count.
    pub fn touch(&mut self) {
        self.last_accessed = Instant::now();
        self.access_count += 1;
    }

    /// Time since the model was last handed out.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_accessed.elapsed()
    }
}

impl std::fmt::Debug for CachedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedModel")
            .field("model_id", &self.model.model_id())
            .field("descriptor", &self.descriptor.id())
            .field("last_accessed", &self.last_accessed)
            .field("access_count", &self.access_count)
            .field("load_duration", &self.load_duration)
            .finish_non_exhaustive()
    }
}

/// Outcome of a load, as broadcast to every caller waiting on it.
#[derive(Clone)]
pub(crate) enum LoadState {
    Pending,
    Ready(Arc<dyn TranslationModel>),
    Failed(ModelError),
}

impl LoadState {
    pub(crate) const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Errors returned by `ModelCache::acquire`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// The load routine failed; the entry has been cleared so a later call retries.
    #[error("failed to load model '{model}': {source}")]
    LoadFailed {
        /// Identifier of the model that failed to load.
        model: String,
        /// The loader's error.
        #[source]
        source: ModelError,
    },

    /// This caller stopped waiting; the load itself keeps running.
    #[error("timed out after {after:?} waiting for model '{model}' to load")]
    LoadTimeout {
        /// Identifier of the model being loaded.
        model: String,
        /// How long the caller waited.
        after: Duration,
    },

    /// The cache has been shut down.
    #[error("model cache is shut down")]
    Closed,
}

impl CacheError {
    /// Whether the same call may succeed if repeated later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LoadFailed { .. } | Self::LoadTimeout { .. })
    }
}

/// Cache statistics for observability.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    /// Calls served by a ready model.
    pub hits: u64,
    /// Calls that found no entry and started a load.
    pub misses: u64,
    /// Calls that joined a load already in flight.
    pub coalesced: u64,
    /// Invocations of the loader, retries included.
    pub load_attempts: u64,
    /// Loads that ended in failure (after retries).
    pub load_failures: u64,
    /// Ready models removed by LRU, idle sweep or explicit eviction.
    pub evictions: u64,
    /// Current number of ready models.
    pub ready_models: usize,
    /// Current number of loads in flight.
    pub loading_models: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockModel;
    use polyglot_abstraction::{LanguageCode, LanguagePair};

    fn descriptor() -> Arc<ModelDescriptor> {
        Arc::new(ModelDescriptor::Specialized {
            id: "test".to_string(),
            pair: LanguagePair::new(LanguageCode::En, LanguageCode::Ja),
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_model_touch() {
        let model = Arc::new(MockModel::new("test".to_string()));
        let mut cached = CachedModel::new(model, descriptor(), Duration::from_millis(5));

        let initial_time = cached.last_accessed;
        assert_eq!(cached.access_count, 0);

        tokio::time::advance(Duration::from_millis(10)).await;
        assert!(cached.idle_for() >= Duration::from_millis(10));

        cached.touch();

        assert_eq!(cached.access_count, 1);
        assert!(cached.last_accessed > initial_time);
        assert_eq!(cached.idle_for(), Duration::ZERO);
    }

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.evictions, 0);
        assert_eq!(stats.ready_models, 0);
    }

    #[test]
    fn test_cache_error_retryable() {
        let failed = CacheError::LoadFailed {
            model: "m".to_string(),
            source: ModelError::RequestError("down".to_string()),
        };
        let timeout =
            CacheError::LoadTimeout { model: "m".to_string(), after: Duration::from_secs(1) };
        assert!(failed.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!CacheError::Closed.is_retryable());
        assert!(failed.to_string().contains("failed to load model 'm'"));
    }
}
