//! ModelCache implementation with single-flight lazy loading and eviction.

use polyglot_abstraction::{ModelError, TranslationModel};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::{CacheConfig, CacheConfigError};
use super::types::{CacheError, CacheStats, CachedModel, LoadState};
use crate::factory::ModelLoader;
use crate::registry::ModelDescriptor;

enum Slot {
    /// A load is in flight; waiters subscribe to its outcome.
    Loading(watch::Receiver<LoadState>),
    Ready(CachedModel),
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Slot>,
    stats: CacheStats,
}

impl CacheState {
    fn refresh_gauges(&mut self) {
        let ready = self.entries.values().filter(|slot| matches!(slot, Slot::Ready(_))).count();
        self.stats.ready_models = ready;
        self.stats.loading_models = self.entries.len() - ready;
    }

    fn lru_ready_key(&self) -> Option<String> {
        self.entries
            .iter()
            .filter_map(|(key, slot)| match slot {
                Slot::Ready(cached) => Some((key, cached.last_accessed)),
                Slot::Loading(_) => None,
            })
            .min_by_key(|(_, last_accessed)| *last_accessed)
            .map(|(key, _)| key.clone())
    }
}

struct CacheInner {
    state: Mutex<CacheState>,
    loader: Arc<dyn ModelLoader>,
    config: CacheConfig,
    closed: AtomicBool,
}

fn lock(state: &Mutex<CacheState>) -> MutexGuard<'_, CacheState> {
    // Critical sections never leave the map half-updated, so a poisoned lock
    // is still safe to use.
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cache of loaded translation models.
///
/// Each descriptor is loaded at most once at a time: the first caller starts
/// the load on a background task, later callers wait for that load's outcome.
/// The internal lock only guards bookkeeping and is never held across a load,
/// so a slow model never blocks lookups of other models. A waiter that gives
/// up (timeout or cancellation) does not abort the load.
pub struct ModelCache {
    inner: Arc<CacheInner>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for ModelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelCache")
            .field("config", &self.inner.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl ModelCache {
    /// Create a new, empty model cache.
    ///
    /// # Errors
    /// Returns `CacheConfigError` if the configuration is invalid.
    pub fn new(config: CacheConfig, loader: Arc<dyn ModelLoader>) -> Result<Self, CacheConfigError> {
        config.validate()?;

        Ok(Self {
            inner: Arc::new(CacheInner {
                state: Mutex::new(CacheState::default()),
                loader,
                config,
                closed: AtomicBool::new(false),
            }),
            cleanup_task: Mutex::new(None),
        })
    }

    /// Get the ready model for `descriptor`, loading it if necessary.
    ///
    /// This is the only call in the engine that suspends waiting on a model.
    ///
    /// # Errors
    /// `LoadFailed` if the (shared) load failed, `LoadTimeout` if this caller
    /// waited longer than the configured load timeout, `Closed` after
    /// shutdown.
    pub async fn acquire(
        &self,
        descriptor: &Arc<ModelDescriptor>,
    ) -> Result<Arc<dyn TranslationModel>, CacheError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(CacheError::Closed);
        }

        let id = descriptor.id();
        let (mut receiver, start) = {
            let mut state = lock(&self.inner.state);
            let state = &mut *state;

            // A live load always settles its slot before the sender goes away,
            // so a closed channel here means the load task itself was lost.
            let lost = matches!(
                state.entries.get(id),
                Some(Slot::Loading(rx)) if rx.has_changed().is_err()
            );
            if lost {
                state.entries.remove(id);
                state.stats.load_failures += 1;
                warn!(model = %id, "Discarding load that ended without an outcome");
            }

            match state.entries.get_mut(id) {
                Some(Slot::Ready(cached)) => {
                    cached.touch();
                    state.stats.hits += 1;
                    debug!(model = %id, access_count = cached.access_count, "Cache hit");
                    return Ok(Arc::clone(&cached.model));
                }
                Some(Slot::Loading(receiver)) => {
                    state.stats.coalesced += 1;
                    debug!(model = %id, "Joining in-flight model load");
                    (receiver.clone(), None)
                }
                None => {
                    let (sender, receiver) = watch::channel(LoadState::Pending);
                    state.entries.insert(id.to_string(), Slot::Loading(receiver.clone()));
                    state.stats.misses += 1;
                    state.refresh_gauges();
                    debug!(model = %id, "Cache miss, starting model load");
                    (receiver, Some(sender))
                }
            }
        };

        if let Some(sender) = start {
            CacheInner::spawn_load(&self.inner, Arc::clone(descriptor), sender);
        }

        let after = self.inner.config.load_timeout();
        let waited = tokio::time::timeout(after, receiver.wait_for(|s| !s.is_pending()))
            .await
            .map(|result| result.map(|state| (*state).clone()));
        let outcome = match waited {
            Ok(Ok(state)) => state,
            Ok(Err(_)) => {
                self.inner.discard_lost_load(id, &receiver);
                LoadState::Failed(ModelError::Other(
                    "load task ended without reporting an outcome".to_string(),
                ))
            }
            Err(_) => {
                warn!(model = %id, timeout_secs = after.as_secs(), "Gave up waiting for model load");
                return Err(CacheError::LoadTimeout { model: id.to_string(), after });
            }
        };

        match outcome {
            LoadState::Ready(model) => Ok(model),
            LoadState::Failed(source) => Err(CacheError::LoadFailed { model: id.to_string(), source }),
            LoadState::Pending => Err(CacheError::LoadFailed {
                model: id.to_string(),
                source: ModelError::Other("load finished in pending state".to_string()),
            }),
        }
    }

    /// Identifiers of every ready model, sorted.
    #[must_use]
    pub fn loaded_models(&self) -> Vec<String> {
        let state = lock(&self.inner.state);
        let mut ids: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Ready(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Identifiers of models currently being loaded, sorted.
    #[must_use]
    pub fn loading_models(&self) -> Vec<String> {
        let state = lock(&self.inner.state);
        let mut ids: Vec<String> = state
            .entries
            .iter()
            .filter(|(_, slot)| matches!(slot, Slot::Loading(_)))
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Whether the model with this identifier is ready.
    #[must_use]
    pub fn is_ready(&self, id: &str) -> bool {
        matches!(lock(&self.inner.state).entries.get(id), Some(Slot::Ready(_)))
    }

    /// Get current cache statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        lock(&self.inner.state).stats.clone()
    }

    /// Remove a ready model from the cache.
    ///
    /// Loads in flight are left alone.
    ///
    /// # Returns
    /// `true` if the model was removed, `false` if it was not ready.
    pub fn evict(&self, id: &str) -> bool {
        let mut state = lock(&self.inner.state);
        if !matches!(state.entries.get(id), Some(Slot::Ready(_))) {
            return false;
        }
        state.entries.remove(id);
        state.stats.evictions += 1;
        state.refresh_gauges();
        info!(model = %id, "Evicted model from cache");
        true
    }

    /// Evict every ready model idle for longer than the configured timeout.
    ///
    /// # Returns
    /// The number of models evicted (always 0 without an idle timeout).
    pub fn evict_idle(&self) -> usize {
        self.inner.config.idle_timeout().map_or(0, |timeout| self.inner.evict_idle_older_than(timeout))
    }

    /// Drop every ready model. Loads in flight are kept.
    pub fn clear(&self) {
        let mut state = lock(&self.inner.state);
        let before = state.entries.len();
        state.entries.retain(|_, slot| matches!(slot, Slot::Loading(_)));
        let cleared_count = before - state.entries.len();
        state.stats.evictions += cleared_count as u64;
        state.refresh_gauges();
        info!(cleared_count, "Cleared ready models from cache");
    }

    /// Start the periodic idle sweep. Does nothing without an idle timeout.
    ///
    /// Must be called from within a Tokio runtime. The task stops when the
    /// cache is shut down or dropped.
    pub fn start_cleanup_task(&self) {
        let Some(timeout) = self.inner.config.idle_timeout() else {
            debug!("Idle eviction disabled, not starting cleanup task");
            return;
        };

        let mut task = self.cleanup_task.lock().unwrap_or_else(PoisonError::into_inner);
        if task.is_some() {
            return;
        }

        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        let period = self.inner.config.cleanup_interval();
        *task = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else { break };
                if inner.closed.load(Ordering::Acquire) {
                    break;
                }
                let evicted = inner.evict_idle_older_than(timeout);
                if evicted > 0 {
                    debug!(evicted, "Idle sweep evicted models");
                }
            }
        }));
        info!(interval_secs = period.as_secs(), idle_timeout_secs = timeout.as_secs(), "Started cache cleanup task");
    }

    /// Release every model and refuse further `acquire` calls.
    ///
    /// Loads in flight finish in the background and are discarded.
    pub fn shutdown(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(task) = self.cleanup_task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
        let mut state = lock(&self.inner.state);
        let released = state.entries.values().filter(|slot| matches!(slot, Slot::Ready(_))).count();
        state.entries.retain(|_, slot| matches!(slot, Slot::Loading(_)));
        state.refresh_gauges();
        info!(released, "Model cache shut down");
    }

    /// Whether `shutdown` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Get the cache configuration.
    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }
}

impl Drop for ModelCache {
    fn drop(&mut self) {
        if let Some(task) = self.cleanup_task.get_mut().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

impl CacheInner {
    fn spawn_load(
        this: &Arc<Self>,
        descriptor: Arc<ModelDescriptor>,
        sender: watch::Sender<LoadState>,
    ) {
        let inner = Arc::clone(this);
        tokio::spawn(async move {
            let started = Instant::now();
            let result = inner.load_with_retries(&descriptor).await;
            let outcome = inner.complete_load(&descriptor, result, started.elapsed());
            // Waiters may all have gone; the cache entry is already settled.
            sender.send_replace(outcome);
        });
    }

    async fn load_with_retries(
        &self,
        descriptor: &Arc<ModelDescriptor>,
    ) -> Result<Arc<dyn TranslationModel>, ModelError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            lock(&self.state).stats.load_attempts += 1;
            info!(model = %descriptor.id(), kind = %descriptor.kind(), attempt, "Loading model");

            let loader = Arc::clone(&self.loader);
            let target = Arc::clone(descriptor);
            let result = match tokio::spawn(async move { loader.load(&target).await }).await {
                Ok(result) => result,
                Err(join_error) => {
                    Err(ModelError::Other(format!("model loader panicked: {join_error}")))
                }
            };

            match result {
                Ok(model) => return Ok(model),
                Err(e) if attempt <= self.config.load_retries => {
                    let backoff = self.config.retry_backoff(attempt);
                    warn!(
                        model = %descriptor.id(),
                        attempt,
                        error = %e,
                        backoff_ms = backoff.as_millis(),
                        "Model load failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn complete_load(
        &self,
        descriptor: &Arc<ModelDescriptor>,
        result: Result<Arc<dyn TranslationModel>, ModelError>,
        elapsed: Duration,
    ) -> LoadState {
        let id = descriptor.id();
        let mut state = lock(&self.state);

        let outcome = match result {
            Ok(model) if self.closed.load(Ordering::Acquire) => {
                state.entries.remove(id);
                debug!(model = %id, "Cache closed during load, not retaining model");
                LoadState::Ready(model)
            }
            Ok(model) => {
                if let Some(max) = self.config.max_models {
                    while state.stats.ready_models >= max {
                        let Some(lru_key) = state.lru_ready_key() else { break };
                        state.entries.remove(&lru_key);
                        state.stats.evictions += 1;
                        state.refresh_gauges();
                        info!(model = %lru_key, "Evicted LRU model from cache");
                    }
                }
                let cached = CachedModel::new(Arc::clone(&model), Arc::clone(descriptor), elapsed);
                state.entries.insert(id.to_string(), Slot::Ready(cached));
                info!(model = %id, elapsed_ms = elapsed.as_millis(), "Model loaded and cached");
                LoadState::Ready(model)
            }
            Err(e) => {
                state.entries.remove(id);
                state.stats.load_failures += 1;
                error!(model = %id, error = %e, elapsed_ms = elapsed.as_millis(), "Model load failed");
                LoadState::Failed(e)
            }
        };

        state.refresh_gauges();
        outcome
    }

    /// Clear the slot of a load whose task died, unless a new load took its place.
    fn discard_lost_load(&self, id: &str, receiver: &watch::Receiver<LoadState>) {
        let mut state = lock(&self.state);
        let lost = matches!(
            state.entries.get(id),
            Some(Slot::Loading(current)) if current.same_channel(receiver)
        );
        if lost {
            state.entries.remove(id);
            state.stats.load_failures += 1;
            state.refresh_gauges();
            warn!(model = %id, "Discarding load that ended without an outcome");
        }
    }

    fn evict_idle_older_than(&self, timeout: Duration) -> usize {
        let mut state = lock(&self.state);
        let before = state.entries.len();
        state.entries.retain(|id, slot| match slot {
            Slot::Ready(cached) if cached.idle_for() > timeout => {
                info!(model = %id, idle_secs = cached.idle_for().as_secs(), "Evicting idle model");
                false
            }
            _ => true,
        });
        let evicted = before - state.entries.len();
        state.stats.evictions += evicted as u64;
        state.refresh_gauges();
        evicted
    }
}
