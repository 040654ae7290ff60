//! Model routing, loading and caching for Polyglot.
//!
//! This crate provides the pieces between a language pair and a translation:
//!
//! - **Registry**: resolves a pair to a specialized or fallback descriptor
//! - **Loaders**: turn descriptors into ready models (mock or remote backend)
//! - **Cache**: single-flight lazy loading with optional eviction
//! - **Executor**: bounded, timed inference with an explicit input-length policy

pub mod cache;
pub mod executor;
pub mod factory;
pub mod registry;
pub mod remote;

use async_trait::async_trait;
use polyglot_abstraction::{
    GenerationParams, LanguagePair, ModelError, ModelOutput, TranslationModel,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::debug;

pub use cache::{CacheConfig, CacheConfigError, CacheError, CacheStats, CachedModel, ModelCache};
pub use executor::{ExecutorConfig, ExecutorConfigError, ExecutorError, OverflowPolicy, TranslationExecutor};
pub use factory::{BackendConfig, BackendKind, ModelFactory, ModelLoader};
pub use registry::{
    DEFAULT_FALLBACK_MODEL, LanguageInfo, ModelDescriptor, ModelKind, ModelRegistry,
    RegistryConfig, RegistryError, RegistryTableError, SpecializedModel,
};
pub use remote::{RemoteLoader, RemoteModel};

/// A deterministic in-process model for testing and development.
///
/// Translates by tagging the input with the target language code:
/// `"Hello"` en→ja becomes `"[ja] Hello"`.
#[derive(Debug, Default)]
pub struct MockModel {
    id: String,
    inference_delay: Duration,
    failing: Arc<AtomicBool>,
}

impl MockModel {
    /// Creates a new `MockModel` with the given ID.
    #[must_use]
    pub fn new(id: String) -> Self {
        Self { id, inference_delay: Duration::ZERO, failing: Arc::new(AtomicBool::new(false)) }
    }

    /// Makes every inference take at least `delay`.
    #[must_use]
    pub fn with_inference_delay(mut self, delay: Duration) -> Self {
        self.inference_delay = delay;
        self
    }

    fn with_failure_flag(mut self, failing: Arc<AtomicBool>) -> Self {
        self.failing = failing;
        self
    }
}

#[async_trait]
impl TranslationModel for MockModel {
    async fn translate(
        &self,
        pair: LanguagePair,
        text: &str,
        params: &GenerationParams,
    ) -> Result<ModelOutput, ModelError> {
        debug!(
            model_id = %self.id,
            pair = %pair,
            max_new_tokens = params.max_new_tokens,
            "MockModel translating"
        );

        if !self.inference_delay.is_zero() {
            tokio::time::sleep(self.inference_delay).await;
        }

        if self.failing.load(Ordering::Acquire) {
            return Err(ModelError::ModelResponseError(format!(
                "mock inference failure for {}",
                self.id
            )));
        }

        Ok(ModelOutput { text: format!("[{}] {text}", pair.target), model_id: Some(self.id.clone()) })
    }

    fn model_id(&self) -> &str {
        &self.id
    }
}

/// Loader producing [`MockModel`]s, with knobs for exercising the cache.
#[derive(Debug, Default)]
pub struct MockLoader {
    load_delay: Duration,
    inference_delay: Duration,
    loads: AtomicUsize,
    fail_next: AtomicU32,
    panic_next: AtomicBool,
    inference_failing: Arc<AtomicBool>,
}

impl MockLoader {
    /// Creates a loader with no delays and no injected failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every load take at least `delay`.
    #[must_use]
    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    /// Makes every inference of loaded models take at least `delay`.
    #[must_use]
    pub fn with_inference_delay(mut self, delay: Duration) -> Self {
        self.inference_delay = delay;
        self
    }

    /// Number of times `load` has been invoked.
    #[must_use]
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::Acquire)
    }

    /// Makes the next `count` loads fail.
    pub fn fail_next_loads(&self, count: u32) {
        self.fail_next.store(count, Ordering::Release);
    }

    /// Makes the next load panic.
    pub fn panic_next_load(&self) {
        self.panic_next.store(true, Ordering::Release);
    }

    /// Switches inference failures on or off for every model this loader produced.
    pub fn set_inference_failure(&self, failing: bool) {
        self.inference_failing.store(failing, Ordering::Release);
    }

    fn take_failure(&self) -> bool {
        self.fail_next
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl ModelLoader for MockLoader {
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<Arc<dyn TranslationModel>, ModelError> {
        let attempt = self.loads.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(model = %descriptor.id(), attempt, "MockLoader loading model");

        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }

        if self.panic_next.swap(false, Ordering::AcqRel) {
            panic!("mock loader panic for {}", descriptor.id());
        }

        if self.take_failure() {
            return Err(ModelError::ModelNotFound(format!(
                "mock load failure for {}",
                descriptor.id()
            )));
        }

        let model = MockModel::new(descriptor.id().to_string())
            .with_inference_delay(self.inference_delay)
            .with_failure_flag(Arc::clone(&self.inference_failing));
        Ok(Arc::new(model))
    }
}
