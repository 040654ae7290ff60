//! The translation request dispatcher.
//!
//! A request moves through `Validated → Resolved → Acquiring → Executing →
//! Completed`, or ends in `Failed` at any step. Identity pairs stop after
//! validation and never reach the registry or the cache.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use polyglot_abstraction::{LanguageCode, LanguagePair};
use polyglot_models::{
    BackendKind, LanguageInfo, ModelCache, ModelDescriptor, ModelFactory, ModelLoader,
    ModelRegistry, TranslationExecutor,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{ConfigError, LanguageRole, Result, TranslateError};

/// `model_used` marker for identity translations.
pub const PASS_THROUGH: &str = "pass-through";

/// An incoming translation request with unvalidated language codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

impl TranslationRequest {
    #[must_use]
    pub fn new(text: impl Into<String>, source_lang: impl Into<String>, target_lang: impl Into<String>) -> Self {
        Self { text: text.into(), source_lang: source_lang.into(), target_lang: target_lang.into() }
    }
}

/// A completed translation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub translated_text: String,
    /// Descriptor identifier, or [`PASS_THROUGH`].
    pub model_used: String,
    pub source_lang: LanguageCode,
    pub target_lang: LanguageCode,
}

/// Liveness snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub backend: BackendKind,
    /// Sorted identifiers of ready models.
    pub loaded_models: Vec<String>,
}

/// How a pair would be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    PassThrough,
    Model(Arc<ModelDescriptor>),
}

impl Route {
    /// The value reported as `model_used`.
    #[must_use]
    pub fn model_used(&self) -> &str {
        match self {
            Self::PassThrough => PASS_THROUGH,
            Self::Model(descriptor) => descriptor.id(),
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PassThrough => f.write_str(PASS_THROUGH),
            Self::Model(descriptor) => write!(f, "{descriptor}"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    Validated,
    Resolved,
    Acquiring,
    Executing,
    Completed,
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Validated => "validated",
            Self::Resolved => "resolved",
            Self::Acquiring => "acquiring",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Entry point for translations: validates, routes, loads and executes.
pub struct TranslationService {
    registry: Arc<ModelRegistry>,
    cache: Arc<ModelCache>,
    executor: TranslationExecutor,
    max_text_length: usize,
    backend: BackendKind,
}

impl fmt::Debug for TranslationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationService")
            .field("backend", &self.backend)
            .field("max_text_length", &self.max_text_length)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl TranslationService {
    /// Assemble a service from already-built parts.
    #[must_use]
    pub fn new(
        registry: Arc<ModelRegistry>,
        cache: Arc<ModelCache>,
        executor: TranslationExecutor,
        max_text_length: usize,
        backend: BackendKind,
    ) -> Self {
        Self { registry, cache, executor, max_text_length, backend }
    }

    /// Build a service with the loader of the configured backend.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or the backend cannot
    /// be initialized.
    pub fn from_config(config: &Config) -> Result<Self> {
        let loader = ModelFactory::create_loader(&config.backend)?;
        Self::with_loader(config, loader)
    }

    /// Build a service around an explicit loader.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn with_loader(config: &Config, loader: Arc<dyn ModelLoader>) -> Result<Self> {
        config.validate()?;
        let registry = ModelRegistry::from_config(&config.registry).map_err(ConfigError::from)?;
        let cache = ModelCache::new(config.cache.clone(), loader).map_err(ConfigError::from)?;
        let executor = TranslationExecutor::new(config.executor.clone()).map_err(ConfigError::from)?;

        Ok(Self::new(
            Arc::new(registry),
            Arc::new(cache),
            executor,
            config.limits.max_text_length,
            config.backend.kind,
        ))
    }

    /// Translate one request.
    ///
    /// # Errors
    /// Returns a `TranslateError`; no partial result is ever produced.
    pub async fn translate(
        &self,
        request: &TranslationRequest,
    ) -> std::result::Result<TranslationResult, TranslateError> {
        let started = Instant::now();
        let result = self.dispatch(request).await;
        match &result {
            Ok(done) => debug!(
                stage = %Stage::Completed,
                model = %done.model_used,
                elapsed_ms = started.elapsed().as_millis(),
                "Translation completed"
            ),
            Err(e) => warn!(
                stage = %Stage::Failed,
                source = %request.source_lang,
                target = %request.target_lang,
                error = %e,
                code = e.code(),
                elapsed_ms = started.elapsed().as_millis(),
                "Translation failed"
            ),
        }
        result
    }

    async fn dispatch(
        &self,
        request: &TranslationRequest,
    ) -> std::result::Result<TranslationResult, TranslateError> {
        let pair = self.validate(request)?;
        debug!(stage = %Stage::Validated, source = %pair.source, target = %pair.target, "Request validated");

        if pair.is_identity() {
            return Ok(TranslationResult {
                translated_text: request.text.clone(),
                model_used: PASS_THROUGH.to_string(),
                source_lang: pair.source,
                target_lang: pair.target,
            });
        }

        let descriptor = self.registry.resolve(pair)?;
        debug!(stage = %Stage::Resolved, model = %descriptor.id(), kind = %descriptor.kind(), "Model resolved");

        debug!(stage = %Stage::Acquiring, model = %descriptor.id(), "Acquiring model");
        let model = self.cache.acquire(&descriptor).await?;

        debug!(stage = %Stage::Executing, model = %descriptor.id(), "Executing translation");
        let translated_text = self.executor.run(model.as_ref(), pair, &request.text).await?;

        Ok(TranslationResult {
            translated_text,
            model_used: descriptor.id().to_string(),
            source_lang: pair.source,
            target_lang: pair.target,
        })
    }

    /// Languages first, then text.
    fn validate(
        &self,
        request: &TranslationRequest,
    ) -> std::result::Result<LanguagePair, TranslateError> {
        let source = parse_language(&request.source_lang, LanguageRole::Source)?;
        let target = parse_language(&request.target_lang, LanguageRole::Target)?;

        if request.text.trim().is_empty() {
            return Err(TranslateError::EmptyInput);
        }
        let chars = request.text.chars().count();
        if chars > self.max_text_length {
            return Err(TranslateError::InputTooLong { chars, max: self.max_text_length });
        }

        Ok(LanguagePair::new(source, target))
    }

    /// Which model would serve `source → target`, without loading anything.
    ///
    /// # Errors
    /// `InvalidLanguage` for unknown codes, `Unsupported` if nothing covers
    /// the pair.
    pub fn route(&self, source: &str, target: &str) -> std::result::Result<Route, TranslateError> {
        let pair = LanguagePair::new(
            parse_language(source, LanguageRole::Source)?,
            parse_language(target, LanguageRole::Target)?,
        );
        if pair.is_identity() {
            return Ok(Route::PassThrough);
        }
        Ok(Route::Model(self.registry.resolve(pair)?))
    }

    /// Read-only snapshot of the ready models.
    ///
    /// Reports `unavailable` once the service has been shut down.
    #[must_use]
    pub fn health(&self) -> HealthReport {
        let status = if self.cache.is_closed() { "unavailable" } else { "healthy" };
        HealthReport { status, backend: self.backend, loaded_models: self.cache.loaded_models() }
    }

    /// Supported languages with display metadata.
    #[must_use]
    pub fn languages(&self) -> Vec<LanguageInfo> {
        self.registry.languages()
    }

    /// Load the model serving `pair` without translating anything.
    ///
    /// # Errors
    /// `Unsupported` if nothing covers the pair, or the cache's load error.
    pub async fn warm(&self, pair: LanguagePair) -> std::result::Result<(), TranslateError> {
        if pair.is_identity() {
            return Ok(());
        }
        let descriptor = self.registry.resolve(pair)?;
        self.cache.acquire(&descriptor).await?;
        Ok(())
    }

    /// Warm `pairs` in the background, one after another.
    ///
    /// Failures are logged and skipped. Loads share single-flight with live
    /// traffic, so requests arriving meanwhile wait on the same load.
    pub fn preload(self: &Arc<Self>, pairs: Vec<LanguagePair>) -> JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            info!(count = pairs.len(), "Preloading models");
            for pair in pairs {
                match service.warm(pair).await {
                    Ok(()) => debug!(%pair, "Preloaded model"),
                    Err(e) => warn!(%pair, error = %e, "Failed to preload model"),
                }
            }
            info!(loaded = ?service.cache.loaded_models(), "Preloading finished");
        })
    }

    /// The model cache.
    #[must_use]
    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    /// The routing table.
    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// The configured backend.
    #[must_use]
    pub fn backend(&self) -> BackendKind {
        self.backend
    }

    /// Release every loaded model and refuse further translations.
    pub fn shutdown(&self) {
        self.cache.shutdown();
    }
}

fn parse_language(code: &str, role: LanguageRole) -> std::result::Result<LanguageCode, TranslateError> {
    code.parse().map_err(|_| TranslateError::InvalidLanguage { role, code: code.to_string() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyglot_models::MockLoader;

    fn service() -> (TranslationService, Arc<MockLoader>) {
        let loader = Arc::new(MockLoader::new());
        let service =
            TranslationService::with_loader(&Config::default(), Arc::clone(&loader) as Arc<dyn ModelLoader>)
                .unwrap();
        (service, loader)
    }

    #[test]
    fn test_route() {
        let (service, _) = service();
        assert_eq!(service.route("en", "en").unwrap(), Route::PassThrough);
        assert_eq!(service.route("en", "ja").unwrap().model_used(), "Helsinki-NLP/opus-mt-en-jap");
        assert_eq!(service.route("si", "zh").unwrap().model_used(), "facebook/nllb-200-1.3B");
        assert!(matches!(
            service.route("xx", "ja"),
            Err(TranslateError::InvalidLanguage { role: LanguageRole::Source, .. })
        ));
    }

    #[tokio::test]
    async fn test_validation_order_languages_before_text() {
        let (service, _) = service();
        let err = service.translate(&TranslationRequest::new("", "en", "fr")).await.unwrap_err();
        assert!(matches!(err, TranslateError::InvalidLanguage { role: LanguageRole::Target, .. }));
    }

    #[tokio::test]
    async fn test_input_too_long() {
        let (service, loader) = service();
        let text = "a".repeat(5001);
        let err = service.translate(&TranslationRequest::new(text, "en", "ja")).await.unwrap_err();
        assert_eq!(err, TranslateError::InputTooLong { chars: 5001, max: 5000 });
        assert_eq!(loader.load_count(), 0);

        let text = "a".repeat(5000);
        assert!(service.translate(&TranslationRequest::new(text, "en", "ja")).await.is_ok());
    }

    #[tokio::test]
    async fn test_pass_through_keeps_text_verbatim() {
        let (service, loader) = service();
        let result =
            service.translate(&TranslationRequest::new("  spaced  ", "hi", "hi")).await.unwrap();
        assert_eq!(result.translated_text, "  spaced  ");
        assert_eq!(result.model_used, PASS_THROUGH);
        assert_eq!(loader.load_count(), 0);
    }

    #[tokio::test]
    async fn test_warm_and_health() {
        let (service, _) = service();
        assert!(service.health().loaded_models.is_empty());

        service.warm(LanguagePair::new(LanguageCode::Zh, LanguageCode::En)).await.unwrap();
        let health = service.health();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.backend, BackendKind::Mock);
        assert_eq!(health.loaded_models, vec!["Helsinki-NLP/opus-mt-zh-en".to_string()]);
    }

    #[tokio::test]
    async fn test_shutdown_makes_service_unavailable() {
        let (service, _) = service();
        service.warm(LanguagePair::new(LanguageCode::En, LanguageCode::Ja)).await.unwrap();
        service.shutdown();
        let err = service.translate(&TranslationRequest::new("Hi", "en", "ja")).await.unwrap_err();
        assert_eq!(err, TranslateError::Unavailable);

        let health = service.health();
        assert_eq!(health.status, "unavailable");
        assert!(health.loaded_models.is_empty());

        // Pass-through needs no model and keeps working.
        assert!(service.translate(&TranslationRequest::new("Hi", "en", "en")).await.is_ok());
    }
}
