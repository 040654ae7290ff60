//! Model loaders and the factory that builds them from configuration.
//!
//! A loader turns a [`ModelDescriptor`] into a ready [`TranslationModel`].
//! Loading is the expensive step (allocating weights, fetching them over the
//! network) that the cache runs at most once per descriptor at a time.

use async_trait::async_trait;
use polyglot_abstraction::{ModelError, TranslationModel};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::registry::ModelDescriptor;
use crate::{MockLoader, RemoteLoader};

/// Turns descriptors into loaded models.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    /// Loads the model described by `descriptor`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the model cannot be brought into a usable
    /// state (missing weights, resource exhaustion, backend unreachable).
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<Arc<dyn TranslationModel>, ModelError>;
}

/// Backend enumeration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Deterministic in-process models for development and testing.
    #[default]
    Mock,
    /// Models hosted on a Hugging Face Inference API compatible server.
    Remote,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mock => f.write_str("mock"),
            Self::Remote => f.write_str("remote"),
        }
    }
}

/// Backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Which backend serves the models.
    #[serde(default)]
    pub kind: BackendKind,

    /// Base URL of the inference server (remote backend).
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Optional bearer token for the inference server.
    #[serde(default)]
    pub api_token: Option<String>,

    /// Timeout for one translation request in seconds (remote backend).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Timeout for the warm-up request issued during load (remote backend).
    #[serde(default = "default_warm_up_timeout_secs")]
    pub warm_up_timeout_secs: u64,

    /// Artificial load latency in milliseconds (mock backend).
    #[serde(default)]
    pub mock_load_delay_ms: u64,
}

fn default_base_url() -> String {
    "https://api-inference.huggingface.co".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_warm_up_timeout_secs() -> u64 {
    600
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            base_url: default_base_url(),
            api_token: None,
            request_timeout_secs: default_request_timeout_secs(),
            warm_up_timeout_secs: default_warm_up_timeout_secs(),
            mock_load_delay_ms: 0,
        }
    }
}

impl BackendConfig {
    /// Creates a configuration for the given backend with default settings.
    #[must_use]
    pub fn new(kind: BackendKind) -> Self {
        Self { kind, ..Self::default() }
    }

    /// Sets the base URL of the inference server.
    #[must_use]
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Sets the bearer token for the inference server.
    #[must_use]
    pub fn with_api_token(mut self, api_token: String) -> Self {
        self.api_token = Some(api_token);
        self
    }
}

/// Factory for creating model loaders.
pub struct ModelFactory;

impl ModelFactory {
    /// Creates the loader for the configured backend.
    ///
    /// # Errors
    /// Returns a `ModelError` if the backend cannot be initialized.
    pub fn create_loader(config: &BackendConfig) -> Result<Arc<dyn ModelLoader>, ModelError> {
        debug!(backend = %config.kind, "Creating model loader");

        match config.kind {
            BackendKind::Mock => Ok(Arc::new(
                MockLoader::new().with_load_delay(Duration::from_millis(config.mock_load_delay_ms)),
            )),
            BackendKind::Remote => {
                if config.base_url.trim().is_empty() {
                    return Err(ModelError::Other(
                        "base_url is required for the remote backend".to_string(),
                    ));
                }
                let loader = RemoteLoader::new(
                    config.base_url.clone(),
                    config.api_token.clone(),
                    Duration::from_secs(config.request_timeout_secs),
                    Duration::from_secs(config.warm_up_timeout_secs),
                )?;
                Ok(Arc::new(loader))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyglot_abstraction::{LanguageCode, LanguagePair};

    #[test]
    fn test_backend_kind_serde_names() {
        assert_eq!(serde_json::to_string(&BackendKind::Remote).unwrap(), r#""remote""#);
        let kind: BackendKind = serde_json::from_str(r#""mock""#).unwrap();
        assert_eq!(kind, BackendKind::Mock);
        assert!(serde_json::from_str::<BackendKind>(r#""huggingface""#).is_err());
        assert_eq!(BackendKind::Remote.to_string(), "remote");
    }

    #[test]
    fn test_backend_config_builders() {
        let config = BackendConfig::new(BackendKind::Remote)
            .with_base_url("http://localhost:8080".to_string())
            .with_api_token("token".to_string());
        assert_eq!(config.kind, BackendKind::Remote);
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.api_token.as_deref(), Some("token"));
        assert_eq!(config.request_timeout_secs, 60);
    }

    #[test]
    fn test_backend_config_deserialize_defaults() {
        let config: BackendConfig = serde_json::from_str(r#"{"kind": "remote"}"#).unwrap();
        assert_eq!(config.kind, BackendKind::Remote);
        assert_eq!(config.base_url, "https://api-inference.huggingface.co");
        assert_eq!(config.api_token, None);
    }

    #[tokio::test]
    async fn test_factory_create_mock_loader() {
        let loader = ModelFactory::create_loader(&BackendConfig::default()).unwrap();
        let descriptor = ModelDescriptor::Specialized {
            id: "test-mock".to_string(),
            pair: LanguagePair::new(LanguageCode::En, LanguageCode::Hi),
        };
        let model = loader.load(&descriptor).await.unwrap();
        assert_eq!(model.model_id(), "test-mock");
    }

    #[test]
    fn test_factory_create_remote_requires_base_url() {
        let config = BackendConfig::new(BackendKind::Remote).with_base_url("  ".to_string());
        assert!(ModelFactory::create_loader(&config).is_err());
    }
}
