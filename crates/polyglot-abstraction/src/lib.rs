//! Model abstraction layer for polyglot.
//!
//! This crate defines the vocabulary shared by every other crate: the closed
//! language set, the contract a translation model has to fulfil, and the
//! errors a model may report.

mod language;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use language::{LanguageCode, LanguageError, LanguagePair};

/// Represents an error that can occur when loading or invoking a model.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelError {
    /// An error occurred while talking to the model backend (network, I/O).
    #[error("Request Error: {0}")]
    RequestError(String),

    /// The backend answered, but with an error or an unusable result.
    #[error("Model Response Error: {0}")]
    ModelResponseError(String),

    /// A payload could not be encoded or decoded.
    #[error("Serialization Error: {0}")]
    SerializationError(String),

    /// The backend does not know the requested model (e.g. missing weights).
    #[error("Model Not Found: {0}")]
    ModelNotFound(String),

    /// The backend rejected our credentials.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Backend capacity or rate limit exhausted.
    #[error("Provider '{provider}' quota exceeded{}", message.as_ref().map(|m| format!(": {m}")).unwrap_or_default())]
    QuotaExceeded {
        /// The backend name (e.g. "remote").
        provider: String,
        /// Optional error message from the backend.
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },

    /// Other unexpected errors.
    #[error("Other Model Error: {0}")]
    Other(String),
}

/// Decoding parameters handed to a model for one translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Upper bound on generated tokens.
    pub max_new_tokens: u32,
    /// Beam width for beam search.
    pub num_beams: u32,
    /// Stop beam search once every beam produced an end token.
    pub early_stopping: bool,
    /// Forbid repeating n-grams of this size.
    pub no_repeat_ngram_size: u32,
    /// Penalty applied to already generated tokens.
    pub repetition_penalty: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: 256,
            num_beams: 5,
            early_stopping: true,
            no_repeat_ngram_size: 3,
            repetition_penalty: 1.2,
        }
    }
}

/// The raw result of one model invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOutput {
    /// The translated text as produced by the model.
    pub text: String,
    /// Optional: the ID of the model that produced the output.
    pub model_id: Option<String>,
}

/// A loaded, ready-to-use translation model.
///
/// All models must be `Send + Sync` so a single instance can serve concurrent
/// requests once it is loaded.
#[async_trait]
pub trait TranslationModel: Send + Sync + std::fmt::Debug {
    /// Translates `text` along `pair`.
    ///
    /// # Errors
    /// Returns a `ModelError` if inference fails.
    async fn translate(
        &self,
        pair: LanguagePair,
        text: &str,
        params: &GenerationParams,
    ) -> Result<ModelOutput, ModelError>;

    /// Returns the identifier of the model.
    fn model_id(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_exceeded_display() {
        let err = ModelError::QuotaExceeded {
            provider: "remote".to_string(),
            message: Some("slow down".to_string()),
        };
        assert_eq!(err.to_string(), "Provider 'remote' quota exceeded: slow down");

        let err = ModelError::QuotaExceeded { provider: "remote".to_string(), message: None };
        assert_eq!(err.to_string(), "Provider 'remote' quota exceeded");
    }

    #[test]
    fn test_generation_params_default() {
        let params = GenerationParams::default();
        assert_eq!(params.num_beams, 5);
        assert_eq!(params.no_repeat_ngram_size, 3);
        assert!(params.early_stopping);
    }

    #[test]
    fn test_model_error_serialization_round_trip() {
        let err = ModelError::ModelNotFound("facebook/nllb-200-1.3B".to_string());
        let json = serde_json::to_string(&err).unwrap();
        let back: ModelError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
