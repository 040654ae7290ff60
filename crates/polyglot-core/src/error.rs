//! Error types for Polyglot Core.

use std::time::Duration;

use polyglot_abstraction::{LanguageCode, LanguagePair};
use polyglot_models::{
    CacheConfigError, CacheError, ExecutorConfigError, ExecutorError, RegistryError,
    RegistryTableError,
};
use thiserror::Error;

/// Which side of a request a language code came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguageRole {
    Source,
    Target,
}

impl std::fmt::Display for LanguageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Target => f.write_str("target"),
        }
    }
}

fn supported_codes() -> String {
    LanguageCode::ALL.iter().map(|c| c.code()).collect::<Vec<_>>().join(", ")
}

/// Failure of a single translation request.
///
/// Client errors (`InvalidLanguage`, `EmptyInput`, `InputTooLong`) are
/// reported immediately and should not be retried. Everything else is a
/// server-side failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    #[error("Unsupported {role} language: {code}. Supported: {}", supported_codes())]
    InvalidLanguage { role: LanguageRole, code: String },

    #[error("Text cannot be empty")]
    EmptyInput,

    #[error("Text is {chars} characters long, maximum is {max}")]
    InputTooLong { chars: usize, max: usize },

    #[error("No model covers language pair {pair}")]
    Unsupported { pair: LanguagePair },

    #[error("Model '{model}' failed to load: {message}")]
    ModelLoadFailure { model: String, message: String },

    #[error("Translation with '{model}' failed: {message}")]
    InferenceFailure { model: String, message: String },

    #[error("Timed out after {after:?} {stage} '{model}'")]
    Timeout { model: String, stage: TimeoutStage, after: Duration },

    #[error("Translation service is shutting down")]
    Unavailable,
}

/// The step of a request that ran out of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStage {
    Loading,
    Inference,
}

impl std::fmt::Display for TimeoutStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loading => f.write_str("waiting for model"),
            Self::Inference => f.write_str("running model"),
        }
    }
}

impl TranslateError {
    /// Stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidLanguage { .. } => "invalid_language",
            Self::EmptyInput => "empty_input",
            Self::InputTooLong { .. } => "input_too_long",
            Self::Unsupported { .. } => "unsupported_pair",
            Self::ModelLoadFailure { .. } => "model_load_failure",
            Self::InferenceFailure { .. } => "inference_failure",
            Self::Timeout { .. } => "timeout",
            Self::Unavailable => "unavailable",
        }
    }

    /// Whether the caller sent a request that can never succeed as is.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidLanguage { .. } | Self::EmptyInput | Self::InputTooLong { .. })
    }

    /// Whether repeating the request later may succeed.
    ///
    /// `Unsupported` is a routing-table bug and `Unavailable` means this
    /// instance is going away; neither is retryable here.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::ModelLoadFailure { .. } | Self::InferenceFailure { .. } | Self::Timeout { .. }
        )
    }
}

impl From<RegistryError> for TranslateError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::Unsupported(pair) | RegistryError::IdentityPair(pair) => {
                Self::Unsupported { pair }
            }
        }
    }
}

impl From<CacheError> for TranslateError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::LoadFailed { model, source } => {
                Self::ModelLoadFailure { model, message: source.to_string() }
            }
            CacheError::LoadTimeout { model, after } => {
                Self::Timeout { model, stage: TimeoutStage::Loading, after }
            }
            CacheError::Closed => Self::Unavailable,
        }
    }
}

impl From<ExecutorError> for TranslateError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::InputTooLong { chars, max } => Self::InputTooLong { chars, max },
            ExecutorError::Timeout { model, after } => {
                Self::Timeout { model, stage: TimeoutStage::Inference, after }
            }
            ExecutorError::Model { model, source } => {
                Self::InferenceFailure { model, message: source.to_string() }
            }
            ExecutorError::EmptyOutput { model } => Self::InferenceFailure {
                message: "model returned an empty translation".to_string(),
                model,
            },
            ExecutorError::Closed => Self::Unavailable,
        }
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or did not match the schema.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A value is out of range or inconsistent.
    #[error("Invalid configuration in [{section}]: {message}")]
    Invalid { section: &'static str, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(section: &'static str, message: impl ToString) -> Self {
        Self::Invalid { section, message: message.to_string() }
    }
}

impl From<CacheConfigError> for ConfigError {
    fn from(err: CacheConfigError) -> Self {
        Self::invalid("cache", err)
    }
}

impl From<ExecutorConfigError> for ConfigError {
    fn from(err: ExecutorConfigError) -> Self {
        Self::invalid("executor", err)
    }
}

impl From<RegistryTableError> for ConfigError {
    fn from(err: RegistryTableError) -> Self {
        Self::invalid("registry", err)
    }
}

/// Core error type for Polyglot start-up and serving.
#[derive(Error, Debug)]
pub enum PolyglotError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model backend could not be initialized
    #[error("Model backend error: {0}")]
    Backend(#[from] polyglot_abstraction::ModelError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Polyglot start-up operations.
pub type Result<T> = std::result::Result<T, PolyglotError>;
