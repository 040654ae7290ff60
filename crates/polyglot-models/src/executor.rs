//! Translation executor: runs one inference on a ready model.
//!
//! The executor owns the input-length policy, the decoding parameters, the
//! concurrency bound and the inference timeout. It does no caching and no
//! language validation.

use polyglot_abstraction::{GenerationParams, LanguagePair, ModelError, TranslationModel};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::{debug, warn};

/// What to do with input longer than `max_input_chars`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Fail with `ExecutorError::InputTooLong`.
    #[default]
    Reject,
    /// Keep the first `max_input_chars` characters.
    Truncate,
}

/// Executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Maximum input length in characters.
    #[serde(default = "default_max_input_chars")]
    pub max_input_chars: usize,

    /// Policy for input over the limit.
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Maximum number of inferences running at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound on one inference, queueing included, in seconds.
    #[serde(default = "default_inference_timeout_secs")]
    pub inference_timeout_secs: u64,

    /// Lower clamp for `max_new_tokens`.
    #[serde(default = "default_min_new_tokens")]
    pub min_new_tokens: u32,

    /// Upper clamp for `max_new_tokens`.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

fn default_max_input_chars() -> usize {
    5000
}

fn default_max_concurrent() -> usize {
    4
}

fn default_inference_timeout_secs() -> u64 {
    60
}

fn default_min_new_tokens() -> u32 {
    32
}

fn default_max_new_tokens() -> u32 {
    256
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_input_chars: default_max_input_chars(),
            overflow: OverflowPolicy::default(),
            max_concurrent: default_max_concurrent(),
            inference_timeout_secs: default_inference_timeout_secs(),
            min_new_tokens: default_min_new_tokens(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

/// Invalid executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorConfigError {
    #[error("max_input_chars must be greater than 0")]
    InvalidMaxInputChars,

    #[error("max_concurrent must be greater than 0")]
    InvalidMaxConcurrent,

    #[error("inference_timeout_secs must be greater than 0")]
    InvalidTimeout,

    #[error("min_new_tokens ({min}) must be between 1 and max_new_tokens ({max})")]
    InvalidTokenRange { min: u32, max: u32 },
}

impl ExecutorConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns `ExecutorConfigError` for zero bounds or an inverted token range.
    pub fn validate(&self) -> Result<(), ExecutorConfigError> {
        if self.max_input_chars == 0 {
            return Err(ExecutorConfigError::InvalidMaxInputChars);
        }
        if self.max_concurrent == 0 {
            return Err(ExecutorConfigError::InvalidMaxConcurrent);
        }
        if self.inference_timeout_secs == 0 {
            return Err(ExecutorConfigError::InvalidTimeout);
        }
        if self.min_new_tokens == 0 || self.min_new_tokens > self.max_new_tokens {
            return Err(ExecutorConfigError::InvalidTokenRange {
                min: self.min_new_tokens,
                max: self.max_new_tokens,
            });
        }
        Ok(())
    }

    /// Get the inference timeout as a Duration.
    #[must_use]
    pub fn inference_timeout(&self) -> Duration {
        Duration::from_secs(self.inference_timeout_secs)
    }
}

/// Errors raised while running an inference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    /// Input exceeds the limit under the `reject` policy.
    #[error("input is {chars} characters, limit is {max}")]
    InputTooLong { chars: usize, max: usize },

    /// The inference (or the wait for a slot) took too long.
    #[error("inference on '{model}' timed out after {after:?}")]
    Timeout { model: String, after: Duration },

    /// The model returned nothing for non-empty input.
    #[error("model '{model}' returned an empty translation")]
    EmptyOutput { model: String },

    /// The model itself failed.
    #[error("inference on '{model}' failed: {source}")]
    Model {
        model: String,
        #[source]
        source: ModelError,
    },

    /// The executor no longer accepts work.
    #[error("executor is closed")]
    Closed,
}

impl ExecutorError {
    /// Whether the same call may succeed if repeated later.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Model { .. })
    }
}

/// Runs translations on ready models under a concurrency bound.
#[derive(Debug)]
pub struct TranslationExecutor {
    config: ExecutorConfig,
    semaphore: Arc<Semaphore>,
}

impl TranslationExecutor {
    /// Create an executor.
    ///
    /// # Errors
    /// Returns `ExecutorConfigError` if the configuration is invalid.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorConfigError> {
        config.validate()?;
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        Ok(Self { config, semaphore })
    }

    /// Get the executor configuration.
    #[must_use]
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Number of inference slots currently free.
    #[must_use]
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Decoding parameters for `text`.
    ///
    /// `max_new_tokens` is twice the token estimate, clamped to the configured
    /// range. The estimate is the larger of the word count and a quarter of
    /// the character count, rounded up.
    #[must_use]
    pub fn generation_params(&self, text: &str) -> GenerationParams {
        let words = text.split_whitespace().count();
        let chars = text.chars().count();
        let estimate = words.max(chars.div_ceil(4));
        let wanted = u32::try_from(estimate.saturating_mul(2)).unwrap_or(u32::MAX);

        GenerationParams {
            max_new_tokens: wanted.clamp(self.config.min_new_tokens, self.config.max_new_tokens),
            ..GenerationParams::default()
        }
    }

    /// Apply the overflow policy to `text`.
    ///
    /// # Errors
    /// Returns `ExecutorError::InputTooLong` under the `reject` policy.
    pub fn prepare_input<'a>(&self, text: &'a str) -> Result<Cow<'a, str>, ExecutorError> {
        let max = self.config.max_input_chars;
        let chars = text.chars().count();
        if chars <= max {
            return Ok(Cow::Borrowed(text));
        }

        match self.config.overflow {
            OverflowPolicy::Reject => Err(ExecutorError::InputTooLong { chars, max }),
            OverflowPolicy::Truncate => {
                let end = text.char_indices().nth(max).map_or(text.len(), |(idx, _)| idx);
                warn!(chars, max, "Input over limit, truncating");
                Ok(Cow::Owned(text[..end].to_string()))
            }
        }
    }

    /// Translate `text` with `model`.
    ///
    /// # Errors
    /// `InputTooLong` under the reject policy, `Timeout` if no slot or no
    /// answer arrived in time, `Model` if the model failed, `EmptyOutput` if
    /// it answered with only whitespace.
    pub async fn run(
        &self,
        model: &dyn TranslationModel,
        pair: LanguagePair,
        text: &str,
    ) -> Result<String, ExecutorError> {
        let model_id = model.model_id();
        let input = self.prepare_input(text)?;
        let params = self.generation_params(&input);
        let after = self.config.inference_timeout();
        let started = Instant::now();

        let outcome = timeout(after, async {
            let _permit = self.semaphore.acquire().await.map_err(|_| ExecutorError::Closed)?;
            debug!(model = %model_id, pair = %pair, max_new_tokens = params.max_new_tokens, "Running inference");
            model
                .translate(pair, &input, &params)
                .await
                .map_err(|source| ExecutorError::Model { model: model_id.to_string(), source })
        })
        .await;

        let output = match outcome {
            Ok(result) => result?,
            Err(_) => {
                warn!(model = %model_id, timeout_secs = after.as_secs(), "Inference timed out");
                return Err(ExecutorError::Timeout { model: model_id.to_string(), after });
            }
        };

        let translated = output.text.trim();
        if translated.is_empty() {
            return Err(ExecutorError::EmptyOutput { model: model_id.to_string() });
        }

        debug!(
            model = %model_id,
            elapsed_ms = started.elapsed().as_millis(),
            output_chars = translated.chars().count(),
            "Inference complete"
        );
        Ok(translated.to_string())
    }
}
