//! Remote inference-server backend.
//!
//! Talks to any server implementing the Hugging Face Inference API
//! translation task (the hosted Inference API, text-generation-inference style
//! self-hosted servers, or a thin wrapper around `transformers`):
//!
//! ```text
//! POST {base_url}/models/{model_id}
//! {"inputs": "...", "parameters": {...}, "options": {"wait_for_model": true}}
//! -> [{"translation_text": "..."}]
//! ```
//!
//! "Loading" a remote model means asking the server to bring the weights into
//! memory and waiting until it answers a warm-up request.

use async_trait::async_trait;
use polyglot_abstraction::{
    GenerationParams, LanguageCode, LanguagePair, ModelError, ModelOutput, TranslationModel,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::factory::ModelLoader;
use crate::registry::{ModelDescriptor, ModelKind};

/// Text used to warm a model up during load.
const WARM_UP_TEXT: &str = "Hello";

/// A model hosted on a remote inference server.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    /// The model identifier (e.g. "Helsinki-NLP/opus-mt-en-jap").
    model_id: String,
    /// Multilingual models need explicit source/target language codes.
    multilingual: bool,
    /// Base URL of the inference server.
    base_url: String,
    /// Optional bearer token.
    api_token: Option<String>,
    /// Timeout for a single translation request.
    request_timeout: Duration,
    /// HTTP client for requests.
    client: Client,
}

#[derive(Debug, Serialize)]
struct InferenceRequest<'a> {
    inputs: &'a str,
    parameters: InferenceParameters<'a>,
    options: InferenceOptions,
}

#[derive(Debug, Serialize)]
struct InferenceParameters<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    src_lang: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tgt_lang: Option<&'static str>,
    generate_parameters: &'a GenerationParams,
}

#[derive(Debug, Serialize)]
struct InferenceOptions {
    wait_for_model: bool,
    use_cache: bool,
}

#[derive(Debug, Deserialize)]
struct TranslationItem {
    translation_text: String,
}

impl RemoteModel {
    /// Creates a handle for `descriptor` on the server at `base_url`.
    #[must_use]
    pub fn new(
        descriptor: &ModelDescriptor,
        base_url: String,
        api_token: Option<String>,
        request_timeout: Duration,
        client: Client,
    ) -> Self {
        Self {
            model_id: descriptor.id().to_string(),
            multilingual: descriptor.kind() == ModelKind::Fallback,
            base_url,
            api_token,
            request_timeout,
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}", self.base_url.trim_end_matches('/'), self.model_id)
    }

    /// Sends a warm-up translation and waits until the server has the model
    /// in memory.
    ///
    /// # Errors
    /// Returns a `ModelError` if the server cannot serve the model.
    pub async fn warm_up(&self, pair: LanguagePair, timeout: Duration) -> Result<(), ModelError> {
        let params = GenerationParams { max_new_tokens: 8, num_beams: 1, ..GenerationParams::default() };
        self.send(pair, WARM_UP_TEXT, &params, timeout).await.map(|_| ())
    }

    async fn send(
        &self,
        pair: LanguagePair,
        text: &str,
        params: &GenerationParams,
        timeout: Duration,
    ) -> Result<String, ModelError> {
        let url = self.endpoint();
        let (src_lang, tgt_lang) = if self.multilingual {
            (Some(pair.source.flores_code()), Some(pair.target.flores_code()))
        } else {
            (None, None)
        };

        let body = InferenceRequest {
            inputs: text,
            parameters: InferenceParameters { src_lang, tgt_lang, generate_parameters: params },
            options: InferenceOptions { wait_for_model: true, use_cache: false },
        };

        let mut request = self.client.post(&url).timeout(timeout).json(&body);
        if let Some(ref token) = self.api_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to send request to inference server");
            ModelError::RequestError(format!("Network error: {e}"))
        })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = %status, error = %error_text, url = %url, "Inference server returned error status");
            return Err(map_error_status(status, &self.model_id, error_text));
        }

        let items: Vec<TranslationItem> = response.json().await.map_err(|e| {
            error!(error = %e, url = %url, "Failed to parse inference server response");
            ModelError::SerializationError(format!("Failed to parse response: {e}"))
        })?;

        items.into_iter().next().map(|item| item.translation_text).ok_or_else(|| {
            ModelError::ModelResponseError("No translation in inference response".to_string())
        })
    }
}

fn map_error_status(status: StatusCode, model_id: &str, error_text: String) -> ModelError {
    match status.as_u16() {
        401 | 403 => ModelError::Unauthorized(format!("Authentication failed ({status}): {error_text}")),
        404 => ModelError::ModelNotFound(format!("{model_id}: {error_text}")),
        429 => ModelError::QuotaExceeded { provider: "remote".to_string(), message: Some(error_text) },
        500..=599 => ModelError::ModelResponseError(format!("Server error ({status}): {error_text}")),
        _ => ModelError::ModelResponseError(format!("API error ({status}): {error_text}")),
    }
}

#[async_trait]
impl TranslationModel for RemoteModel {
    async fn translate(
        &self,
        pair: LanguagePair,
        text: &str,
        params: &GenerationParams,
    ) -> Result<ModelOutput, ModelError> {
        debug!(
            model_id = %self.model_id,
            %pair,
            text_len = text.len(),
            max_new_tokens = params.max_new_tokens,
            "RemoteModel translating"
        );

        let text = self.send(pair, text, params, self.request_timeout).await?;
        Ok(ModelOutput { text, model_id: Some(self.model_id.clone()) })
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

/// Loader producing [`RemoteModel`]s.
#[derive(Debug, Clone)]
pub struct RemoteLoader {
    base_url: String,
    api_token: Option<String>,
    request_timeout: Duration,
    load_timeout: Duration,
    client: Client,
}

impl RemoteLoader {
    /// Creates a loader for the server at `base_url`.
    ///
    /// # Errors
    /// Returns a `ModelError` if the HTTP client cannot be built.
    pub fn new(
        base_url: String,
        api_token: Option<String>,
        request_timeout: Duration,
        load_timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ModelError::RequestError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { base_url, api_token, request_timeout, load_timeout, client })
    }
}

#[async_trait]
impl ModelLoader for RemoteLoader {
    async fn load(
        &self,
        descriptor: &ModelDescriptor,
    ) -> Result<Arc<dyn TranslationModel>, ModelError> {
        let model = RemoteModel::new(
            descriptor,
            self.base_url.clone(),
            self.api_token.clone(),
            self.request_timeout,
            self.client.clone(),
        );

        let pair = descriptor
            .pairs()
            .into_iter()
            .next()
            .unwrap_or_else(|| LanguagePair::new(LanguageCode::En, LanguageCode::Ja));
        model.warm_up(pair, self.load_timeout).await?;

        info!(model = %descriptor.id(), base_url = %self.base_url, "Remote model warmed up");
        Ok(Arc::new(model))
    }
}
