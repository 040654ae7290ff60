//! HTTP handlers.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use polyglot_abstraction::LanguageCode;
use polyglot_models::LanguageInfo;
use serde::Serialize;
use serde_json::{Value, json};

use crate::error::TranslateError;
use crate::service::{HealthReport, TranslationRequest, TranslationResult, TranslationService};

pub type AppState = Arc<TranslationService>;

/// Error body returned for every failed request.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub detail: String,
    pub retryable: bool,
}

/// A `TranslateError` rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub TranslateError);

impl From<TranslateError> for ApiError {
    fn from(err: TranslateError) -> Self {
        Self(err)
    }
}

/// HTTP status for each error class.
#[must_use]
pub const fn status_for(err: &TranslateError) -> StatusCode {
    match err {
        TranslateError::InvalidLanguage { .. }
        | TranslateError::EmptyInput
        | TranslateError::InputTooLong { .. } => StatusCode::BAD_REQUEST,
        TranslateError::Unsupported { .. }
        | TranslateError::ModelLoadFailure { .. }
        | TranslateError::InferenceFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        TranslateError::Timeout { .. } | TranslateError::Unavailable => {
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.0.code(),
            detail: self.0.to_string(),
            retryable: self.0.is_retryable(),
        };
        (status_for(&self.0), Json(body)).into_response()
    }
}

/// `GET /`
pub async fn root() -> Json<Value> {
    let codes: Vec<&str> = LanguageCode::ALL.iter().map(|c| c.code()).collect();
    Json(json!({
        "message": "Multi-Language Translation API",
        "version": env!("CARGO_PKG_VERSION"),
        "supported_languages": codes,
        "endpoints": {
            "translate": "/translate",
            "health": "/health",
            "languages": "/languages",
        },
    }))
}

/// `GET /health`, 503 once the service is shut down.
pub async fn health(State(service): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = service.health();
    let status = if service.cache().is_closed() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    (status, Json(report))
}

#[derive(Debug, Serialize)]
pub struct LanguagesBody {
    pub languages: Vec<LanguageInfo>,
}

/// `GET /languages`
pub async fn languages(State(service): State<AppState>) -> Json<LanguagesBody> {
    Json(LanguagesBody { languages: service.languages() })
}

/// `POST /translate`
pub async fn translate(
    State(service): State<AppState>,
    Json(request): Json<TranslationRequest>,
) -> Result<Json<TranslationResult>, ApiError> {
    Ok(Json(service.translate(&request).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use polyglot_abstraction::LanguagePair;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let pair = LanguagePair::new(LanguageCode::En, LanguageCode::Ja);
        assert_eq!(status_for(&TranslateError::EmptyInput), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_for(&TranslateError::InputTooLong { chars: 2, max: 1 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&TranslateError::Unsupported { pair }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for(&TranslateError::Timeout {
                model: "m".into(),
                stage: crate::error::TimeoutStage::Loading,
                after: Duration::from_secs(1),
            }),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(status_for(&TranslateError::Unavailable), StatusCode::SERVICE_UNAVAILABLE);
    }
}
