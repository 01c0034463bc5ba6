use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

use crate::models::pricing::SourceSummary;
use crate::pricing::PricingError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Insufficient data: no source returned usable salary data")]
    InsufficientData { sources: Vec<SourceSummary> },
}

impl From<PricingError> for AppError {
    fn from(e: PricingError) -> Self {
        match e {
            PricingError::Validation(msg) => AppError::Validation(msg),
            PricingError::InsufficientData { sources } => AppError::InsufficientData { sources },
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone(), None),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone(), None)
            }
            AppError::InsufficientData { sources } => {
                tracing::warn!(sources = sources.len(), "Pricing aborted: insufficient data");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INSUFFICIENT_DATA",
                    "No source returned usable salary data for this job".to_string(),
                    Some(json!({ "sources": sources })),
                )
            }
        };

        let mut error = json!({
            "code": code,
            "message": message
        });
        if let (Some(details), Value::Object(map)) = (details, &mut error) {
            map.insert("details".to_string(), details);
        }

        (status, Json(json!({ "error": error }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::pricing::SourceStatus;
    use crate::sources::SourceKind;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_maps_to_400_envelope() {
        let error = AppError::from(PricingError::Validation("job_title is required".into()));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(body["error"]["message"], "job_title is required");
        assert!(body["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn test_insufficient_data_lists_sources() {
        let sources = vec![SourceSummary {
            name: "job_board".into(),
            kind: SourceKind::JobBoard,
            status: SourceStatus::Unavailable {
                reason: "timed out after 3000ms".into(),
            },
            weight: 0.0,
            sample_size: None,
            quality_score: 0.0,
            recency_factor: 0.0,
            observation_date: None,
            match_level: None,
            original_currency: None,
            original_period: None,
        }];
        let response = AppError::from(PricingError::InsufficientData { sources }).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "INSUFFICIENT_DATA");
        let listed = &body["error"]["details"]["sources"][0];
        assert_eq!(listed["status"], "unavailable");
        assert_eq!(listed["reason"], "timed out after 3000ms");
    }

    #[tokio::test]
    async fn test_not_found_is_404() {
        let response = AppError::NotFound("no taxonomy entry 'X'".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
