use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::relay::RelayError;
use crate::validation::ValidationFailure;

const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(ValidationFailure),
    #[error("unsupported content type `{0}`")]
    UnsupportedContentType(String),
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("no localization for language `{0}`")]
    UnknownLanguage(String),
    #[error("email relay failed: {0}")]
    Relay(#[from] RelayError),
}

/// Body shape shared by every response the handler emits.
#[derive(Debug, Serialize)]
pub struct StatusBody {
    pub msg: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl StatusBody {
    pub fn ok() -> Self {
        Self {
            msg: "OK",
            error: None,
        }
    }

    pub fn code(msg: &'static str) -> Self {
        Self { msg, error: None }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub kind: &'static str,
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<ValidationFailure> for ApiError {
    fn from(failure: ValidationFailure) -> Self {
        ApiError::Validation(failure)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable identifier for the failure, safe to hand to clients.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation(failure) => failure.code(),
            ApiError::UnsupportedContentType(_) => "UNSUPPORTED_CONTENT_TYPE",
            ApiError::MalformedBody(_) => "MALFORMED_BODY",
            ApiError::UnknownLanguage(_) => "UNKNOWN_LANGUAGE",
            ApiError::Relay(_) => "RELAY_FAILED",
        }
    }

    /// Render the error, attaching the human-readable detail to server
    /// errors only when `expose_detail` is set.
    pub fn into_response_with(self, expose_detail: bool) -> Response {
        if let ApiError::Validation(failure) = self {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusBody::code(failure.code())),
            )
                .into_response();
        }

        let correlation_id = Uuid::new_v4().to_string();
        tracing::error!(
            kind = self.kind(),
            correlation_id = %correlation_id,
            error = %self,
            "contact request failed"
        );

        let payload = StatusBody {
            msg: "ERROR",
            error: Some(ErrorDetail {
                kind: self.kind(),
                correlation_id: correlation_id.clone(),
                detail: expose_detail.then(|| self.to_string()),
            }),
        };

        let mut response = (self.status(), Json(payload)).into_response();
        if let Ok(value) = HeaderValue::from_str(&correlation_id) {
            response
                .headers_mut()
                .insert(header::HeaderName::from_static(CORRELATION_HEADER), value);
        }
        response
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.into_response_with(false)
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    async fn body_json(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_is_bare_400() {
        let response = ApiError::Validation(ValidationFailure::MalformedEmail).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!response.headers().contains_key(CORRELATION_HEADER));
        assert_eq!(body_json(response).await, serde_json::json!({"msg": "MALFORMED_EMAIL"}));
    }

    #[tokio::test]
    async fn test_server_error_hides_detail_by_default() {
        let response = ApiError::UnknownLanguage("fr".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.headers().contains_key(CORRELATION_HEADER));

        let body = body_json(response).await;
        assert_eq!(body["msg"], "ERROR");
        assert_eq!(body["error"]["kind"], "UNKNOWN_LANGUAGE");
        assert!(body["error"].get("detail").is_none());
    }

    #[tokio::test]
    async fn test_server_error_exposes_detail_when_enabled() {
        let response =
            ApiError::UnsupportedContentType("text/plain".into()).into_response_with(true);
        let body = body_json(response).await;
        assert_eq!(body["error"]["kind"], "UNSUPPORTED_CONTENT_TYPE");
        assert_eq!(
            body["error"]["detail"],
            "unsupported content type `text/plain`"
        );
    }

    #[test]
    fn test_kinds_are_distinct() {
        let kinds = [
            ApiError::UnsupportedContentType(String::new()).kind(),
            ApiError::MalformedBody(String::new()).kind(),
            ApiError::UnknownLanguage(String::new()).kind(),
            ApiError::Relay(RelayError::Timeout).kind(),
        ];
        let unique: std::collections::HashSet<_> = kinds.iter().collect();
        assert_eq!(unique.len(), kinds.len());
    }
}
