//! Content-type aware body extractor
//!
//! `ContactForm` decodes a [`ContactSubmission`] from either a JSON or a
//! URL-encoded body, picking the decoder from the declared content type.
//! A request without a content type is treated as JSON.

use axum::{
    async_trait,
    body::Bytes,
    extract::{FromRequest, Request},
    http::{header::CONTENT_TYPE, HeaderMap},
    Form,
};
use contact_shared::ContactSubmission;

use crate::error::ApiError;

const JSON: &str = "application/json";
const URL_ENCODED: &str = "application/x-www-form-urlencoded";

pub struct ContactForm(pub ContactSubmission);

#[async_trait]
impl<S> FromRequest<S> for ContactForm
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = declared_content_type(req.headers())?;

        match content_type.as_str() {
            JSON => {
                let body = Bytes::from_request(req, state)
                    .await
                    .map_err(|err| ApiError::MalformedBody(err.body_text()))?;
                serde_json::from_slice::<ContactSubmission>(&body)
                    .map(ContactForm)
                    .map_err(|err| ApiError::MalformedBody(err.to_string()))
            }
            URL_ENCODED => {
                let Form(submission) = Form::<ContactSubmission>::from_request(req, state)
                    .await
                    .map_err(|err| ApiError::MalformedBody(err.body_text()))?;
                Ok(ContactForm(submission))
            }
            other => Err(ApiError::UnsupportedContentType(other.to_string())),
        }
    }
}

/// Media type without parameters, lowercased. Defaults to JSON when absent.
fn declared_content_type(headers: &HeaderMap) -> Result<String, ApiError> {
    let Some(value) = headers.get(CONTENT_TYPE) else {
        return Ok(JSON.to_string());
    };

    let raw = value
        .to_str()
        .map_err(|_| ApiError::UnsupportedContentType("<non-ascii>".to_string()))?;

    let media_type = raw.split(';').next().unwrap_or_default().trim();
    if media_type.is_empty() {
        return Ok(JSON.to_string());
    }
    Ok(media_type.to_ascii_lowercase())
}
