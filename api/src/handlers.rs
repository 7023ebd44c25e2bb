use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use contact_shared::{strings_for, ContactSubmission, OutboundMessage};

use crate::{
    error::{ApiError, ApiResult, StatusBody},
    extract::ContactForm,
    state::AppState,
    validation::validate_submission,
};

/// `POST /`: sanitize, validate and relay one contact submission.
pub async fn submit_contact_request(
    State(state): State<AppState>,
    body: Result<ContactForm, ApiError>,
) -> Response {
    let outcome = match body {
        Ok(ContactForm(submission)) => relay_submission(&state, submission).await,
        Err(err) => Err(err),
    };

    match outcome {
        Ok(()) => (StatusCode::OK, Json(StatusBody::ok())).into_response(),
        Err(err) => err.into_response_with(state.expose_error_details),
    }
}

async fn relay_submission(state: &AppState, submission: ContactSubmission) -> ApiResult<()> {
    let message = compose_message(state, &submission)?;
    state.relay.send(&message).await?;

    tracing::info!(lang = %submission.lang, "Contact request relayed");
    Ok(())
}

/// Sanitize the submission, resolve its subject and validate it, yielding the
/// message ready for the relay. The language is resolved before validation,
/// so an unknown language fails even an otherwise malformed submission.
pub fn compose_message(
    state: &AppState,
    submission: &ContactSubmission,
) -> ApiResult<OutboundMessage> {
    let lang = state.sanitizer.language(&submission.lang);
    let message = state.sanitizer.message(&submission.message);

    let strings = strings_for(&lang).ok_or_else(|| ApiError::UnknownLanguage(lang.clone()))?;

    validate_submission(&submission.email, &message)?;

    Ok(OutboundMessage::compose(
        strings.subject,
        message,
        submission.email.as_str(),
        state.sender.as_ref().clone(),
        state.recipient.as_ref().clone(),
    ))
}

pub async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(StatusBody::code("NOT_FOUND")))
}
