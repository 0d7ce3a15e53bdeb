//! Webhook endpoints: the subscription handshake, comments and DMs.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::AppState;
use crate::engage::verify::SIGNATURE_HEADER;
use crate::engage::{CommentEvent, DmEvent, Handshake, verify_handshake, verify_signature};
use crate::error::ApiError;

/// GET /webhook
///
/// Echoes `hub.challenge` as an integer when the handshake checks out.
pub async fn verify(
    State(state): State<AppState>,
    Query(handshake): Query<Handshake>,
) -> Result<Json<i64>, ApiError> {
    let challenge = verify_handshake(&handshake, state.webhook.verify_token.as_ref())?;
    Ok(Json(challenge))
}

/// POST /webhook/comment
pub async fn on_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let event: CommentEvent = authenticated_payload(&state, &headers, &body)?;
    let outcome = state.matcher.handle(&event).await?;
    Ok(Json(outcome))
}

/// POST /webhook/dm
pub async fn on_dm(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let event: DmEvent = authenticated_payload(&state, &headers, &body)?;
    let outcome = state.responder.handle(&event).await?;
    Ok(Json(outcome))
}

/// Check the payload signature (when an app secret is configured) and
/// decode the body.
fn authenticated_payload<T: DeserializeOwned>(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<T, ApiError> {
    if let Some(secret) = &state.webhook.app_secret {
        let header = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok());
        if !verify_signature(secret.expose_secret(), header, body) {
            warn!(has_header = header.is_some(), "Rejected webhook with bad signature");
            return Err(ApiError::Forbidden);
        }
    }

    serde_json::from_slice(body).map_err(|e| {
        debug!(error = %e, "Malformed webhook payload");
        ApiError::BadRequest(e.to_string())
    })
}
