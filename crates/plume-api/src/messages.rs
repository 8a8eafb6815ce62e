//! Message composition. Records are persisted, never transmitted.

use anyhow::anyhow;
use axum::{
    Extension, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
};
use tracing::info;
use uuid::Uuid;

use plume_types::api::{ComposeRequest, FieldError};
use plume_types::models::{Account, Message};

use crate::auth::AppState;
use crate::error::ApiError;
use crate::respond::{FormOrJson, RespondMode};

/// POST /compose — persist a message owned by the authenticated account.
/// The sender is always the session's account; any sender supplied in the
/// request body is ignored.
pub async fn compose(
    State(state): State<AppState>,
    Extension(account): Extension<Account>,
    headers: HeaderMap,
    FormOrJson(req): FormOrJson<ComposeRequest>,
) -> Result<Response, ApiError> {
    let mode = RespondMode::from_headers(&headers);

    // Subject and body stay free-form; only an unusable empty recipient
    // is rejected.
    if req.recipient.trim().is_empty() {
        return Err(ApiError::Validation(vec![FieldError::new(
            "recipient",
            "recipient must not be empty",
        )]));
    }

    let now = chrono::Utc::now();
    let message = Message {
        id: Uuid::new_v4(),
        sender_id: account.id,
        recipient: req.recipient.trim().to_string(),
        subject: req.subject,
        body: req.body,
        // Defaulted to creation time; nothing acts on it yet.
        scheduled_at: now,
        created_at: now,
    };

    let worker = state.clone();
    let stored = message.clone();
    tokio::task::spawn_blocking(move || {
        worker.db.insert_message(
            &stored.id.to_string(),
            &stored.sender_id.to_string(),
            &stored.recipient,
            &stored.subject,
            &stored.body,
            &stored.scheduled_at.to_rfc3339(),
        )
    })
    .await
    .map_err(|e| ApiError::Store(anyhow!("spawn_blocking join error: {e}")))?
    .map_err(ApiError::Store)?;

    info!(message_id = %message.id, sender_id = %message.sender_id, "message composed");

    Ok(match mode {
        RespondMode::Browser => Redirect::to("/dashboard").into_response(),
        RespondMode::Json => (StatusCode::CREATED, Json(message)).into_response(),
    })
}
