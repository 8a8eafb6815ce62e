//! Authorization gate for protected routes.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Utc};
use tracing::{error, warn};
use uuid::Uuid;

use plume_types::models::Account;

use crate::auth::AppState;
use crate::error::ApiError;
use crate::respond::RespondMode;
use crate::session;

/// Resolve the session before any protected handler runs, injecting the
/// account as a request extension. Anonymous browser requests are
/// redirected to the login entry point; programmatic clients get a 401.
pub async fn require_session(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Response {
    match resolve_account(&state, req.headers()).await {
        Ok(Some(account)) => {
            req.extensions_mut().insert(account);
            next.run(req).await
        }
        Ok(None) => match RespondMode::from_headers(req.headers()) {
            RespondMode::Browser => Redirect::to("/login").into_response(),
            RespondMode::Json => ApiError::Unauthenticated.into_response(),
        },
        Err(response) => response,
    }
}

async fn resolve_account(
    state: &AppState,
    headers: &HeaderMap,
) -> Result<Option<Account>, Response> {
    let Some(token) = session::extract_session_token(headers) else {
        return Ok(None);
    };

    let worker = state.clone();
    let row = tokio::task::spawn_blocking(move || session::resolve(&worker.db, &token))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {e}");
            ApiError::Store(anyhow::anyhow!("session lookup failed")).into_response()
        })?
        .map_err(|e| ApiError::Store(e).into_response())?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: Uuid = row.id.parse().map_err(|e| {
        ApiError::Store(anyhow::anyhow!("corrupt account id '{}': {e}", row.id)).into_response()
    })?;

    Ok(Some(Account {
        id,
        username: row.username,
        email: row.email,
        created_at: parse_sqlite_datetime(&row.created_at, &row.id),
    }))
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone.
fn parse_sqlite_datetime(value: &str, row_id: &str) -> DateTime<Utc> {
    value
        .parse::<DateTime<Utc>>()
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
                .map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            warn!("Corrupt created_at '{}' on account '{}': {}", value, row_id, e);
            DateTime::default()
        })
}
