//! Application state and the local register/login/logout handlers.

use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};
use uuid::Uuid;

use plume_db::Database;
use plume_db::queries::InsertOutcome;
use plume_types::api::{LoginRequest, LoginResponse, RegisterRequest, RegisterResponse};

use crate::credentials::{self, VerifyOutcome};
use crate::error::ApiError;
use crate::federated::OAuthConfig;
use crate::respond::{FormOrJson, RespondMode};
use crate::session;

pub type AppState = Arc<AppStateInner>;

/// Explicit request context: store handle plus auth/session configuration.
/// Handlers receive this instead of reaching for ambient globals, so tests
/// can swap in an in-memory store.
pub struct AppStateInner {
    pub db: Database,
    pub http: reqwest::Client,
    pub oauth: Option<OAuthConfig>,
    pub session_ttl_secs: i64,
    pub cookie_secure: bool,
}

impl AppStateInner {
    pub fn new(db: Database, oauth: Option<OAuthConfig>) -> Self {
        Self {
            db,
            http: reqwest::Client::new(),
            oauth,
            session_ttl_secs: 7 * 24 * 3600,
            cookie_secure: false,
        }
    }
}

pub async fn register(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormOrJson(req): FormOrJson<RegisterRequest>,
) -> Result<Response, ApiError> {
    let mode = RespondMode::from_headers(&headers);

    // All validation happens before any store access.
    let errors = credentials::validate_registration(&req);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let account_id = Uuid::new_v4();
    let username = req.username.trim().to_string();
    let email = credentials::normalize_email(&req.email);

    let ttl = state.session_ttl_secs;
    let worker = state.clone();
    let reply_username = username.clone();
    let token = tokio::task::spawn_blocking(move || {
        let hash = credentials::hash_password(&req.password)?;
        let outcome = worker
            .db
            .create_local_account(&account_id.to_string(), &username, &email, &hash)?;
        if outcome == InsertOutcome::Conflict {
            return Err(ApiError::Conflict("username or email already taken".into()));
        }
        Ok(session::establish(&worker.db, &account_id.to_string(), ttl)?)
    })
    .await
    .map_err(|e| ApiError::Store(anyhow!("spawn_blocking join error: {e}")))??;

    let cookie = session::session_cookie(&token, ttl, state.cookie_secure)
        .context("invalid session cookie")?;

    let mut response = match mode {
        RespondMode::Browser => Redirect::to("/dashboard").into_response(),
        RespondMode::Json => (
            StatusCode::CREATED,
            Json(RegisterResponse {
                account_id,
                username: reply_username,
            }),
        )
            .into_response(),
    };
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormOrJson(req): FormOrJson<LoginRequest>,
) -> Result<Response, ApiError> {
    let mode = RespondMode::from_headers(&headers);

    let ttl = state.session_ttl_secs;
    let worker = state.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        match credentials::verify(&worker.db, &req.username, &req.password)? {
            VerifyOutcome::Authenticated(account) => {
                let token = session::establish(&worker.db, &account.id, ttl)?;
                Ok::<_, ApiError>(Some((account, token)))
            }
            // Logged at debug only; the response stays generic either way.
            VerifyOutcome::UnknownUsername => {
                debug!(username = %req.username, "login failed: unknown username");
                Ok(None)
            }
            VerifyOutcome::InvalidCredentials => {
                debug!(username = %req.username, "login failed: wrong password");
                Ok(None)
            }
        }
    })
    .await
    .map_err(|e| ApiError::Store(anyhow!("spawn_blocking join error: {e}")))??;

    let Some((account, token)) = outcome else {
        return Ok(match mode {
            RespondMode::Browser => Redirect::to("/login").into_response(),
            RespondMode::Json => ApiError::Authentication.into_response(),
        });
    };

    let account_id: Uuid = account
        .id
        .parse()
        .map_err(|e| ApiError::Store(anyhow!("corrupt account id '{}': {e}", account.id)))?;
    let cookie = session::session_cookie(&token, ttl, state.cookie_secure)
        .context("invalid session cookie")?;

    let mut response = match mode {
        RespondMode::Browser => Redirect::to("/dashboard").into_response(),
        RespondMode::Json => Json(LoginResponse {
            account_id,
            username: account.username.unwrap_or_default(),
        })
        .into_response(),
    };
    response.headers_mut().insert(SET_COOKIE, cookie);
    Ok(response)
}

pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let mode = RespondMode::from_headers(&headers);

    if let Some(token) = session::extract_session_token(&headers) {
        let worker = state.clone();
        let joined =
            tokio::task::spawn_blocking(move || session::revoke(&worker.db, &token)).await;
        if let Err(err) = joined {
            error!("spawn_blocking join error during logout: {err}");
        }
    }

    // The cookie is cleared even when the store delete failed, so the
    // client-visible state is anonymous from here on.
    let mut response = match mode {
        RespondMode::Browser => Redirect::to("/").into_response(),
        RespondMode::Json => StatusCode::NO_CONTENT.into_response(),
    };
    if let Ok(cookie) = session::clear_session_cookie(state.cookie_secure) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}
