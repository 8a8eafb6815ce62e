//! Federated (Google-style OAuth) sign-in.
//!
//! The handshake is the standard authorization-code flow: redirect to the
//! provider with a random state value, then on callback verify the state,
//! exchange the code, fetch the subject id from the userinfo endpoint, and
//! find-or-create the matching account.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header::SET_COOKIE},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use crate::auth::AppState;
use crate::session;

const STATE_COOKIE_NAME: &str = "plume_oauth_state";
const STATE_COOKIE_TTL_SECS: i64 = 600;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// Public base URL this server is reachable at, e.g. `http://localhost:3000`.
    pub redirect_base: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl OAuthConfig {
    /// Read provider credentials from the environment. Returns `None` when
    /// the client id/secret are absent; federated login is then disabled.
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok()?;
        let redirect_base = std::env::var("GOOGLE_REDIRECT_BASE")
            .unwrap_or_else(|_| "http://localhost:3000".into());
        Some(Self {
            client_id,
            client_secret,
            redirect_base,
            auth_url: GOOGLE_AUTH_URL.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            userinfo_url: GOOGLE_USERINFO_URL.into(),
        })
    }

    fn redirect_uri(&self, variant: &str) -> String {
        format!(
            "{}/auth/google/{variant}",
            self.redirect_base.trim_end_matches('/')
        )
    }
}

/// Build the provider authorize URL for the handshake.
pub fn build_authorize_url(config: &OAuthConfig, variant: &str, state: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&config.auth_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("redirect_uri", &config.redirect_uri(variant))
        .append_pair("response_type", "code")
        .append_pair("scope", "openid email profile")
        .append_pair("state", state);
    Ok(url)
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    #[serde(default)]
    email: Option<String>,
}

/// GET /auth/google — begin the handshake.
pub async fn begin(State(state): State<AppState>) -> Response {
    let Some(config) = state.oauth.as_ref() else {
        warn!("federated login requested but no provider is configured");
        return Redirect::to("/login").into_response();
    };

    let csrf_state = session::generate_session_token();
    let url = match build_authorize_url(config, "dashboard", &csrf_state) {
        Ok(url) => url,
        Err(err) => {
            warn!("failed to build authorize url: {err}");
            return Redirect::to("/login").into_response();
        }
    };

    let mut response = Redirect::to(url.as_str()).into_response();
    if let Ok(cookie) = state_cookie(&csrf_state, state.cookie_secure) {
        response.headers_mut().insert(SET_COOKIE, cookie);
    }
    response
}

/// GET /auth/google/{dashboard,compose,schedule,sent} — callback variants.
/// All variants land on /dashboard after a successful sign-in; any failure
/// falls back to /login.
pub async fn callback(
    State(state): State<AppState>,
    Path(variant): Path<String>,
    Query(query): Query<CallbackQuery>,
    headers: HeaderMap,
) -> Response {
    match run_callback(&state, &variant, query, &headers).await {
        Ok(token) => {
            let mut response = Redirect::to("/dashboard").into_response();
            if let Ok(cookie) =
                session::session_cookie(&token, state.session_ttl_secs, state.cookie_secure)
            {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
            if let Ok(cleared) = clear_state_cookie(state.cookie_secure) {
                response.headers_mut().append(SET_COOKIE, cleared);
            }
            response
        }
        Err(reason) => {
            warn!("federated login failed: {reason}");
            let mut response = Redirect::to("/login").into_response();
            if let Ok(cleared) = clear_state_cookie(state.cookie_secure) {
                response.headers_mut().append(SET_COOKIE, cleared);
            }
            response
        }
    }
}

async fn run_callback(
    state: &AppState,
    variant: &str,
    query: CallbackQuery,
    headers: &HeaderMap,
) -> Result<String, String> {
    let config = state
        .oauth
        .as_ref()
        .ok_or_else(|| "no provider configured".to_string())?;

    if let Some(error) = query.error {
        return Err(format!("provider returned error: {error}"));
    }
    let code = query.code.ok_or_else(|| "missing code".to_string())?;
    let returned_state = query.state.ok_or_else(|| "missing state".to_string())?;
    let expected_state = session::extract_cookie(headers, STATE_COOKIE_NAME)
        .ok_or_else(|| "missing state cookie".to_string())?;
    if returned_state != expected_state {
        return Err("state mismatch".to_string());
    }

    let token_response: TokenResponse = state
        .http
        .post(&config.token_url)
        .form(&[
            ("code", code.as_str()),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri(variant).as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .map_err(|e| format!("code exchange request failed: {e}"))?
        .error_for_status()
        .map_err(|e| format!("code exchange rejected: {e}"))?
        .json()
        .await
        .map_err(|e| format!("malformed token response: {e}"))?;

    let userinfo: UserInfo = state
        .http
        .get(&config.userinfo_url)
        .bearer_auth(&token_response.access_token)
        .send()
        .await
        .map_err(|e| format!("userinfo request failed: {e}"))?
        .error_for_status()
        .map_err(|e| format!("userinfo rejected: {e}"))?
        .json()
        .await
        .map_err(|e| format!("malformed userinfo: {e}"))?;

    // Find-or-create is idempotent: the UNIQUE constraint on the subject
    // decides concurrent first-time sign-ins.
    let worker = state.clone();
    let ttl = state.session_ttl_secs;
    let account = tokio::task::spawn_blocking(move || {
        let id_if_new = Uuid::new_v4().to_string();
        let account = worker.db.find_or_create_federated(
            &id_if_new,
            &userinfo.sub,
            userinfo.email.as_deref(),
        )?;
        let token = session::establish(&worker.db, &account.id, ttl)?;
        Ok::<_, anyhow::Error>((account, token))
    })
    .await
    .map_err(|e| format!("spawn_blocking join error: {e}"))?
    .map_err(|e| format!("store failure: {e:#}"))?;

    let (account, token) = account;
    info!(account_id = %account.id, "federated sign-in resolved");
    Ok(token)
}

fn state_cookie(value: &str, secure: bool) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!(
        "{STATE_COOKIE_NAME}={value}; Path=/; HttpOnly; SameSite=Lax; Max-Age={STATE_COOKIE_TTL_SECS}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

fn clear_state_cookie(secure: bool) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!("{STATE_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-1".into(),
            client_secret: "secret".into(),
            redirect_base: "http://localhost:3000/".into(),
            auth_url: GOOGLE_AUTH_URL.into(),
            token_url: GOOGLE_TOKEN_URL.into(),
            userinfo_url: GOOGLE_USERINFO_URL.into(),
        }
    }

    #[test]
    fn authorize_url_carries_required_params() {
        let url = build_authorize_url(&config(), "dashboard", "state-123").unwrap();
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        assert!(pairs.contains(&("client_id".into(), "client-1".into())));
        assert!(pairs.contains(&("response_type".into(), "code".into())));
        assert!(pairs.contains(&("scope".into(), "openid email profile".into())));
        assert!(pairs.contains(&("state".into(), "state-123".into())));
        assert!(pairs.contains(&(
            "redirect_uri".into(),
            "http://localhost:3000/auth/google/dashboard".into()
        )));
    }

    #[test]
    fn redirect_uri_tracks_callback_variant() {
        let config = config();
        assert_eq!(
            config.redirect_uri("sent"),
            "http://localhost:3000/auth/google/sent"
        );
    }
}
