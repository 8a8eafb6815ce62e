//! Session authority: opaque tokens, hashed at rest, carried in an
//! HttpOnly cookie.
//!
//! The raw token only ever travels to the client; the database stores a
//! SHA-256 hash, so a leaked sessions table cannot be replayed.

use anyhow::{Context, Result};
use axum::http::{HeaderMap, HeaderValue, header::AUTHORIZATION, header::InvalidHeaderValue};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256};
use tracing::error;

use plume_db::Database;
use plume_db::models::AccountRow;

pub const SESSION_COOKIE_NAME: &str = "plume_session";

/// Create a new opaque session token. Never derived from the account id.
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a session token so raw values never touch the database.
pub fn hash_session_token(token: &str) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.finalize().to_vec()
}

/// Bind a fresh token to an account. Returns the raw token for the cookie.
pub fn establish(db: &Database, account_id: &str, ttl_secs: i64) -> Result<String> {
    let token = generate_session_token();
    let expires_at = (Utc::now() + Duration::seconds(ttl_secs))
        .format("%Y-%m-%d %H:%M:%S")
        .to_string();
    db.insert_session(&hash_session_token(&token), account_id, &expires_at)
        .context("failed to persist session")?;
    Ok(token)
}

/// Resolve a raw token back to its account. Unknown, expired, or dangling
/// tokens resolve to `None` (anonymous).
pub fn resolve(db: &Database, token: &str) -> Result<Option<AccountRow>> {
    db.lookup_session(&hash_session_token(token))
}

/// Invalidate a token. A store failure here is logged but swallowed: the
/// caller always proceeds to clear the cookie, so the client transitions
/// to anonymous regardless.
pub fn revoke(db: &Database, token: &str) {
    if let Err(err) = db.delete_session(&hash_session_token(token)) {
        error!("failed to delete session: {err:#}");
    }
}

/// Build a secure `HttpOnly` cookie for the session token.
pub fn session_cookie(
    token: &str,
    ttl_secs: i64,
    secure: bool,
) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!(
        "{SESSION_COOKIE_NAME}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={ttl_secs}"
    );
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the session token from the request: cookie first, bearer header as
/// the programmatic fallback.
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie(headers, SESSION_COOKIE_NAME)
}

/// Read one cookie value out of the Cookie header.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let trimmed = pair.trim();
        let mut parts = trimmed.splitn(2, '=');
        let key = parts.next()?.trim();
        let val = parts.next()?.trim();
        if key == name {
            return Some(val.to_string());
        }
    }
    None
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
