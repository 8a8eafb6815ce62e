//! Local-credential verification and registration policy.

use anyhow::{Result, anyhow};
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use regex::Regex;
use std::sync::LazyLock;

use plume_db::Database;
use plume_db::models::AccountRow;
use plume_types::api::{FieldError, RegisterRequest};

pub const MIN_PASSWORD_LEN: usize = 6;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex is valid")
});

/// Outcome of checking a username/password pair. The two failure variants
/// stay internal; callers surface them as one generic failure.
#[derive(Debug)]
pub enum VerifyOutcome {
    Authenticated(AccountRow),
    InvalidCredentials,
    UnknownUsername,
}

/// Hash a password with a fresh per-password salt (argon2id PHC string).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow!("failed to hash password: {e}"))?;
    Ok(hash.to_string())
}

/// Recompute and compare the candidate password against the stored hash.
/// The argon2 verifier compares in constant time.
pub fn verify(db: &Database, username: &str, password: &str) -> Result<VerifyOutcome> {
    let Some(account) = db.get_account_by_username(username)? else {
        return Ok(VerifyOutcome::UnknownUsername);
    };

    // Federated-only accounts have no password to check against.
    let Some(stored) = account.password_hash.as_deref() else {
        return Ok(VerifyOutcome::InvalidCredentials);
    };

    let parsed = PasswordHash::new(stored).map_err(|e| anyhow!("corrupt password hash: {e}"))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(VerifyOutcome::Authenticated(account)),
        Err(_) => Ok(VerifyOutcome::InvalidCredentials),
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn valid_email(email_normalized: &str) -> bool {
    EMAIL_RE.is_match(email_normalized)
}

/// Registration policy, checked before any store mutation.
pub fn validate_registration(req: &RegisterRequest) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if req.username.trim().is_empty() {
        errors.push(FieldError::new("username", "username must not be empty"));
    }

    let email = normalize_email(&req.email);
    if email.is_empty() {
        errors.push(FieldError::new("email", "email must not be empty"));
    } else if !valid_email(&email) {
        errors.push(FieldError::new("email", "email is not well-formed"));
    }

    if req.password.len() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "password",
            format!("password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    errors
}
