//! HTML views. Templating is deliberately minimal: each view is a small
//! inline page so the interesting behavior stays in the handlers.

use axum::{Extension, response::Html};

use plume_types::models::Account;

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head><title>{title} — Plume</title></head>\n<body>\n{body}\n</body>\n</html>"
    ))
}

pub async fn home() -> Html<String> {
    page(
        "Welcome",
        "<h1>Plume</h1>\n\
         <p>Compose and keep your mail in one place.</p>\n\
         <p><a href=\"/register\">Register</a> | <a href=\"/login\">Sign in</a> | \
         <a href=\"/auth/google\">Sign in with Google</a></p>",
    )
}

pub async fn register_form() -> Html<String> {
    page(
        "Register",
        "<h1>Register</h1>\n\
         <form method=\"post\" action=\"/register\">\n\
         <input name=\"username\" placeholder=\"Username\">\n\
         <input name=\"email\" type=\"email\" placeholder=\"Email\">\n\
         <input name=\"password\" type=\"password\" placeholder=\"Password (6+ characters)\">\n\
         <button type=\"submit\">Create account</button>\n\
         </form>",
    )
}

pub async fn login_form() -> Html<String> {
    page(
        "Sign in",
        "<h1>Sign in</h1>\n\
         <form method=\"post\" action=\"/login\">\n\
         <input name=\"username\" placeholder=\"Username\">\n\
         <input name=\"password\" type=\"password\" placeholder=\"Password\">\n\
         <button type=\"submit\">Sign in</button>\n\
         </form>\n\
         <p><a href=\"/auth/google\">Sign in with Google</a></p>",
    )
}

fn greeting(account: &Account) -> String {
    account
        .username
        .clone()
        .or_else(|| account.email.clone())
        .unwrap_or_else(|| account.id.to_string())
}

pub async fn dashboard(Extension(account): Extension<Account>) -> Html<String> {
    page(
        "Dashboard",
        &format!(
            "<h1>Dashboard</h1>\n\
             <p>Signed in as {}.</p>\n\
             <p><a href=\"/compose\">Compose</a> | <a href=\"/schedule\">Schedule</a> | \
             <a href=\"/sent\">Sent</a></p>\n\
             <form method=\"post\" action=\"/logout\"><button type=\"submit\">Log out</button></form>",
            greeting(&account)
        ),
    )
}

pub async fn compose_form(Extension(_account): Extension<Account>) -> Html<String> {
    page(
        "Compose",
        "<h1>Compose</h1>\n\
         <form method=\"post\" action=\"/compose\">\n\
         <input name=\"recipient\" placeholder=\"To\">\n\
         <input name=\"subject\" placeholder=\"Subject\">\n\
         <textarea name=\"body\" placeholder=\"Write your message\"></textarea>\n\
         <button type=\"submit\">Send</button>\n\
         </form>",
    )
}

pub async fn schedule(Extension(_account): Extension<Account>) -> Html<String> {
    page(
        "Schedule",
        "<h1>Schedule</h1>\n<p>Scheduled delivery is not available yet.</p>",
    )
}

pub async fn sent(Extension(_account): Extension<Account>) -> Html<String> {
    // There is no listing endpoint for a user's sent messages yet, so this
    // view renders without message data.
    page("Sent", "<h1>Sent</h1>\n<p>No sent messages to show.</p>")
}
