//! End-to-end flows over the real router with an in-memory store.

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use tower::ServiceExt;

use plume_api::auth::{AppState, AppStateInner};
use plume_api::routes::app_router;
use plume_db::Database;

fn test_state() -> AppState {
    Arc::new(AppStateInner::new(
        Database::open_in_memory().expect("in-memory db"),
        None,
    ))
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn session_cookie_from(response: &axum::response::Response) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("plume_session="))
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

fn account_count(state: &AppState) -> i64 {
    state
        .db
        .with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?)
        })
        .expect("count accounts")
}

async fn register_alice(app: &Router, expect: StatusCode) -> axum::response::Response {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register",
            serde_json::json!({
                "username": "alice",
                "email": "alice@x.com",
                "password": "secret1"
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), expect);
    response
}

#[tokio::test]
async fn register_creates_account_and_session() {
    let state = test_state();
    let app = app_router(state.clone());

    let response = register_alice(&app, StatusCode::CREATED).await;
    assert!(session_cookie_from(&response).is_some());
    assert_eq!(account_count(&state), 1);

    let body = response_json(response).await;
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let state = test_state();
    let app = app_router(state.clone());

    register_alice(&app, StatusCode::CREATED).await;
    let second = register_alice(&app, StatusCode::CONFLICT).await;
    assert!(session_cookie_from(&second).is_none());
    assert_eq!(account_count(&state), 1);
}

#[tokio::test]
async fn registration_validation_reports_field_errors() {
    let state = test_state();
    let app = app_router(state.clone());

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/register",
            serde_json::json!({
                "username": "",
                "email": "not-an-email",
                "password": "abc"
            }),
        ))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(account_count(&state), 0);

    let body = response_json(response).await;
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .expect("field list")
        .iter()
        .map(|e| e["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, ["username", "email", "password"]);
}

#[tokio::test]
async fn login_succeeds_with_correct_password_only() {
    let state = test_state();
    let app = app_router(state.clone());
    register_alice(&app, StatusCode::CREATED).await;

    let wrong = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            serde_json::json!({ "username": "alice", "password": "wrong-password" }),
        ))
        .await
        .expect("response");
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    assert!(session_cookie_from(&wrong).is_none());

    let unknown = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            serde_json::json!({ "username": "nobody", "password": "secret1" }),
        ))
        .await
        .expect("response");
    // Unknown user and wrong password are indistinguishable to the caller.
    assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);

    let ok = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            serde_json::json!({ "username": "alice", "password": "secret1" }),
        ))
        .await
        .expect("response");
    assert_eq!(ok.status(), StatusCode::OK);
    assert!(session_cookie_from(&ok).is_some());
}

#[tokio::test]
async fn protected_routes_refuse_anonymous_requests() {
    let state = test_state();
    let app = app_router(state.clone());

    for path in ["/dashboard", "/compose", "/schedule", "/sent"] {
        // Browser clients are redirected to the login entry point.
        let browser = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri(path)
                    .header(header::ACCEPT, "text/html")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(browser.status(), StatusCode::SEE_OTHER, "path {path}");
        assert_eq!(
            browser.headers().get(header::LOCATION).unwrap(),
            "/login",
            "path {path}"
        );

        // Programmatic clients get a structured 401.
        let api = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(api.status(), StatusCode::UNAUTHORIZED, "path {path}");
    }
}

#[tokio::test]
async fn compose_persists_with_sender_from_session() {
    let state = test_state();
    let app = app_router(state.clone());

    let registered = register_alice(&app, StatusCode::CREATED).await;
    let cookie = session_cookie_from(&registered).expect("session cookie");
    let alice_id = response_json(registered).await["account_id"]
        .as_str()
        .expect("account id")
        .to_string();

    // A sender field in the request body must be ignored.
    let mut request = json_request(
        "POST",
        "/compose",
        serde_json::json!({
            "recipient": "bob@x.com",
            "subject": "Hi",
            "body": "Hello",
            "sender": "someone-else"
        }),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());

    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["sender_id"].as_str().unwrap(), alice_id);

    let message_id = body["id"].as_str().unwrap().to_string();
    let row = state
        .db
        .get_message(&message_id)
        .expect("lookup")
        .expect("message row");
    assert_eq!(row.sender_id, alice_id);
    assert_eq!(row.recipient, "bob@x.com");
    assert_eq!(row.subject, "Hi");
}

#[tokio::test]
async fn compose_rejects_empty_recipient() {
    let state = test_state();
    let app = app_router(state.clone());

    let registered = register_alice(&app, StatusCode::CREATED).await;
    let cookie = session_cookie_from(&registered).expect("session cookie");

    let mut request = json_request(
        "POST",
        "/compose",
        serde_json::json!({ "recipient": "  ", "subject": "x", "body": "y" }),
    );
    request
        .headers_mut()
        .insert(header::COOKIE, cookie.parse().unwrap());

    let response = app.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn logout_turns_the_session_anonymous() {
    let state = test_state();
    let app = app_router(state.clone());

    let registered = register_alice(&app, StatusCode::CREATED).await;
    let cookie = session_cookie_from(&registered).expect("session cookie");

    // The session works before logout.
    let before = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(header::COOKIE, cookie.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("response");
    assert_eq!(before.status(), StatusCode::OK);

    let logout = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/logout")
                .header(header::COOKIE, cookie.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("response");
    assert_eq!(logout.status(), StatusCode::NO_CONTENT);

    // The prior token now behaves as anonymous.
    let after = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/dashboard")
                .header(header::COOKIE, cookie.as_str())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("response");
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn browser_register_redirects_to_dashboard() {
    let state = test_state();
    let app = app_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header(header::ACCEPT, "text/html")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(
                    "username=alice&email=alice%40x.com&password=secret1",
                ))
                .unwrap(),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        response.headers().get(header::LOCATION).unwrap(),
        "/dashboard"
    );
    assert!(session_cookie_from(&response).is_some());
    assert_eq!(account_count(&state), 1);
}

#[tokio::test]
async fn landing_and_forms_are_public() {
    let state = test_state();
    let app = app_router(state.clone());

    for path in ["/", "/register", "/login"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK, "path {path}");
    }
}

#[tokio::test]
async fn federated_begin_without_provider_falls_back_to_login() {
    let state = test_state();
    let app = app_router(state.clone());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/google")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers().get(header::LOCATION).unwrap(), "/login");
}
