//! Route table. The server binary and the router tests build the exact
//! same application from an explicit state object.

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::federated;
use crate::messages;
use crate::middleware::require_session;
use crate::pages;

pub fn app_router(state: AppState) -> Router {
    let public = Router::new()
        .route("/", get(pages::home))
        .route("/register", get(pages::register_form).post(auth::register))
        .route("/login", get(pages::login_form).post(auth::login))
        .route("/logout", post(auth::logout))
        .route("/auth/google", get(federated::begin))
        .route("/auth/google/{variant}", get(federated::callback))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/dashboard", get(pages::dashboard))
        .route("/compose", get(pages::compose_form).post(messages::compose))
        .route("/schedule", get(pages::schedule))
        .route("/sent", get(pages::sent))
        .layer(from_fn_with_state(state.clone(), require_session))
        .with_state(state);

    public.merge(protected)
}
