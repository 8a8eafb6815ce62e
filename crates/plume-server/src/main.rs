use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use plume_api::auth::{AppState, AppStateInner};
use plume_api::federated::OAuthConfig;
use plume_api::routes::app_router;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plume=debug,tower_http=debug".into()),
        )
        .init();

    // Config
    let db_path = std::env::var("PLUME_DB_PATH").unwrap_or_else(|_| "plume.db".into());
    let host = std::env::var("PLUME_HOST").unwrap_or_else(|_| "0.0.0.0".into());
    let port: u16 = std::env::var("PLUME_PORT")
        .unwrap_or_else(|_| "3000".into())
        .parse()?;
    let cookie_secure = std::env::var("PLUME_COOKIE_SECURE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let session_ttl_secs: i64 = std::env::var("PLUME_SESSION_TTL_SECS")
        .unwrap_or_else(|_| (7 * 24 * 3600).to_string())
        .parse()?;

    let oauth = OAuthConfig::from_env();
    if oauth.is_none() {
        warn!("GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET not set; federated login disabled");
    }

    // Init database
    let db = plume_db::Database::open(&PathBuf::from(&db_path))?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        session_ttl_secs,
        cookie_secure,
        ..AppStateInner::new(db, oauth)
    });

    let app: Router = app_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Plume server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
