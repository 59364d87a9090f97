use axum::{
    Router,
    http::HeaderValue,
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;

use crate::config::Config;
use crate::db::Store;

mod audit;
pub mod auth;
mod download;
mod error;
mod invites;
mod types;
mod users;
mod validation;

pub use error::ApiError;
pub use types::*;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,

    pub store: Store,
}

impl AppState {
    #[must_use]
    pub const fn store(&self) -> &Store {
        &self.store
    }
}

pub async fn create_app_state_from_config(config: Config) -> anyhow::Result<Arc<AppState>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    Ok(Arc::new(AppState { config, store }))
}

pub async fn router(state: Arc<AppState>) -> anyhow::Result<Router> {
    // Sessions live in the same SQLite database as everything else,
    // referenced by the opaque id in the cookie.
    let session_store = SqliteStore::new(state.store.conn.get_sqlite_connection_pool().clone());
    session_store.migrate().await?;

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(state.config.server.secure_cookies)
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(30)));

    let admin_routes = Router::new()
        .route("/invite-codes", get(invites::list_invite_codes))
        .route("/invite-codes", post(invites::create_invite_code))
        .route("/invite-codes/{id}/revoke", post(invites::revoke_invite_code))
        .route("/users", get(users::list_users))
        .route("/users/{id}/toggle", post(users::toggle_user_active))
        .route("/audit-logs", get(audit::list_audit_logs))
        .route_layer(middleware::from_fn(auth::require_admin));

    let session_routes = Router::new()
        .route("/auth/logout", post(auth::logout))
        .route("/auth/me", get(auth::me))
        .route("/download/akcent-loader", get(download::download_artifact))
        .route_layer(middleware::from_fn(auth::require_auth));

    let api_router = Router::new()
        .merge(admin_routes)
        .merge(session_routes)
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(session_layer)
        .with_state(state.clone());

    let cors_origins = &state.config.server.cors_allowed_origins;
    let cors_layer = if cors_origins.contains(&"*".to_string()) {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Ok(Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http()))
}
