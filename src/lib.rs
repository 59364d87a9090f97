pub mod api;
pub mod config;
pub mod db;
pub mod entities;

pub use config::Config;

use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::db::migrator::m20250301_initial::{DEFAULT_ADMIN_PASSWORD, DEFAULT_ADMIN_USERNAME};
use crate::db::repositories::user::verify_password;

pub async fn run(config: Config) -> anyhow::Result<()> {
    config.validate()?;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    info!("akcentd v{} starting...", env!("CARGO_PKG_VERSION"));

    let state = api::create_app_state_from_config(config.clone()).await?;

    warn_if_default_admin_password(&state).await;

    let app = api::router(state).await?;

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!("Web API running at http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Web server error")?;

    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => warn!("Error listening for shutdown: {e}"),
    }
}

/// The initial migration seeds an admin account with a well-known password.
/// Nag on every startup until it has been rotated.
async fn warn_if_default_admin_password(state: &api::AppState) {
    let admin = match state.store().get_user_by_username(DEFAULT_ADMIN_USERNAME).await {
        Ok(Some(admin)) => admin,
        _ => return,
    };

    if let Ok(true) = verify_password(&admin.password_hash, DEFAULT_ADMIN_PASSWORD).await {
        warn!(
            "The '{}' account still uses the default password. Change it.",
            DEFAULT_ADMIN_USERNAME
        );
    }
}
