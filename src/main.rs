use anyhow::Context;

mod app;
mod auth;
mod config;
mod db;
mod error;
mod memory;
mod state;
mod tasks;
mod user;

use crate::{config::AppConfig, state::AppState};

fn init_tracing() {
    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "kaizen=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env().context("load configuration")?;
    tracing::info!(
        environment = ?config.environment,
        strategy = ?config.auth.strategy,
        backend = ?config.database.backend,
        "starting kaizen"
    );
    let (host, port) = (config.server.host.clone(), config.server.port);

    let app_state = AppState::init(config).await?;

    if let Some(pg) = &app_state.pg {
        sqlx::migrate!("./migrations")
            .run(pg.pool())
            .await
            .context("run migrations")?;
    }

    let app = app::build_app(app_state);
    app::serve(app, &host, port).await
}
