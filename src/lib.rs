pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;
pub(crate) mod tasks;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, shutdown::shutdown_signal, state::AppState, telemetry};

async fn bootstrap(component: &'static str) -> anyhow::Result<AppState> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings, component)?;
    core::metrics::init(&settings)?;

    let db_pool = db::init_pool(&settings).await?;
    db::run_migrations(&db_pool).await?;

    Ok(AppState::from_pool(settings, db_pool))
}

pub async fn run() -> anyhow::Result<()> {
    let state = bootstrap("api").await?;

    let app = api::router::router(state.clone());
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Markwise API listening"
    );

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal("api")).await?;

    Ok(())
}

pub async fn run_worker() -> anyhow::Result<()> {
    let state = bootstrap("worker").await?;
    tasks::scheduler::run(state).await
}
