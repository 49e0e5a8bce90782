mod auth;
mod error;
mod routes;
mod setup;
mod state;
mod telemetry;

use postpilot_core::Config;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let config = Config::from_env()?;
    telemetry::init();

    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET is not set, stage-trigger endpoints are unauthenticated");
    }

    let state = setup::build_state(&config).await?;
    let router = routes::router(state);

    let addr = format!("0.0.0.0:{}", config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, environment = %config.environment, "Pipeline service listening");
    axum::serve(listener, router).await?;
    Ok(())
}
