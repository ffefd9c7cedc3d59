use anyhow::{Context, Result};
use axum::Router;
use std::time::Duration;
use tracing::{info, Level};

mod client;
mod models;
mod routes;
mod state;
mod utils;

use crate::client::register::CoreClient;
use crate::state::app_state::AppState;
use crate::utils::conf_helper::{get_cached_config, get_core_url, init_config_and_bind, CONFIG_FILE};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    // === CONFIG + LISTENER ===
    let listener = init_config_and_bind(CONFIG_FILE).await?;
    let config = get_cached_config().context("config missing after init")?;
    let core_url = get_core_url().context("core url missing after init")?;

    let settings = config.bsig_settings();
    info!(
        "Server initialized on {}:{} (time signal: {})",
        config.connection.ip, config.connection.port, settings.time_signal
    );

    let heartbeat = Duration::from_secs(settings.heartbeat_secs.max(1));
    let state = AppState::new(settings);

    let core = CoreClient::new(core_url, config);
    core.register().await?;
    tokio::spawn(core.heartbeat_loop(heartbeat));

    let app = Router::new()
        .merge(routes::info_routes::health_routes(state.clone()))
        .merge(routes::data_routes::data_routes(state));

    axum::serve(listener, app).await?;
    Ok(())
}
