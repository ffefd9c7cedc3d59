use anyhow::{anyhow, Context, Result};
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::extension_model::ExtensionConfig;

pub const CONFIG_FILE: &str = "plugin.json";

static CONFIG_CACHE: OnceLock<ExtensionConfig> = OnceLock::new();
static CORE_URL: OnceLock<String> = OnceLock::new();

/// Loads the extension config, binds the listener and caches the config with
/// the port actually bound (the file may ask for port 0).
pub async fn init_config_and_bind(file_path: &str) -> Result<TcpListener> {
    let data = fs::read_to_string(file_path)
        .await
        .with_context(|| format!("reading {}", file_path))?;

    let mut config: ExtensionConfig =
        serde_json::from_str(&data).with_context(|| format!("parsing {}", file_path))?;

    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);
    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("binding {}", bind_addr))?;

    let actual_port = listener.local_addr()?.port();
    config.connection.port = actual_port;

    let url = format!(
        "{}:{}",
        config.connection.target, config.connection.target_port
    );

    CORE_URL
        .set(url)
        .map_err(|_| anyhow!("core url already initialized"))?;
    CONFIG_CACHE
        .set(config)
        .map_err(|_| anyhow!("config already initialized"))?;

    info!("Config initialized with dynamic port: {}", actual_port);
    Ok(listener)
}

pub fn get_cached_config() -> Option<&'static ExtensionConfig> {
    CONFIG_CACHE.get()
}

pub fn get_core_url() -> Option<&'static String> {
    CORE_URL.get()
}
