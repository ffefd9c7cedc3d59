use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tracing::{error, info};

use crate::models::extension_model::ExtensionConfig;

#[derive(Serialize)]
pub struct HealthPayload {
    pub id: String,
    pub timestamp: f64,
}

/// Connection to the Plotune core this extension reports to.
pub struct CoreClient {
    http: Client,
    base_url: String,
    config: &'static ExtensionConfig,
}

impl CoreClient {
    pub fn new(core_url: &str, config: &'static ExtensionConfig) -> Self {
        Self {
            http: Client::new(),
            base_url: format!("http://{}", core_url),
            config,
        }
    }

    pub async fn register(&self) -> Result<()> {
        let url = format!("{}/register", self.base_url);
        info!("Registering to Plotune Core: {}", url);

        self.http
            .post(&url)
            .json(self.config)
            .send()
            .await
            .with_context(|| format!("posting registration to {}", url))?
            .error_for_status()
            .context("core rejected registration")?;

        info!("Successfully registered to Plotune Core!");
        Ok(())
    }

    /// Never returns; failures are logged and retried on the next tick.
    pub async fn heartbeat_loop(self, interval: Duration) {
        let url = format!("{}/heartbeat", self.base_url);
        info!("Heartbeat worker started for ID: {}", self.config.id);

        loop {
            let timestamp = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs_f64())
                .unwrap_or_default();
            let payload = HealthPayload {
                id: self.config.id.clone(),
                timestamp,
            };

            match self.http.post(&url).json(&payload).send().await {
                Ok(resp) if resp.status().is_success() => info!("Heartbeat sent"),
                Ok(resp) => error!("Heartbeat server error: {}", resp.status()),
                Err(e) => error!("Heartbeat network error: {}", e),
            }

            sleep(interval).await;
        }
    }
}
