use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
pub struct ExtensionConfig {
    pub name: String,
    pub id: String,
    pub version: String,
    pub description: String,
    pub mode: String,
    pub author: String,
    pub cmd: Vec<String>,
    pub enabled: bool,
    pub last_updated: String,
    pub git_path: String,
    pub category: String,
    pub post_url: String,
    pub webpage: String,
    pub file_formats: Vec<String>,
    pub ask_form: bool,
    pub connection: Connection,
    #[serde(default)]
    pub configuration: Value,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub port: u16,
    pub target: String,
    pub target_port: u16,
}

/// bsig specific options, read from the free-form `configuration` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BsigSettings {
    /// Signal used as time axis when streaming.
    pub time_signal: String,
    pub case_sensitive: bool,
    pub heartbeat_secs: u64,
}

impl Default for BsigSettings {
    fn default() -> Self {
        Self {
            time_signal: "MTS.Package.TimeStamp".to_string(),
            case_sensitive: true,
            heartbeat_secs: 15,
        }
    }
}

impl ExtensionConfig {
    /// Falls back to defaults when `configuration` is absent or not an object.
    pub fn bsig_settings(&self) -> BsigSettings {
        match &self.configuration {
            Value::Object(_) => {
                serde_json::from_value(self.configuration.clone()).unwrap_or_default()
            }
            _ => BsigSettings::default(),
        }
    }
}
