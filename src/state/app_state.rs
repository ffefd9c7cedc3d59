use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use bsig::{BsigReader, SignalSource};

use crate::models::extension_model::BsigSettings;

pub type FileReader = BsigReader<BufReader<File>>;

#[derive(Clone)]
pub struct SignalInfo {
    pub reader: Arc<FileReader>,
    pub file_id: Uuid,
    /// Signal (and slot) inside the file behind the exposed header.
    pub source: SignalSource,
}

#[derive(Clone)]
pub struct LoadedFile {
    pub path: String,
    pub headers: Vec<String>,
    pub created_at: String,
}

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<BsigSettings>,
    // Maps unique header -> SignalInfo
    pub signals: Arc<RwLock<HashMap<String, SignalInfo>>>,
    pub files: Arc<RwLock<HashMap<Uuid, LoadedFile>>>,
}

impl AppState {
    pub fn new(settings: BsigSettings) -> Self {
        Self {
            settings: Arc::new(settings),
            signals: Arc::new(RwLock::new(HashMap::new())),
            files: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(BsigSettings::default())
    }
}

/// `base`, or `base_1`, `base_2`, ... whichever is not taken yet.
pub fn unique_name<V>(taken: &HashMap<String, V>, base: &str) -> String {
    if !taken.contains_key(base) {
        return base.to_string();
    }
    (1..)
        .map(|i| format!("{}_{}", base, i))
        .find(|candidate| !taken.contains_key(candidate))
        .unwrap_or_else(|| base.to_string())
}
