use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::AttainmentConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Loaded once at startup; handlers only read it.
    pub config: AttainmentConfig,
}

impl AppState {
    pub fn new(config: AttainmentConfig) -> Self {
        Self {
            workspace: None,
            db: None,
            config,
        }
    }
}
