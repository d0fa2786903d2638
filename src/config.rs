//! Service configuration, read from the environment.

use std::path::PathBuf;

use serde_json::Value;

use crate::error::ConfigError;

/// Partner configuration shipped with the binary, used when no config file
/// is supplied.
const DEFAULT_PARTNERS_JSON: &str = include_str!("../config/partners.json");

/// Runtime configuration for the onboarding service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Port for the REST API.
    pub port: u16,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Optional path to a partners JSON document; the embedded default is
    /// used when unset.
    pub partners_config_path: Option<PathBuf>,
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        let port = std::env::var("SURE_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let db_path = std::env::var("SURE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./data/sure-onboarding.db"));
        let partners_config_path = std::env::var("SURE_PARTNERS_CONFIG").ok().map(PathBuf::from);

        Self {
            port,
            db_path,
            partners_config_path,
        }
    }

    /// Load the partners config document: the configured file if set, else
    /// the embedded default.
    pub fn load_partners_config(&self) -> Result<Value, ConfigError> {
        let raw = match &self.partners_config_path {
            Some(path) => std::fs::read_to_string(path)?,
            None => DEFAULT_PARTNERS_JSON.to_string(),
        };
        serde_json::from_str(&raw).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_partners_config_parses() {
        let config = ServiceConfig {
            port: 0,
            db_path: PathBuf::new(),
            partners_config_path: None,
        };
        let value = config.load_partners_config().unwrap();
        assert!(value.get("partners").is_some());
    }
}
