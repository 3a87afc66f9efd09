use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use studymap_content::{ContentConfig, MathConfig};
use studymap_graph::LayoutConfig;
use thiserror::Error;
use tracing::debug;

pub const ENV_CHAT_API_KEY: &str = "STUDYMAP_CHAT_API_KEY";
pub const ENV_CHAT_BASE_URL: &str = "STUDYMAP_CHAT_BASE_URL";
pub const ENV_CHAT_MODEL: &str = "STUDYMAP_CHAT_MODEL";
pub const ENV_MOCK_LATENCY_MS: &str = "STUDYMAP_MOCK_LATENCY_MS";
pub const ENV_MATH_URL: &str = "STUDYMAP_MATH_URL";
pub const ENV_HOST: &str = "STUDYMAP_HOST";
pub const ENV_PORT: &str = "STUDYMAP_PORT";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7878,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub content: ContentConfig,
    pub layout: LayoutConfig,
    pub math: MathConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Defaults, then the optional JSON file, then `STUDYMAP_*` variables.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply overrides from `lookup`, usually the process environment.
    /// Blank values are ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_CHAT_API_KEY) {
            self.content.remote.api_key = Some(key);
        }
        if let Some(url) = get(ENV_CHAT_BASE_URL) {
            self.content.remote.base_url = url;
        }
        if let Some(model) = get(ENV_CHAT_MODEL) {
            self.content.remote.model = model;
        }
        if let Some(raw) = get(ENV_MOCK_LATENCY_MS) {
            self.content.mock_latency_ms = parse_var(ENV_MOCK_LATENCY_MS, raw)?;
        }
        if let Some(url) = get(ENV_MATH_URL) {
            self.math.base_url = Some(url);
        }
        if let Some(host) = get(ENV_HOST) {
            self.server.host = host;
        }
        if let Some(raw) = get(ENV_PORT) {
            self.server.port = parse_var(ENV_PORT, raw)?;
        }
        debug!(config = ?self, "configuration resolved");
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, raw: String) -> Result<T, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { var, value: raw })
}
