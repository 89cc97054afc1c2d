//! Client configuration, read from an optional RON file.
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use ledger_core::{ProbeMode, DEFAULT_FEED_PAGE_SIZE};
use ledger_engine::BackendSettings;
use ledger_logging::LogDestination;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not parse config {path:?}: {message}")]
    Parse { path: PathBuf, message: String },
    #[error("invalid base url {0:?}: {1}")]
    BaseUrl(String, url::ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogTarget {
    #[default]
    File,
    Terminal,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::File => LogDestination::File,
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::Both => LogDestination::Both,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub session_token: Option<String>,
    pub cache_dir: PathBuf,
    /// Name of the persisted job list; one list per key.
    pub storage_key: String,
    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub feed_page_size: u32,
    /// `lazy` or `eager`.
    pub feed_probe: String,
    pub log_destination: LogTarget,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/".to_string(),
            session_token: None,
            cache_dir: PathBuf::from(".ledger"),
            storage_key: "review_jobs".to_string(),
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            feed_page_size: DEFAULT_FEED_PAGE_SIZE,
            feed_probe: ProbeMode::Lazy.as_str().to_string(),
            log_destination: LogTarget::File,
        }
    }
}

impl AppConfig {
    /// Reads `path` if given; a missing `--config` means all defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&text).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    pub fn probe(&self) -> ProbeMode {
        ProbeMode::parse(&self.feed_probe)
    }

    pub fn backend_settings(&self) -> Result<BackendSettings, ConfigError> {
        let base_url = Url::parse(&self.base_url)
            .map_err(|err| ConfigError::BaseUrl(self.base_url.clone(), err))?;
        let mut settings = BackendSettings::new(base_url);
        settings.connect_timeout = Duration::from_millis(self.connect_timeout_ms);
        settings.request_timeout = Duration::from_millis(self.request_timeout_ms);
        settings.session_token = self
            .session_token
            .clone()
            .filter(|token| !token.trim().is_empty());
        Ok(settings)
    }
}
