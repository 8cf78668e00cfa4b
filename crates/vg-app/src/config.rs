use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::debug;

use crate::error::AppError;
use crate::generator::backend::config::{DEFAULT_ENDPOINT, GenBackendConfig};
use crate::poller::PollerConfig;

pub const DEFAULT_DATA_DIR: &str = "outputs/store";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub backend: GenBackendConfig,
    pub poller: PollerConfig,
    pub data_dir: PathBuf,
    /// Used when no key has been saved in the store.
    pub api_key: Option<String>,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn load() -> Result<Self, AppError> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(AppError::Config(format!("Failed to read .env: {e}"))),
        }

        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let defaults = PollerConfig::default();
        let poller = PollerConfig {
            poll_interval: Duration::from_secs(parse_or(
                &var,
                "VG_POLL_INTERVAL_SECS",
                defaults.poll_interval.as_secs(),
            )?),
            max_polls: parse_or(&var, "VG_MAX_POLLS", defaults.max_polls)?,
            max_transient_retries: parse_or(
                &var,
                "VG_MAX_TRANSIENT_RETRIES",
                defaults.max_transient_retries,
            )?,
            ..defaults
        };
        if poller.poll_interval.is_zero() {
            return Err(AppError::Config("VG_POLL_INTERVAL_SECS must be at least 1".into()));
        }

        let backend = GenBackendConfig {
            endpoint: var("VG_API_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            request_timeout: Duration::from_secs(parse_or(&var, "VG_REQUEST_TIMEOUT_SECS", 30)?),
        };

        Ok(Self {
            backend,
            poller,
            data_dir: var("VG_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            api_key: var("SORA_API_KEY"),
        })
    }
}

fn parse_or<T: FromStr>(
    var: impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, AppError> {
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| AppError::Config(format!("{key} must be a number, got {raw:?}"))),
        None => Ok(default),
    }
}
