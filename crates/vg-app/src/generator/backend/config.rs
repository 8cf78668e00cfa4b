use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/video/generations";

#[derive(Debug, Clone)]
pub struct GenBackendConfig {
    /// Collection URL; status lives at `{endpoint}/{id}`.
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl Default for GenBackendConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}
