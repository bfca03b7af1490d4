//! Engine configuration: backend URL, payload budget, request timeout.

use std::time::Duration;

/// Default server URL
const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";

/// Maximum decoded size of a photo-evidence payload (400 KiB).
/// The backend rejects anything larger.
pub const DEFAULT_IMAGE_BUDGET: usize = 400 * 1024;

/// Default submission request timeout
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    server_url: String,
    image_budget: usize,
    request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        let server_url = std::env::var("FIELDMETER_API_URL")
            .unwrap_or_else(|_| DEFAULT_SERVER_URL.to_string());
        Self {
            server_url,
            image_budget: DEFAULT_IMAGE_BUDGET,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration pointing at an explicit server URL
    pub fn with_server_url(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            ..Self::default()
        }
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.server_url, path)
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Maximum decoded image payload size in bytes
    pub fn image_budget(&self) -> usize {
        self.image_budget
    }

    /// Override the image payload budget
    pub fn set_image_budget(&mut self, bytes: usize) {
        self.image_budget = bytes;
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_with_server_url() {
        let config = Config::with_server_url("http://10.0.0.5:8080");
        assert_eq!(config.server_url(), "http://10.0.0.5:8080");
        assert_eq!(config.image_budget(), DEFAULT_IMAGE_BUDGET);
    }

    #[test]
    fn test_api_url() {
        let config = Config::with_server_url("http://10.0.0.5:8080");
        let url = config.api_url("/readings");
        assert_eq!(url, "http://10.0.0.5:8080/readings");
    }

    #[test]
    fn test_set_image_budget() {
        let mut config = Config::with_server_url("http://localhost:3000");
        config.set_image_budget(100 * 1024);
        assert_eq!(config.image_budget(), 100 * 1024);
    }
}
