use crate::constants::{DEFAULT_RECONNECT_DELAY_MS, DEFAULT_REQUEST_TIMEOUT_MS, STREAM_PATH};

/// API route configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    base_url: String,
}

impl Default for ApiConfig {
    /// Same-origin configuration: every URL is relative (`/api/...`). Used
    /// whenever neither `API_BASE_URL` nor `init_api_config_js()` supplied a
    /// base, which is also the case in unit tests.
    fn default() -> Self {
        Self {
            base_url: String::new(),
        }
    }
}

impl ApiConfig {
    /// Create a new ApiConfig from the API_BASE_URL environment variable
    pub fn new() -> Result<Self, &'static str> {
        if let Some(url) = option_env!("API_BASE_URL") {
            Ok(Self::from_url(url))
        } else {
            Err("API_BASE_URL environment variable is not set")
        }
    }

    /// Create a new ApiConfig from a URL string
    pub fn from_url(url: &str) -> Self {
        Self {
            base_url: url.trim().trim_end_matches('/').to_string(),
        }
    }

    /// Get the base URL for all API calls
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// URL of the server-push event stream
    pub fn stream_url(&self) -> String {
        self.url(STREAM_PATH)
    }

    /// Get a full API URL for a given path
    pub fn url(&self, path: &str) -> String {
        format!("{}/api{}", self.base_url, path)
    }
}

/// Settings for the event stream transport.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub url: String,
    /// Fixed delay before a reconnect attempt after a transport error
    pub reconnect_delay_ms: u32,
    /// When false a transport error leaves the connection down until a manual reconnect
    pub auto_reconnect: bool,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            url: super::stream_url(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            auto_reconnect: true,
        }
    }
}

/// Per-request knobs for REST calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestOptions {
    pub timeout_ms: u32,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_url_strips_trailing_slashes() {
        let cfg = ApiConfig::from_url("https://sanctuary.example.com//");
        assert_eq!(cfg.base_url(), "https://sanctuary.example.com");
        assert_eq!(cfg.url("/monsters"), "https://sanctuary.example.com/api/monsters");
    }

    #[test]
    fn stream_url_lives_under_api() {
        let cfg = ApiConfig::from_url("http://localhost:8000");
        assert_eq!(cfg.stream_url(), "http://localhost:8000/api/events/stream");
    }

    #[test]
    fn default_config_is_same_origin() {
        let cfg = ApiConfig::default();
        assert_eq!(cfg.url("/monsters"), "/api/monsters");
    }

    #[test]
    fn request_options_default_to_several_minutes() {
        assert_eq!(RequestOptions::default().timeout_ms, 300_000);
    }
}
