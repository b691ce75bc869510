// Re-export network modules
pub mod api_client;
pub mod config;
pub mod event_source;
pub mod event_types;

// Re-export commonly used items
pub use api_client::{ApiClient, ApiError, ErrorKind};
pub use config::{ApiConfig, RequestOptions, StreamConfig};
pub use event_source::{EventSourceClient, EventTransport, TransportError};
pub use event_types::{EventKind, GenerationKind, GenerationPhase};

use lazy_static::lazy_static;
use std::sync::RwLock;
use wasm_bindgen::prelude::*;

lazy_static! {
    static ref API_CONFIG: RwLock<Option<ApiConfig>> = RwLock::new(None);
}

/// Initialize the API configuration from the build-time `API_BASE_URL`.
pub fn init_api_config() -> Result<(), &'static str> {
    let config = ApiConfig::new()?;
    set_api_config(config);
    Ok(())
}

/// Initialize the API configuration from a JS-provided URL.
/// This allows runtime configuration of the API endpoints.
#[wasm_bindgen]
pub fn init_api_config_js(api_base_url: &str) -> Result<(), JsValue> {
    crate::debug_log!("Initializing API config from JS: {}", api_base_url);
    let config = ApiConfig::from_url(api_base_url);
    let changed = api_config() != config;
    set_api_config(config);
    if changed {
        // An already running stream still points at the old origin
        crate::app::with_app_mut(|app| app.restart_stream(StreamConfig::default()));
    }
    Ok(())
}

fn set_api_config(config: ApiConfig) {
    match API_CONFIG.write() {
        Ok(mut guard) => *guard = Some(config),
        Err(poisoned) => *poisoned.into_inner() = Some(config),
    }
}

/// Current configuration, or the same-origin default when none was set.
pub fn api_config() -> ApiConfig {
    API_CONFIG
        .read()
        .ok()
        .and_then(|guard| guard.clone())
        .unwrap_or_default()
}

/// Get the event stream URL
pub(crate) fn stream_url() -> String {
    api_config().stream_url()
}
