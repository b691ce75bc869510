use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

#[macro_use]
mod macros;
pub mod logging;

pub mod app;
pub mod collection;
pub mod constants;
pub mod events;
pub mod gallery;
pub mod lifetime;
pub mod models;
pub mod network;
pub mod pagination;
pub mod status;
pub mod ui;
pub mod utils;

use events::{MountMode, StreamProvider};
use models::GenerationRequest;
use network::{ApiClient, StreamConfig};

#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    if let Err(e) = network::init_api_config() {
        info_log!("{}; using same-origin API until init_api_config_js() is called", e);
    }

    let window = web_sys::window().ok_or_else(|| JsValue::from_str("no global `window` exists"))?;
    let document = window
        .document()
        .ok_or_else(|| JsValue::from_str("should have a document on window"))?;

    let provider = StreamProvider::with_event_source(StreamConfig::default());
    app::mount_app(provider, MountMode::Immediate, Some(&document));

    // Close the stream and cancel pending reconnects when the tab goes away
    let on_pagehide = Closure::wrap(Box::new(move |_: web_sys::Event| {
        app::unmount_app();
    }) as Box<dyn FnMut(_)>);
    window.add_event_listener_with_callback("pagehide", on_pagehide.as_ref().unchecked_ref())?;
    on_pagehide.forget();

    Ok(())
}

/// Drop the current stream connection and open a fresh one.
#[wasm_bindgen]
pub fn reconnect_stream() -> Result<(), JsValue> {
    app::with_app(|app| app.provider().reconnect())
        .ok_or_else(not_mounted)
}

/// Connection, activity and queue summary as a plain JS object.
#[wasm_bindgen]
pub fn stream_status() -> Result<JsValue, JsValue> {
    let snapshot = app::with_app(|app| app::StreamSnapshot::capture(app.context()))
        .ok_or_else(not_mounted)?;
    to_js(&snapshot)
}

fn to_js<T: serde::Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value).map_err(|e| JsValue::from_str(&e.to_string()))
}

fn not_mounted() -> JsValue {
    JsValue::from_str("app is not mounted")
}

/// Start text generation for a monster. Resolves to the generation ticket;
/// progress arrives on the event stream under the ticket's id.
#[wasm_bindgen]
pub async fn generate_text(monster_id: String, prompt_type: String) -> Result<JsValue, JsValue> {
    let request = GenerationRequest::new(monster_id, prompt_type);
    let ticket = ApiClient::request_text_generation(&request)
        .await
        .map_err(|e| JsValue::from_str(&e.user_message()))?;
    to_js(&ticket)
}

/// Start image generation for a monster.
#[wasm_bindgen]
pub async fn generate_image(monster_id: String, prompt_type: String) -> Result<JsValue, JsValue> {
    let request = GenerationRequest::new(monster_id, prompt_type);
    let ticket = ApiClient::request_image_generation(&request)
        .await
        .map_err(|e| JsValue::from_str(&e.user_message()))?;
    to_js(&ticket)
}

/// Fetch the current gallery page again.
#[wasm_bindgen]
pub fn gallery_reload() -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().reload()).ok_or_else(not_mounted)
}

#[wasm_bindgen]
pub fn gallery_go_to_page(page: u32) -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().go_to_page(page)).ok_or_else(not_mounted)
}

#[wasm_bindgen]
pub fn gallery_next_page() -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().next_page()).ok_or_else(not_mounted)
}

#[wasm_bindgen]
pub fn gallery_previous_page() -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().previous_page()).ok_or_else(not_mounted)
}

#[wasm_bindgen]
pub fn gallery_set_page_size(page_size: u32) -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().set_page_size(page_size)).ok_or_else(not_mounted)
}

#[wasm_bindgen]
pub fn gallery_set_filter(filter: &str) -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().set_filter(filter)).ok_or_else(not_mounted)
}

#[wasm_bindgen]
pub fn gallery_set_sort(sort: &str) -> Result<(), JsValue> {
    app::with_app(|app| app.gallery().set_sort(sort)).ok_or_else(not_mounted)
}

/// Register `callback`, called with no arguments whenever `gallery_state()`
/// may have changed.
#[wasm_bindgen]
pub fn gallery_on_change(callback: js_sys::Function) -> Result<(), JsValue> {
    app::with_app(move |app| {
        app.gallery().set_on_change(Box::new(move || {
            if let Err(e) = callback.call0(&JsValue::NULL) {
                error_log!("Gallery change callback failed: {:?}", e);
            }
        }))
    })
    .ok_or_else(not_mounted)
}

/// Items, paging and load status of the gallery as a plain JS object.
#[wasm_bindgen]
pub fn gallery_state() -> Result<JsValue, JsValue> {
    let snapshot = app::with_app(|app| app.gallery().snapshot()).ok_or_else(not_mounted)?;
    to_js(&snapshot)
}
