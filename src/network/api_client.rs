use std::cell::Cell;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Headers, Request, RequestInit, RequestMode, Response};

use super::event_source::js_error_text;
use super::{api_config, GenerationKind, RequestOptions};
use crate::constants::MONSTERS_ITEMS_KEY;
use crate::models::{GenerationRequest, GenerationTicket, Monster};
use crate::pagination::PageRequest;

/// Failure of a single REST request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("request timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u32 },
    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Coarse category of an `ApiError`, each rendered with its own guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Connectivity,
    Timeout,
    Server,
}

impl ErrorKind {
    pub fn guidance(self) -> &'static str {
        match self {
            ErrorKind::Connectivity => "Could not reach the server. Is it running?",
            ErrorKind::Timeout => "The server is taking too long. It may be busy, try again.",
            ErrorKind::Server => "The server could not complete the request.",
        }
    }

    /// Whether a retry button makes sense.
    pub fn is_retryable(self) -> bool {
        !matches!(self, ErrorKind::Server)
    }
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::Connectivity,
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Server { .. } | ApiError::InvalidResponse(_) => ErrorKind::Server,
        }
    }

    pub fn guidance(&self) -> &'static str {
        self.kind().guidance()
    }

    /// Text for the error banner. Server messages are shown verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Server { message, .. } => message.clone(),
            other => other.guidance().to_string(),
        }
    }
}

/// Human readable message for a non-success response. Uses the `detail`,
/// `message` or `error` field of a JSON body when present.
pub fn server_error_message(status: u16, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["detail", "message", "error"] {
            match map.get(key) {
                Some(Value::String(text)) if !text.trim().is_empty() => {
                    return text.trim().to_string()
                }
                Some(Value::Object(inner)) => {
                    if let Some(Value::String(text)) = inner.get("message") {
                        return text.clone();
                    }
                }
                _ => {}
            }
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() <= 200 && !trimmed.starts_with('<') {
        return trimmed.to_string();
    }
    format!("Request failed with status {}", status)
}

/// Normalized page of a server-paged collection.
#[derive(Debug, Clone, PartialEq)]
pub struct PageResult<T> {
    pub items: Vec<T>,
    /// Size of the whole filtered collection
    pub total: u64,
    /// Always equals `items.len()`
    pub returned_count: usize,
    pub filters_applied: Value,
}

impl<T: DeserializeOwned> PageResult<T> {
    /// Parse a list response. Items are read from `items_key`, falling back
    /// to `items`; missing `total` defaults to the number of items.
    pub fn from_body(body: &str, items_key: &str) -> Result<Self, ApiError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ApiError::InvalidResponse(format!("not JSON: {}", e)))?;
        let Value::Object(mut map) = value else {
            return Err(ApiError::InvalidResponse("expected a JSON object".into()));
        };

        let raw_items = map
            .remove(items_key)
            .or_else(|| map.remove("items"))
            .ok_or_else(|| ApiError::InvalidResponse(format!("missing `{}` list", items_key)))?;
        let items: Vec<T> = serde_json::from_value(raw_items)
            .map_err(|e| ApiError::InvalidResponse(format!("bad `{}` list: {}", items_key, e)))?;

        let returned_count = items.len();
        if let Some(count) = map.get("count").and_then(Value::as_u64) {
            if count != returned_count as u64 {
                crate::warn_log!(
                    "List response count {} disagrees with {} items received",
                    count,
                    returned_count
                );
            }
        }
        let total = map
            .get("total")
            .and_then(Value::as_u64)
            .unwrap_or(returned_count as u64);

        Ok(Self {
            items,
            total,
            returned_count,
            filters_applied: map.remove("filters_applied").unwrap_or(Value::Null),
        })
    }
}

impl<T> PageResult<T> {
    /// Drop anything past `limit` in case the server ignored it.
    pub fn truncate(mut self, limit: u32) -> Self {
        self.items.truncate(limit as usize);
        self.returned_count = self.items.len();
        self
    }
}

// REST client for the collection and generation endpoints
pub struct ApiClient;

impl ApiClient {
    // ---------------- Collections ----------------

    /// Fetch one page of a server-paged collection at `path`.
    pub async fn fetch_page<T: DeserializeOwned>(
        path: &str,
        items_key: &str,
        request: &PageRequest,
        options: RequestOptions,
    ) -> Result<PageResult<T>, ApiError> {
        let url = format!("{}?{}", api_config().url(path), request.query_string());
        let body = Self::fetch_json(&url, "GET", None, options).await?;
        Ok(PageResult::from_body(&body, items_key)?.truncate(request.limit))
    }

    pub async fn fetch_monsters(
        request: &PageRequest,
        options: RequestOptions,
    ) -> Result<PageResult<Monster>, ApiError> {
        Self::fetch_page("/monsters", MONSTERS_ITEMS_KEY, request, options).await
    }

    // ---------------- Generation ----------------

    /// Enqueue a generation. Progress and result arrive on the event stream.
    pub async fn request_generation(
        kind: GenerationKind,
        request: &GenerationRequest,
        options: RequestOptions,
    ) -> Result<GenerationTicket, ApiError> {
        let path = match kind {
            GenerationKind::Text => "/generation/text",
            GenerationKind::Image => "/generation/image",
        };
        let payload = serde_json::to_string(request)
            .map_err(|e| ApiError::InvalidResponse(format!("unserializable request: {}", e)))?;
        let body =
            Self::fetch_json(&api_config().url(path), "POST", Some(&payload), options).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("bad generation ticket: {}", e)))
    }

    pub async fn request_text_generation(
        request: &GenerationRequest,
    ) -> Result<GenerationTicket, ApiError> {
        Self::request_generation(GenerationKind::Text, request, RequestOptions::default()).await
    }

    pub async fn request_image_generation(
        request: &GenerationRequest,
    ) -> Result<GenerationTicket, ApiError> {
        Self::request_generation(GenerationKind::Image, request, RequestOptions::default()).await
    }

    /// Helper: perform a request and return the body text. The request is
    /// aborted once `options.timeout_ms` elapses.
    pub async fn fetch_json(
        url: &str,
        method: &str,
        body: Option<&str>,
        options: RequestOptions,
    ) -> Result<String, ApiError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let network = |e: JsValue| ApiError::Network(js_error_text(&e));

        let controller = AbortController::new().map_err(network)?;
        let timed_out = Rc::new(Cell::new(false));
        let timer = {
            let timed_out = timed_out.clone();
            let controller = controller.clone();
            Timeout::new(options.timeout_ms, move || {
                timed_out.set(true);
                controller.abort();
            })
        };

        let opts = RequestInit::new();
        opts.set_method(method);
        opts.set_mode(RequestMode::Cors);
        opts.set_signal(Some(&controller.signal()));

        let headers = Headers::new().map_err(network)?;
        headers.append("X-Request-Id", &request_id).map_err(network)?;
        if let Some(data) = body {
            opts.set_body(&JsValue::from_str(data));
            headers
                .append("Content-Type", "application/json")
                .map_err(network)?;
        }
        opts.set_headers(&headers);

        let request = Request::new_with_str_and_init(url, &opts).map_err(network)?;
        let window =
            web_sys::window().ok_or_else(|| ApiError::Network("no global window".into()))?;

        let outcome = async {
            let resp_value = JsFuture::from(window.fetch_with_request(&request)).await?;
            let resp: Response = resp_value.dyn_into()?;
            let text = JsFuture::from(resp.text()?).await?;
            Ok::<_, JsValue>((resp.ok(), resp.status(), text.as_string().unwrap_or_default()))
        }
        .await;
        timer.cancel();

        match outcome {
            Ok((true, _, text)) => Ok(text),
            Ok((false, status, text)) => {
                let message = server_error_message(status, &text);
                crate::warn_log!("{} {} [{}] failed: {} {}", method, url, request_id, status, message);
                Err(ApiError::Server { status, message })
            }
            Err(_) if timed_out.get() => {
                crate::warn_log!("{} {} [{}] timed out", method, url, request_id);
                Err(ApiError::Timeout {
                    timeout_ms: options.timeout_ms,
                })
            }
            Err(e) => {
                let error = network(e);
                crate::error_log!("{} {} [{}] failed: {}", method, url, request_id, error);
                Err(error)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    /// Serve `request` against an in-memory collection the way the backend
    /// does.
    fn serve(fixture: &[Value], request: &PageRequest) -> String {
        let page: Vec<Value> = fixture
            .iter()
            .skip(request.offset as usize)
            .take(request.limit as usize)
            .cloned()
            .collect();
        json!({
            "monsters": page,
            "total": fixture.len(),
            "count": page.len(),
            "filters_applied": {"filter": request.filter, "sort": request.sort},
        })
        .to_string()
    }

    fn fixture(n: usize) -> Vec<Value> {
        (0..n)
            .map(|i| json!({"id": i, "name": format!("Monster {}", i)}))
            .collect()
    }

    #[test]
    fn page_result_reads_domain_key() {
        let request = PageRequest {
            limit: 5,
            offset: 10,
            ..PageRequest::default()
        };
        let page: PageResult<Monster> =
            PageResult::from_body(&serve(&fixture(12), &request), MONSTERS_ITEMS_KEY).unwrap();
        assert_eq!(page.returned_count, 2);
        assert_eq!(page.total, 12);
        assert_eq!(page.items[0].name, "Monster 10");
        assert_eq!(page.filters_applied["filter"], "all");
    }

    #[test]
    fn page_result_falls_back_to_items_and_item_count() {
        let page: PageResult<Monster> =
            PageResult::from_body(r#"{"items":[{"name":"a"},{"name":"b"}]}"#, "monsters").unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.returned_count, 2);
        assert_eq!(page.filters_applied, Value::Null);
    }

    #[test]
    fn page_result_rejects_unusable_bodies() {
        let err = PageResult::<Monster>::from_body("<html>", "monsters").unwrap_err();
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        let err = PageResult::<Monster>::from_body(r#"{"total": 3}"#, "monsters").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Server);
    }

    #[test]
    fn truncate_enforces_limit() {
        let page: PageResult<Monster> =
            PageResult::from_body(&json!({"monsters": fixture(4), "total": 4}).to_string(), "monsters")
                .unwrap()
                .truncate(3);
        assert_eq!(page.items.len(), 3);
        assert_eq!(page.returned_count, 3);
        assert_eq!(page.total, 4);
    }

    #[test]
    fn error_kinds_carry_distinct_guidance() {
        let network = ApiError::Network("TypeError: Failed to fetch".into());
        let timeout = ApiError::Timeout { timeout_ms: 300_000 };
        let server = ApiError::Server {
            status: 500,
            message: "Monster not found".into(),
        };
        assert_eq!(network.kind(), ErrorKind::Connectivity);
        assert_eq!(timeout.kind(), ErrorKind::Timeout);
        assert_eq!(server.kind(), ErrorKind::Server);
        assert_ne!(network.guidance(), timeout.guidance());
        assert!(network.kind().is_retryable());
        assert!(timeout.kind().is_retryable());
        assert!(!server.kind().is_retryable());
        assert_eq!(server.user_message(), "Monster not found");
        assert_eq!(timeout.to_string(), "request timed out after 300000 ms");
    }

    #[test]
    fn server_error_message_prefers_structured_fields() {
        assert_eq!(
            server_error_message(404, r#"{"detail": "Monster not found"}"#),
            "Monster not found"
        );
        assert_eq!(
            server_error_message(500, r#"{"error": {"message": "boom"}}"#),
            "boom"
        );
        assert_eq!(server_error_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(
            server_error_message(502, "<html><body>proxy</body></html>"),
            "Request failed with status 502"
        );
        assert_eq!(server_error_message(500, ""), "Request failed with status 500");
    }

    proptest! {
        #[test]
        fn fetched_page_length_matches_fixture(n in 0usize..120, limit in 1u32..40, offset in 0u32..150) {
            let request = PageRequest { limit, offset, ..PageRequest::default() };
            let page: PageResult<Monster> =
                PageResult::from_body(&serve(&fixture(n), &request), MONSTERS_ITEMS_KEY).unwrap();
            let expected = (limit as usize).min(n.saturating_sub(offset as usize));
            prop_assert_eq!(page.items.len(), expected);
            prop_assert_eq!(page.returned_count, expected);
            prop_assert_eq!(page.total, n as u64);
        }
    }
}
