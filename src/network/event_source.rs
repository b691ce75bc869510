use std::cell::RefCell;
use std::rc::{Rc, Weak};

use gloo_timers::callback::Timeout;
use thiserror::Error;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, EventSource, MessageEvent};

use super::config::StreamConfig;
use super::event_types::EventKind;
use crate::{debug_log, error_log, info_log, warn_log};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("failed to open event stream at {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("failed to register listener for '{name}': {reason}")]
    Listener { name: String, reason: String },
}

/// Server-push transport interface. The app root owns exactly one; tests
/// substitute a fake.
pub trait EventTransport {
    /// Open the connection. Implementations close any previous one first.
    fn connect(&mut self) -> Result<(), TransportError>;
    /// Close the connection and cancel any pending reconnect.
    fn close(&mut self);
    fn is_open(&self) -> bool;
    fn set_on_open(&mut self, callback: Box<dyn FnMut() + 'static>);
    /// Receives `(event name, raw data)` for every named event.
    fn set_on_event(&mut self, callback: Box<dyn FnMut(&str, &str) + 'static>);
    /// Receives an optional error description when the connection drops.
    fn set_on_error(&mut self, callback: Box<dyn FnMut(Option<String>) + 'static>);
}

type OnOpenCallback = Rc<RefCell<dyn FnMut()>>;
type OnEventCallback = Rc<RefCell<dyn FnMut(&str, &str)>>;
type OnErrorCallback = Rc<RefCell<dyn FnMut(Option<String>)>>;

#[derive(Clone, Default)]
struct Callbacks {
    on_open: Option<OnOpenCallback>,
    on_event: Option<OnEventCallback>,
    on_error: Option<OnErrorCallback>,
}

struct Inner {
    config: StreamConfig,
    source: Option<EventSource>,
    // Closures must outlive the EventSource that calls them
    open_handler: Option<Closure<dyn FnMut(Event)>>,
    error_handler: Option<Closure<dyn FnMut(Event)>>,
    message_handlers: Vec<(&'static str, Closure<dyn FnMut(MessageEvent)>)>,
    reconnect_timer: Option<Timeout>,
    // Cleared when the timer fires, unlike `reconnect_timer`
    reconnect_pending: bool,
    reconnect_attempts: u32,
    callbacks: Callbacks,
}

impl Inner {
    fn close_source(&mut self) {
        if let Some(source) = self.source.take() {
            abandon(&source);
            for (name, handler) in &self.message_handlers {
                if *name != "message" {
                    let _ = source
                        .remove_event_listener_with_callback(name, handler.as_ref().unchecked_ref());
                }
            }
        }
        self.open_handler = None;
        self.error_handler = None;
        self.message_handlers.clear();
    }
}

/// `EventSource`-backed transport with fixed-delay reconnect.
///
/// The browser's own EventSource retry is disabled by closing the source on
/// the first error; a single reconnect is then scheduled after
/// `reconnect_delay_ms` so a down backend is not hammered.
pub struct EventSourceClient {
    inner: Rc<RefCell<Inner>>,
}

impl EventSourceClient {
    pub fn new(config: StreamConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                config,
                source: None,
                open_handler: None,
                error_handler: None,
                message_handlers: Vec::new(),
                reconnect_timer: None,
                reconnect_pending: false,
                reconnect_attempts: 0,
                callbacks: Callbacks::default(),
            })),
        }
    }

    pub fn new_default() -> Self {
        Self::new(StreamConfig::default())
    }

    pub fn config(&self) -> StreamConfig {
        self.inner.borrow().config.clone()
    }

    pub fn has_pending_reconnect(&self) -> bool {
        self.inner.borrow().reconnect_pending
    }

    /// Reconnects attempted by the timer since creation.
    pub fn reconnect_attempts(&self) -> u32 {
        self.inner.borrow().reconnect_attempts
    }

    /// Creates the EventSource and attaches handlers, replacing any previous one.
    fn open(inner: &Rc<RefCell<Inner>>) -> Result<(), TransportError> {
        let mut guard = inner.borrow_mut();
        guard.close_source();

        let url = guard.config.url.clone();
        info_log!("Opening event stream: {}", url);
        let source = EventSource::new(&url).map_err(|e| TransportError::Open {
            url: url.clone(),
            reason: js_error_text(&e),
        })?;

        let callbacks = guard.callbacks.clone();

        let on_open = callbacks.on_open.clone();
        let open_handler = Closure::wrap(Box::new(move |_: Event| {
            info_log!("Event stream connected");
            if let Some(callback) = &on_open {
                (callback.borrow_mut())();
            }
        }) as Box<dyn FnMut(Event)>);
        source.set_onopen(Some(open_handler.as_ref().unchecked_ref()));

        let weak = Rc::downgrade(inner);
        let error_handler = Closure::wrap(Box::new(move |_: Event| {
            Self::handle_error(&weak);
        }) as Box<dyn FnMut(Event)>);
        source.set_onerror(Some(error_handler.as_ref().unchecked_ref()));

        // Unnamed events arrive as "message"; the registry ignores that name
        // but they still count as activity.
        let mut names: Vec<&'static str> = EventKind::ALL.iter().map(|kind| kind.name()).collect();
        names.push("message");

        for name in names {
            let on_event = callbacks.on_event.clone();
            let handler = Closure::wrap(Box::new(move |event: MessageEvent| {
                match event.data().as_string() {
                    Some(data) => {
                        if let Some(callback) = &on_event {
                            (callback.borrow_mut())(name, &data);
                        }
                    }
                    None => warn_log!("Received non-text payload for '{}'", name),
                }
            }) as Box<dyn FnMut(MessageEvent)>);

            if name == "message" {
                source.set_onmessage(Some(handler.as_ref().unchecked_ref()));
            } else if let Err(e) =
                source.add_event_listener_with_callback(name, handler.as_ref().unchecked_ref())
            {
                // The source is already connecting; do not leave it running
                abandon(&source);
                return Err(TransportError::Listener {
                    name: name.to_string(),
                    reason: js_error_text(&e),
                });
            }
            guard.message_handlers.push((name, handler));
        }

        guard.open_handler = Some(open_handler);
        guard.error_handler = Some(error_handler);
        guard.source = Some(source);
        Ok(())
    }

    fn handle_error(weak: &Weak<RefCell<Inner>>) {
        let Some(inner) = weak.upgrade() else {
            return;
        };

        let (on_error, delay) = {
            let mut guard = inner.borrow_mut();
            // Stop the browser's built-in retry; the handlers stay alive
            // until the next open() replaces them.
            if let Some(source) = guard.source.take() {
                source.close();
            }
            let delay = guard
                .config
                .auto_reconnect
                .then_some(guard.config.reconnect_delay_ms);
            (guard.callbacks.on_error.clone(), delay)
        };

        error_log!("Event stream error");
        if let Some(callback) = on_error {
            (callback.borrow_mut())(None);
        }

        if let Some(delay) = delay {
            Self::schedule_reconnect(&inner, delay);
        } else {
            info_log!("Auto-reconnect disabled; waiting for manual reconnect");
        }
    }

    fn schedule_reconnect(inner: &Rc<RefCell<Inner>>, delay_ms: u32) {
        debug_log!("Scheduling event stream reconnect in {} ms", delay_ms);
        let weak = Rc::downgrade(inner);
        let timer = Timeout::new(delay_ms, move || {
            if let Some(inner) = weak.upgrade() {
                Self::reconnect_due(&inner);
            }
        });
        // Replacing a fired timer is harmless; replacing a pending one cancels it.
        let mut guard = inner.borrow_mut();
        guard.reconnect_timer = Some(timer);
        guard.reconnect_pending = true;
    }

    /// Timer body. A no-op unless a reconnect is still pending.
    fn reconnect_due(inner: &Rc<RefCell<Inner>>) {
        {
            let mut guard = inner.borrow_mut();
            if !guard.reconnect_pending {
                return;
            }
            guard.reconnect_pending = false;
            guard.reconnect_attempts += 1;
        }
        info_log!("Attempting event stream reconnect");
        if let Err(e) = Self::open(inner) {
            error_log!("Reconnect failed: {}", e);
            Self::handle_error(&Rc::downgrade(inner));
        }
    }

    fn cancel_reconnect(&self) {
        let mut guard = self.inner.borrow_mut();
        guard.reconnect_timer.take();
        if std::mem::replace(&mut guard.reconnect_pending, false) {
            debug_log!("Cancelled pending event stream reconnect");
        }
    }
}

impl EventTransport for EventSourceClient {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.cancel_reconnect();
        Self::open(&self.inner)
    }

    fn close(&mut self) {
        self.cancel_reconnect();
        let mut guard = self.inner.borrow_mut();
        if guard.source.is_some() {
            info_log!("Closing event stream");
        }
        guard.close_source();
    }

    fn is_open(&self) -> bool {
        self.inner
            .borrow()
            .source
            .as_ref()
            .map_or(false, |source| source.ready_state() == EventSource::OPEN)
    }

    fn set_on_open(&mut self, callback: Box<dyn FnMut() + 'static>) {
        self.inner.borrow_mut().callbacks.on_open = Some(Rc::new(RefCell::new(callback)));
    }

    fn set_on_event(&mut self, callback: Box<dyn FnMut(&str, &str) + 'static>) {
        self.inner.borrow_mut().callbacks.on_event = Some(Rc::new(RefCell::new(callback)));
    }

    fn set_on_error(&mut self, callback: Box<dyn FnMut(Option<String>) + 'static>) {
        self.inner.borrow_mut().callbacks.on_error = Some(Rc::new(RefCell::new(callback)));
    }
}

impl Drop for EventSourceClient {
    fn drop(&mut self) {
        self.close();
    }
}

/// Close `source` and detach its handler properties.
fn abandon(source: &EventSource) {
    source.close();
    source.set_onopen(None);
    source.set_onerror(None);
    source.set_onmessage(None);
}

pub(crate) fn js_error_text(value: &JsValue) -> String {
    value
        .as_string()
        .or_else(|| {
            value
                .dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{:?}", value))
}
