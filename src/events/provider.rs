//! App-root owner of the single stream connection.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use super::context::EventContext;
use crate::network::config::StreamConfig;
use crate::network::event_source::{EventSourceClient, EventTransport};
use crate::{info_log, warn_log};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountMode {
    /// Connect as soon as the provider mounts
    Immediate,
    /// Build the context but wait for an explicit `connect()`
    Deferred,
}

/// Binds one transport to one [`EventContext`].
///
/// Only the provider opens or closes the connection; everything else gets a
/// cloned context and observes.
pub struct StreamProvider {
    context: EventContext,
    transport: Rc<RefCell<dyn EventTransport>>,
    mounted: Cell<bool>,
}

impl StreamProvider {
    pub fn new(transport: Rc<RefCell<dyn EventTransport>>, context: EventContext) -> Self {
        {
            let mut t = transport.borrow_mut();

            let ctx = context.clone();
            t.set_on_open(Box::new(move || ctx.connection_opened()));

            let ctx = context.clone();
            t.set_on_event(Box::new(move |name: &str, data: &str| {
                ctx.handle_message(name, data);
            }));

            let ctx = context.clone();
            t.set_on_error(Box::new(move |error: Option<String>| {
                ctx.connection_lost(error.as_deref())
            }));
        }

        Self {
            context,
            transport,
            mounted: Cell::new(false),
        }
    }

    /// Provider backed by the browser `EventSource`.
    pub fn with_event_source(config: StreamConfig) -> Self {
        let transport: Rc<RefCell<dyn EventTransport>> =
            Rc::new(RefCell::new(EventSourceClient::new(config)));
        Self::new(transport, EventContext::default())
    }

    pub fn context(&self) -> &EventContext {
        &self.context
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    pub fn mount(&self, mode: MountMode) {
        self.mounted.set(true);
        match mode {
            MountMode::Immediate => self.connect(),
            MountMode::Deferred => info_log!("Event stream connection deferred"),
        }
    }

    /// Open the connection, closing any previous one first. Failures are
    /// reported through the context's connection state.
    pub fn connect(&self) {
        if !self.mounted.get() {
            warn_log!("connect() called on an unmounted stream provider");
            return;
        }
        let result = {
            let mut transport = self.transport.borrow_mut();
            transport.close();
            transport.connect()
        };
        if let Err(e) = result {
            self.context.connection_lost(Some(&e.to_string()));
        }
    }

    /// Manual reconnect: reset the connection state, then connect afresh.
    pub fn reconnect(&self) {
        info_log!("Manual event stream reconnect");
        self.context.reset_connection();
        self.connect();
    }

    /// Close the connection and cancel any pending reconnect.
    pub fn unmount(&self) {
        if !self.mounted.replace(false) {
            return;
        }
        self.transport.borrow_mut().close();
        self.context.connection_closed();
    }
}

impl Drop for StreamProvider {
    fn drop(&mut self) {
        self.unmount();
    }
}
