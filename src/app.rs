//! Application root. Owns the one stream provider for the tab.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use web_sys::Document;

use crate::constants::DEFAULT_PAGE_SIZE;
use crate::events::{ConnectionState, EventContext, MountMode, StreamProvider};
use crate::gallery::Gallery;
use crate::network::{EventSourceClient, EventTransport, StreamConfig};
use crate::status::{current_activity, Activity, QueueStatus};
use crate::ui::status_bar::{combined_queue_status, StatusBar};

thread_local! {
    static APP: RefCell<Option<App>> = RefCell::new(None);
}

pub struct App {
    provider: StreamProvider,
    status_bar: Option<StatusBar>,
    gallery: Gallery,
}

impl App {
    pub fn new(provider: StreamProvider, document: Option<&Document>) -> Self {
        let status_bar = document.map(|document| StatusBar::mount(document, provider.context()));
        Self {
            provider,
            status_bar,
            gallery: Gallery::new(DEFAULT_PAGE_SIZE),
        }
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn provider(&self) -> &StreamProvider {
        &self.provider
    }

    pub fn context(&self) -> &EventContext {
        self.provider.context()
    }

    /// Swap in a new browser transport for `config`, keeping the context and
    /// therefore every existing subscription.
    pub fn restart_stream(&mut self, config: StreamConfig) {
        let mode = if self.provider.is_mounted() {
            MountMode::Immediate
        } else {
            MountMode::Deferred
        };
        self.provider.unmount();
        let transport: Rc<RefCell<dyn EventTransport>> =
            Rc::new(RefCell::new(EventSourceClient::new(config)));
        self.provider = StreamProvider::new(transport, self.provider.context().clone());
        self.provider.mount(mode);
    }

    fn teardown(mut self) {
        self.status_bar.take();
        self.provider.unmount();
        // Dropping the gallery discards page loads still in flight
    }
}

/// Serializable view of the stream for `stream_status()`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamSnapshot {
    pub connection: ConnectionState,
    pub activity: Activity,
    pub queue: QueueStatus,
}

impl StreamSnapshot {
    pub fn capture(context: &EventContext) -> Self {
        Self {
            connection: context.connection(),
            activity: context.read(current_activity),
            queue: combined_queue_status(context),
        }
    }
}

/// Install `provider` as the app root and mount it. A previously mounted app
/// is torn down first so at most one connection exists.
pub fn mount_app(provider: StreamProvider, mode: MountMode, document: Option<&Document>) {
    unmount_app();
    provider.mount(mode);
    let app = App::new(provider, document);
    APP.with(|slot| *slot.borrow_mut() = Some(app));
    crate::info_log!("App mounted");
}

pub fn unmount_app() {
    let app = APP.with(|slot| slot.borrow_mut().take());
    if let Some(app) = app {
        app.teardown();
        crate::info_log!("App unmounted");
    }
}

pub fn with_app<R>(f: impl FnOnce(&App) -> R) -> Option<R> {
    APP.with(|slot| slot.borrow().as_ref().map(f))
}

pub fn with_app_mut<R>(f: impl FnOnce(&mut App) -> R) -> Option<R> {
    APP.with(|slot| slot.borrow_mut().as_mut().map(f))
}
