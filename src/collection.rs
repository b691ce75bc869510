//! List screen state: one server-paged collection plus its loading status.
//!
//! Loads are issued as tickets. A result is applied only if its ticket is
//! the most recent one and the owning screen is still mounted.

use std::cell::RefCell;
use std::future::Future;
use std::rc::Rc;

use serde_json::Value;

use crate::lifetime::LifetimeToken;
use crate::network::api_client::PageResult;
use crate::network::{ApiClient, ApiError, RequestOptions};
use crate::pagination::{PageRequest, Pagination};
use crate::models::Monster;

#[derive(Debug, Clone, PartialEq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
    Failed(ApiError),
}

/// One issued load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadTicket {
    seq: u64,
    request: PageRequest,
}

impl LoadTicket {
    pub fn request(&self) -> &PageRequest {
        &self.request
    }
}

/// What happened to a finished load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadResolution {
    Applied,
    /// A newer load was issued meanwhile
    Superseded,
    /// The owning screen went away
    Unmounted,
}

#[derive(Debug)]
pub struct PagedCollection<T> {
    pagination: Pagination,
    items: Vec<T>,
    filters_applied: Value,
    state: LoadState,
    latest_seq: u64,
}

impl<T> Default for PagedCollection<T> {
    fn default() -> Self {
        Self::new(Pagination::default())
    }
}

impl<T> PagedCollection<T> {
    pub fn new(pagination: Pagination) -> Self {
        Self {
            pagination,
            items: Vec::new(),
            filters_applied: Value::Null,
            state: LoadState::Idle,
            latest_seq: 0,
        }
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn filters_applied(&self) -> &Value {
        &self.filters_applied
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == LoadState::Loading
    }

    pub fn error(&self) -> Option<&ApiError> {
        match &self.state {
            LoadState::Failed(error) => Some(error),
            _ => None,
        }
    }

    /// Start a load for the current pagination state. Any earlier
    /// outstanding ticket becomes stale.
    pub fn begin_load(&mut self) -> LoadTicket {
        self.latest_seq += 1;
        self.state = LoadState::Loading;
        LoadTicket {
            seq: self.latest_seq,
            request: self.pagination.to_request(),
        }
    }

    /// Apply a finished load. Returns false for a stale ticket.
    /// On failure the previous items stay visible under the error.
    pub fn apply(&mut self, ticket: &LoadTicket, result: Result<PageResult<T>, ApiError>) -> bool {
        if ticket.seq != self.latest_seq {
            return false;
        }
        match result {
            Ok(page) => {
                self.pagination.set_total(page.total);
                self.items = page.items;
                self.filters_applied = page.filters_applied;
                self.state = LoadState::Loaded;
            }
            Err(error) => {
                self.state = LoadState::Failed(error);
            }
        }
        true
    }

    // The setters below return whether a reload is needed.

    pub fn go_to_page(&mut self, page: u32) -> bool {
        self.pagination.go_to_page(page)
    }

    pub fn next_page(&mut self) -> bool {
        self.pagination.next_page()
    }

    pub fn previous_page(&mut self) -> bool {
        self.pagination.previous_page()
    }

    pub fn set_page_size(&mut self, page_size: u32) -> bool {
        self.pagination.set_page_size(page_size)
    }

    pub fn set_filter(&mut self, filter: impl Into<String>) -> bool {
        self.pagination.set_filter(filter)
    }

    pub fn set_sort(&mut self, sort: impl Into<String>) -> bool {
        self.pagination.set_sort(sort)
    }
}

/// Settle `ticket` against `collection` unless the screen is gone.
pub fn complete_load<T>(
    collection: &RefCell<PagedCollection<T>>,
    lifetime: &LifetimeToken,
    ticket: &LoadTicket,
    result: Result<PageResult<T>, ApiError>,
) -> LoadResolution {
    if !lifetime.is_alive() {
        crate::debug_log!("Discarding page response for unmounted screen");
        return LoadResolution::Unmounted;
    }
    if collection.borrow_mut().apply(ticket, result) {
        LoadResolution::Applied
    } else {
        crate::debug_log!("Discarding superseded page response");
        LoadResolution::Superseded
    }
}

/// Issue a load with `fetch` on the browser event loop. `on_done` runs after
/// the result is settled, unless the screen unmounted.
pub fn spawn_load<T, F, Fut, D>(
    collection: Rc<RefCell<PagedCollection<T>>>,
    lifetime: LifetimeToken,
    fetch: F,
    on_done: D,
) where
    T: 'static,
    F: FnOnce(PageRequest) -> Fut,
    Fut: Future<Output = Result<PageResult<T>, ApiError>> + 'static,
    D: FnOnce(LoadResolution) + 'static,
{
    let ticket = collection.borrow_mut().begin_load();
    let pending = fetch(ticket.request().clone());
    wasm_bindgen_futures::spawn_local(async move {
        let result = pending.await;
        if let Err(error) = &result {
            crate::warn_log!("Page load failed: {}", error);
        }
        let resolution = complete_load(&collection, &lifetime, &ticket, result);
        if resolution != LoadResolution::Unmounted {
            on_done(resolution);
        }
    });
}

/// Load the current page of the monster collection.
pub fn load_monsters<D>(
    collection: Rc<RefCell<PagedCollection<Monster>>>,
    lifetime: LifetimeToken,
    on_done: D,
) where
    D: FnOnce(LoadResolution) + 'static,
{
    spawn_load(
        collection,
        lifetime,
        |request| async move { ApiClient::fetch_monsters(&request, RequestOptions::default()).await },
        on_done,
    );
}
