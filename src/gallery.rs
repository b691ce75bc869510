//! Monster gallery screen state: the paged monster list and its controls.

use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;

use crate::collection::{load_monsters, LoadResolution, LoadState, PagedCollection};
use crate::lifetime::{ComponentLifetime, LifetimeToken};
use crate::models::Monster;
use crate::network::ErrorKind;
use crate::pagination::Pagination;

pub type MonsterCollection = Rc<RefCell<PagedCollection<Monster>>>;
type Loader = Rc<dyn Fn(MonsterCollection, LifetimeToken, Box<dyn FnOnce(LoadResolution)>)>;
type OnChange = Rc<RefCell<Option<Box<dyn Fn()>>>>;

/// Error block shown above the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GalleryError {
    pub kind: ErrorKind,
    pub message: String,
    pub guidance: &'static str,
    pub retryable: bool,
}

/// Everything the gallery view renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GallerySnapshot {
    pub items: Vec<Monster>,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub total: Option<u64>,
    pub filter: String,
    pub sort: String,
    pub loading: bool,
    pub error: Option<GalleryError>,
}

impl GallerySnapshot {
    pub fn of(collection: &PagedCollection<Monster>) -> Self {
        let pagination = collection.pagination();
        let error = match collection.state() {
            LoadState::Failed(error) => Some(GalleryError {
                kind: error.kind(),
                message: error.user_message(),
                guidance: error.guidance(),
                retryable: error.kind().is_retryable(),
            }),
            _ => None,
        };
        Self {
            items: collection.items().to_vec(),
            page: pagination.current_page(),
            page_size: pagination.page_size(),
            total_pages: pagination.total_pages(),
            total: pagination.total(),
            filter: pagination.filter().to_string(),
            sort: pagination.sort().to_string(),
            loading: collection.is_loading(),
            error,
        }
    }
}

/// Mounted gallery. Dropping it discards any response still in flight.
pub struct Gallery {
    collection: MonsterCollection,
    lifetime: ComponentLifetime,
    loader: Loader,
    on_change: OnChange,
}

impl Gallery {
    /// Gallery backed by the monster list endpoint.
    pub fn new(page_size: u32) -> Self {
        Self::with_loader(
            page_size,
            Rc::new(
                |collection: MonsterCollection,
                 lifetime: LifetimeToken,
                 on_done: Box<dyn FnOnce(LoadResolution)>| {
                    load_monsters(collection, lifetime, on_done)
                },
            ),
        )
    }

    fn with_loader(page_size: u32, loader: Loader) -> Self {
        Self {
            collection: Rc::new(RefCell::new(PagedCollection::new(Pagination::new(page_size)))),
            lifetime: ComponentLifetime::new(),
            loader,
            on_change: Rc::new(RefCell::new(None)),
        }
    }

    /// Called whenever the snapshot may have changed.
    pub fn set_on_change(&self, callback: Box<dyn Fn()>) {
        *self.on_change.borrow_mut() = Some(callback);
    }

    pub fn snapshot(&self) -> GallerySnapshot {
        GallerySnapshot::of(&self.collection.borrow())
    }

    /// Fetch the current page again.
    pub fn reload(&self) {
        let on_change = self.on_change.clone();
        (self.loader)(
            self.collection.clone(),
            self.lifetime.token(),
            Box::new(move |resolution| {
                if resolution == LoadResolution::Applied {
                    notify(&on_change);
                }
            }),
        );
        notify(&self.on_change);
    }

    pub fn go_to_page(&self, page: u32) {
        let changed = self.collection.borrow_mut().go_to_page(page);
        self.reload_if(changed);
    }

    pub fn next_page(&self) {
        let changed = self.collection.borrow_mut().next_page();
        self.reload_if(changed);
    }

    pub fn previous_page(&self) {
        let changed = self.collection.borrow_mut().previous_page();
        self.reload_if(changed);
    }

    pub fn set_page_size(&self, page_size: u32) {
        let changed = self.collection.borrow_mut().set_page_size(page_size);
        self.reload_if(changed);
    }

    pub fn set_filter(&self, filter: &str) {
        let changed = self.collection.borrow_mut().set_filter(filter);
        self.reload_if(changed);
    }

    pub fn set_sort(&self, sort: &str) {
        let changed = self.collection.borrow_mut().set_sort(sort);
        self.reload_if(changed);
    }

    fn reload_if(&self, changed: bool) {
        if changed {
            self.reload();
        }
    }
}

fn notify(on_change: &OnChange) {
    if let Some(callback) = on_change.borrow().as_ref() {
        callback();
    }
}
