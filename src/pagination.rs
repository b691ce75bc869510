//! Page / filter / sort state for server-paged lists.

use crate::constants::{DEFAULT_PAGE_SIZE, DEFAULT_SORT, FILTER_ALL};

/// Inputs of one paginated fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
    pub filter: String,
    pub sort: String,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_SIZE,
            offset: 0,
            filter: FILTER_ALL.to_string(),
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl PageRequest {
    /// Query parameters to send. `filter` and `sort` are left out while
    /// they hold their defaults.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("limit", self.limit.to_string()),
            ("offset", self.offset.to_string()),
        ];
        if !self.filter.is_empty() && self.filter != FILTER_ALL {
            pairs.push(("filter", self.filter.clone()));
        }
        if !self.sort.is_empty() && self.sort != DEFAULT_SORT {
            pairs.push(("sort", self.sort.clone()));
        }
        pairs
    }

    pub fn query_string(&self) -> String {
        self.query_pairs()
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// List screen pagination state. Pages are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct Pagination {
    current_page: u32,
    page_size: u32,
    filter: String,
    sort: String,
    total: Option<u64>,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
            filter: FILTER_ALL.to_string(),
            sort: DEFAULT_SORT.to_string(),
            total: None,
        }
    }

    pub fn current_page(&self) -> u32 {
        self.current_page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn sort(&self) -> &str {
        &self.sort
    }

    pub fn total(&self) -> Option<u64> {
        self.total
    }

    pub fn offset(&self) -> u32 {
        (self.current_page - 1).saturating_mul(self.page_size)
    }

    pub fn to_request(&self) -> PageRequest {
        PageRequest {
            limit: self.page_size,
            offset: self.offset(),
            filter: self.filter.clone(),
            sort: self.sort.clone(),
        }
    }

    /// At least 1, even for an empty collection.
    pub fn total_pages(&self) -> u32 {
        match self.total {
            Some(total) if total > 0 => {
                let pages = total.div_ceil(u64::from(self.page_size));
                u32::try_from(pages).unwrap_or(u32::MAX)
            }
            _ => 1,
        }
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self) -> bool {
        self.total.is_some() && self.current_page < self.total_pages()
    }

    /// Record the server-reported total for the current filter.
    pub fn set_total(&mut self, total: u64) {
        self.total = Some(total);
    }

    /// Move to `page`, clamped to the known page range. Returns whether the
    /// page changed.
    pub fn go_to_page(&mut self, page: u32) -> bool {
        let upper = if self.total.is_some() {
            self.total_pages()
        } else {
            u32::MAX
        };
        let page = page.clamp(1, upper);
        let changed = page != self.current_page;
        self.current_page = page;
        changed
    }

    pub fn next_page(&mut self) -> bool {
        self.has_next() && self.go_to_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        self.has_previous() && self.go_to_page(self.current_page - 1)
    }

    /// Change the page size, keeping the first item of the current page
    /// visible: `floor(old_offset / new_size) + 1`.
    pub fn set_page_size(&mut self, page_size: u32) -> bool {
        let page_size = page_size.max(1);
        if page_size == self.page_size {
            return false;
        }
        let old_offset = self.offset();
        self.page_size = page_size;
        self.current_page = old_offset / page_size + 1;
        true
    }

    /// Change the page size and return to the first page.
    pub fn reset_page_size(&mut self, page_size: u32) -> bool {
        let changed = page_size.max(1) != self.page_size || self.current_page != 1;
        self.page_size = page_size.max(1);
        self.current_page = 1;
        changed
    }

    /// New filter; always back to page 1 so the page cannot fall out of range.
    pub fn set_filter(&mut self, filter: impl Into<String>) -> bool {
        let filter = filter.into();
        let filter = if filter.trim().is_empty() {
            FILTER_ALL.to_string()
        } else {
            filter
        };
        let changed = filter != self.filter || self.current_page != 1;
        self.filter = filter;
        self.current_page = 1;
        self.total = None;
        changed
    }

    pub fn set_sort(&mut self, sort: impl Into<String>) -> bool {
        let sort = sort.into();
        let sort = if sort.trim().is_empty() {
            DEFAULT_SORT.to_string()
        } else {
            sort
        };
        let changed = sort != self.sort || self.current_page != 1;
        self.sort = sort;
        self.current_page = 1;
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_request_sends_only_limit_and_offset() {
        assert_eq!(PageRequest::default().query_string(), "limit=20&offset=0");
    }

    #[test]
    fn non_default_filter_and_sort_are_encoded() {
        let request = PageRequest {
            limit: 10,
            offset: 30,
            filter: "fire & ice".into(),
            sort: "name".into(),
        };
        assert_eq!(
            request.query_string(),
            "limit=10&offset=30&filter=fire%20%26%20ice&sort=name"
        );
    }

    #[test]
    fn offset_is_derived_from_page() {
        let mut pagination = Pagination::new(10);
        pagination.go_to_page(3);
        assert_eq!(pagination.offset(), 20);
        assert_eq!(pagination.to_request().offset, 20);
    }

    #[test]
    fn growing_page_size_reanchors_to_first_visible_item() {
        let mut pagination = Pagination::new(10);
        pagination.go_to_page(3);
        assert!(pagination.set_page_size(25));
        assert_eq!(pagination.current_page(), 1);
    }

    #[test]
    fn shrinking_page_size_reanchors_forward() {
        let mut pagination = Pagination::new(10);
        pagination.go_to_page(3);
        pagination.set_page_size(5);
        assert_eq!(pagination.current_page(), 5);
        assert_eq!(pagination.offset(), 20);
    }

    #[test]
    fn reset_page_size_returns_to_first_page() {
        let mut pagination = Pagination::new(10);
        pagination.go_to_page(4);
        pagination.reset_page_size(50);
        assert_eq!(pagination.current_page(), 1);
        assert_eq!(pagination.page_size(), 50);
    }

    #[test]
    fn filter_and_sort_changes_reset_to_page_one() {
        let mut pagination = Pagination::new(10);
        pagination.set_total(100);
        pagination.go_to_page(7);
        assert!(pagination.set_filter("legendary"));
        assert_eq!(pagination.current_page(), 1);
        assert_eq!(pagination.total(), None);

        pagination.go_to_page(2);
        assert!(pagination.set_sort("name"));
        assert_eq!(pagination.current_page(), 1);

        pagination.set_filter("");
        assert_eq!(pagination.filter(), FILTER_ALL);
    }

    #[test]
    fn navigation_is_clamped_to_known_pages() {
        let mut pagination = Pagination::new(10);
        pagination.set_total(25);
        assert_eq!(pagination.total_pages(), 3);
        pagination.go_to_page(9);
        assert_eq!(pagination.current_page(), 3);
        assert!(!pagination.next_page());
        assert!(pagination.previous_page());
        assert_eq!(pagination.current_page(), 2);
        pagination.go_to_page(0);
        assert_eq!(pagination.current_page(), 1);
    }

    #[test]
    fn empty_collection_still_has_one_page() {
        let mut pagination = Pagination::new(10);
        pagination.set_total(0);
        assert_eq!(pagination.total_pages(), 1);
        assert!(!pagination.has_next());
    }

    proptest! {
        #[test]
        fn page_size_change_keeps_first_item_visible(
            old_size in 1u32..100,
            page in 1u32..50,
            new_size in 1u32..100,
        ) {
            let mut pagination = Pagination::new(old_size);
            pagination.go_to_page(page);
            let first_item = pagination.offset();
            pagination.set_page_size(new_size);
            prop_assert_eq!(pagination.current_page(), first_item / new_size + 1);
            prop_assert!(pagination.offset() <= first_item);
            prop_assert!(first_item < pagination.offset() + new_size);
        }
    }
}
