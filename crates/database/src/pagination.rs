//! Pagination contract shared by all list queries.
//!
//! Callers supply a 1-based page and a limit that gets clamped to
//! `[MIN_LIMIT, MAX_LIMIT]`. Out of range pages yield an empty data set
//! with correct metadata rather than an error.

use thiserror::Error;

pub const MIN_LIMIT: i64 = 1;
pub const MAX_LIMIT: i64 = 100;
pub const DEFAULT_LIMIT: i64 = 20;

#[derive(Debug, Error, Eq, PartialEq)]
pub enum PageError {
    #[error("page must be >= 1")]
    PageOutOfRange,
    #[error("limit must be >= 1")]
    LimitOutOfRange,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Page {
    page: i64,
    limit: i64,
}

impl Page {
    pub fn new(page: i64, limit: i64) -> Result<Self, PageError> {
        if page < 1 {
            return Err(PageError::PageOutOfRange);
        }
        if limit < MIN_LIMIT {
            return Err(PageError::LimitOutOfRange);
        }
        Ok(Self {
            page,
            limit: limit.min(MAX_LIMIT),
        })
    }

    pub fn page(&self) -> i64 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    /// Saturates instead of overflowing so absurdly large pages simply
    /// select past the end of the table and come back empty.
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.limit)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// One page of results together with the metadata the Query API returns.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Paginated<T> {
    pub fn new(data: Vec<T>, total: i64, page: &Page) -> Self {
        // Ceiling division; total and limit are non-negative.
        let total_pages = (total + page.limit() - 1) / page.limit();
        Self {
            data,
            total,
            page: page.page(),
            limit: page.limit(),
            total_pages,
            has_next: page.page() < total_pages,
            has_prev: page.page() > 1,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            data: self.data.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            limit: self.limit,
            total_pages: self.total_pages,
            has_next: self.has_next,
            has_prev: self.has_prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limit_but_rejects_invalid_input() {
        assert_eq!(Page::new(1, 1000).unwrap().limit(), MAX_LIMIT);
        assert_eq!(Page::new(1, 20).unwrap().limit(), 20);
        assert_eq!(Page::new(0, 20), Err(PageError::PageOutOfRange));
        assert_eq!(Page::new(1, 0), Err(PageError::LimitOutOfRange));
        assert_eq!(Page::new(-3, -1), Err(PageError::PageOutOfRange));
    }

    #[test]
    fn forty_five_rows_at_limit_twenty() {
        let page = Page::new(1, 20).unwrap();
        let result = Paginated::new(vec![0; 20], 45, &page);
        assert_eq!(result.total_pages, 3);
        assert!(result.has_next);
        assert!(!result.has_prev);

        let page = Page::new(3, 20).unwrap();
        let result = Paginated::new(vec![0; 5], 45, &page);
        assert!(!result.has_next);
        assert!(result.has_prev);

        // Out of range pages are empty, not an error.
        let page = Page::new(10, 20).unwrap();
        let result = Paginated::new(Vec::<i32>::new(), 45, &page);
        assert!(result.data.is_empty());
        assert!(!result.has_next);
    }

    #[test]
    fn empty_collection_has_zero_pages() {
        let page = Page::default();
        let result = Paginated::new(Vec::<i32>::new(), 0, &page);
        assert_eq!(result.total_pages, 0);
        assert!(!result.has_next);
        assert!(!result.has_prev);
    }

    #[test]
    fn offset_is_zero_based() {
        assert_eq!(Page::new(1, 20).unwrap().offset(), 0);
        assert_eq!(Page::new(3, 20).unwrap().offset(), 40);
    }

    #[test]
    fn huge_page_numbers_do_not_overflow() {
        let page = Page::new(i64::MAX, 100).unwrap();
        assert_eq!(page.offset(), i64::MAX);

        let result = Paginated::new(Vec::<i32>::new(), 45, &page);
        assert!(result.data.is_empty());
        assert!(!result.has_next);
        assert!(result.has_prev);
    }
}
