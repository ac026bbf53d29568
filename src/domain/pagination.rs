//! Offset pagination shared by every listing endpoint.

use crate::validation::Validator;
use serde::Serialize;

/// Largest page number a client may request.
pub const MAX_PAGE: u32 = 10_000_000;

/// Largest page size a client may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Requested page window. Both values are 1-based and validated by [`Filter::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    // ---
    pub page: u32,
    pub page_size: u32,
}

impl Filter {
    // ---
    pub fn new(page: u32, page_size: u32) -> Self {
        // ---
        Self { page, page_size }
    }

    pub fn limit(&self) -> i64 {
        // ---
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        // ---
        i64::from(self.page.saturating_sub(1)) * i64::from(self.page_size)
    }

    pub fn validate(&self, v: &mut Validator) {
        // ---
        v.check(self.page > 0, "page", "must be greater than zero");
        v.check(self.page <= MAX_PAGE, "page", "must be a maximum of 10 million");
        v.check(self.page_size > 0, "page_size", "must be greater than zero");
        v.check(
            self.page_size <= MAX_PAGE_SIZE,
            "page_size",
            "must be a maximum of 100",
        );
    }
}

/// One page of rows plus the total row count across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    // ---
    pub items: Vec<T>,
    pub total_records: u64,
}

impl<T> Page<T> {
    // ---
    pub fn empty() -> Self {
        // ---
        Self {
            items: Vec::new(),
            total_records: 0,
        }
    }
}

/// Pagination envelope returned as `_metadata`. Every field is omitted when the
/// listing is empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    // ---
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: u64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: u64,
}

fn is_zero<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

impl Metadata {
    // ---
    pub fn calculate(total_records: u64, filter: &Filter) -> Self {
        // ---
        if total_records == 0 || filter.page_size == 0 {
            return Self::default();
        }

        Self {
            current_page: filter.page,
            page_size: filter.page_size,
            first_page: 1,
            last_page: total_records.div_ceil(u64::from(filter.page_size)),
            total_records,
        }
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;

    #[test]
    fn offset_and_limit_follow_page_window() {
        // ---
        let filter = Filter::new(3, 20);
        assert_eq!(filter.limit(), 20);
        assert_eq!(filter.offset(), 40);

        assert_eq!(Filter::new(1, 10).offset(), 0);
    }

    #[test]
    fn metadata_rounds_last_page_up() {
        // ---
        let meta = Metadata::calculate(21, &Filter::new(2, 10));
        assert_eq!(meta.current_page, 2);
        assert_eq!(meta.first_page, 1);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.total_records, 21);

        assert_eq!(Metadata::calculate(20, &Filter::new(1, 10)).last_page, 2);
        assert_eq!(Metadata::calculate(1, &Filter::new(1, 100)).last_page, 1);
    }

    #[test]
    fn empty_listing_yields_empty_metadata() {
        // ---
        let meta = Metadata::calculate(0, &Filter::new(4, 10));
        assert_eq!(meta, Metadata::default());
        assert_eq!(serde_json::to_value(&meta).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn filter_bounds_are_validated() {
        // ---
        let mut v = Validator::new();
        Filter::new(0, 101).validate(&mut v);
        assert!(!v.valid());
        assert!(v.errors().contains_key("page"));
        assert!(v.errors().contains_key("page_size"));

        let mut v = Validator::new();
        Filter::new(MAX_PAGE, MAX_PAGE_SIZE).validate(&mut v);
        assert!(v.valid());
    }
}
