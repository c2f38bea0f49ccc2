use crate::config::PaginationConfig;
use serde::{Deserialize, Serialize};

/// A resolved, clamped page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// 1-based.
    pub page: u64,
    pub per_page: u64,
}

impl PageRequest {
    /// Missing values fall back to `default_size`; the page size is clamped to
    /// `1..=config.max_page_size`. The page number is at least 1 and at most
    /// [`Self::last_addressable_page`], so the row offset always fits an `i64`.
    pub fn resolve(
        page: Option<u64>,
        per_page: Option<u64>,
        default_size: u64,
        config: &PaginationConfig,
    ) -> Self {
        let per_page = per_page
            .unwrap_or(default_size)
            .clamp(1, config.max_page_size.max(1));
        PageRequest {
            page: page
                .unwrap_or(1)
                .clamp(1, Self::last_addressable_page(per_page)),
            per_page,
        }
    }

    /// Highest page whose offset `(page - 1) * per_page` stays within `i64::MAX`.
    pub fn last_addressable_page(per_page: u64) -> u64 {
        (i64::MAX as u64) / per_page.max(1)
    }
}

/// Uniform pagination envelope attached to every list response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u64,
    pub pages: u64,
    pub per_page: u64,
    pub total: u64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(request: PageRequest, total: u64) -> Self {
        let pages = total.div_ceil(request.per_page);
        Pagination {
            page: request.page,
            pages,
            per_page: request.per_page,
            total,
            has_next: request.page < pages,
            has_prev: request.page > 1,
        }
    }
}

/// One page of results plus its envelope.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}
