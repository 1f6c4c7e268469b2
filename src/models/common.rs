//! Shared request/response shapes

use serde::{Deserialize, Serialize};

use crate::utils::helpers::{page_number, total_pages};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Sort direction accepted by list endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    /// Apply the direction to an ascending comparison
    pub fn apply(&self, ordering: std::cmp::Ordering) -> std::cmp::Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// `skip`/`limit` window
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub skip: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageParams {
    pub fn new(skip: i64, limit: i64) -> Self {
        Self { skip, limit }
    }

    /// Reject windows outside `skip >= 0` and `1 <= limit <= 100`
    pub fn validated(self) -> crate::utils::Result<Self> {
        if self.skip < 0 {
            return Err(crate::utils::CulturalCenterError::Validation(
                "skip must be greater than or equal to 0".to_string(),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.limit) {
            return Err(crate::utils::CulturalCenterError::Validation(format!(
                "limit must be between 1 and {}",
                MAX_PAGE_SIZE
            )));
        }
        Ok(self)
    }

    /// Slice an already filtered and sorted collection
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.skip.max(0) as usize)
            .take(self.limit.max(0) as usize)
            .collect()
    }
}

/// Paginated list with page metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        let page = page_number(params.skip, params.limit);
        let pages = total_pages(total, params.limit);
        Self {
            items,
            total,
            page,
            page_size: params.limit,
            total_pages: pages,
            has_next: params.skip + params.limit < total,
            has_previous: params.skip > 0,
        }
    }
}

/// A page of rows plus the unpaginated total, as returned by repositories
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

/// Plain `{message}` body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Result of a bulk admin action
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkActionResult {
    pub message: String,
    pub affected_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paginated_metadata() {
        let page = Paginated::new(vec![1, 2], 45, PageParams::new(20, 20));
        assert_eq!(page.page, 2);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(page.has_previous);
    }

    #[test]
    fn test_page_params_bounds() {
        assert!(PageParams::new(-1, 20).validated().is_err());
        assert!(PageParams::new(0, 0).validated().is_err());
        assert!(PageParams::new(0, 101).validated().is_err());
        assert!(PageParams::new(0, 100).validated().is_ok());
    }
}
