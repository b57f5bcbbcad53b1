//! Data models and DTOs (Data Transfer Objects)
//!
//! Contains the generic response structures used by the API.

use serde::Serialize;

/// Generic success response
#[derive(Serialize)]
pub struct SuccessResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> SuccessResponse<T> {
    pub fn with_data(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }

    pub fn message_only(message: impl Into<String>) -> SuccessResponse<()> {
        SuccessResponse {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Pagination metadata returned alongside paginated collections
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub current_page: usize,
    pub last_page: usize,
    pub per_page: usize,
    pub total: usize,
}

impl PaginationMeta {
    pub fn new(current_page: usize, per_page: usize, total: usize) -> Self {
        let last_page = if total == 0 {
            1
        } else {
            total.div_ceil(per_page.max(1))
        };
        Self {
            current_page,
            last_page,
            per_page,
            total,
        }
    }
}

/// Slice a full result set down to one page.
pub fn paginate<T: Clone>(items: &[T], page: usize, per_page: usize) -> (Vec<T>, PaginationMeta) {
    let page = page.max(1);
    let per_page = per_page.max(1);
    let meta = PaginationMeta::new(page, per_page, items.len());
    let start = (page - 1) * per_page;
    let slice = if start >= items.len() {
        Vec::new()
    } else {
        items[start..(start + per_page).min(items.len())].to_vec()
    };
    (slice, meta)
}

/// Default page size for proposal listings
pub const DEFAULT_PER_PAGE: usize = 15;

/// Default number of proposals in the top-rated listing
pub const DEFAULT_TOP_RATED_LIMIT: usize = 10;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_pagination_meta() {
        let meta = PaginationMeta::new(1, 15, 31);
        assert_eq!(meta.last_page, 3);
        assert_eq!(meta.total, 31);
    }

    #[test]
    fn test_paginate_slices() {
        let items: Vec<u32> = (0..7).collect();
        let (page, meta) = paginate(&items, 2, 3);
        assert_eq!(page, vec![3, 4, 5]);
        assert_eq!(meta.last_page, 3);

        let (page, _) = paginate(&items, 4, 3);
        assert!(page.is_empty());
    }

    #[test]
    fn test_paginate_empty() {
        let items: Vec<u32> = Vec::new();
        let (page, meta) = paginate(&items, 1, 15);
        assert!(page.is_empty());
        assert_eq!(meta.last_page, 1);
    }
}
