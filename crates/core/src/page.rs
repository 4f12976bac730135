//! Page/offset pagination shared by listing operations.

use serde::{Deserialize, Serialize};

/// Requested page (1-based) and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub const DEFAULT_PAGE_SIZE: u32 = 20;
    pub const MAX_PAGE_SIZE: u32 = 100;

    /// Normalize caller input: page >= 1, size within 1..=100.
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page as usize - 1) * self.page_size as usize
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total count across all pages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub page_size: u32,
    pub total_items: u64,
}

impl<T> Page<T> {
    /// Slice an already filtered and ordered result set.
    pub fn from_vec(all: Vec<T>, request: PageRequest) -> Self {
        let total_items = all.len() as u64;
        let items = all
            .into_iter()
            .skip(request.offset())
            .take(request.page_size as usize)
            .collect();
        Self {
            items,
            page: request.page,
            page_size: request.page_size,
            total_items,
        }
    }

    pub fn total_pages(&self) -> u32 {
        if self.total_items == 0 {
            return 0;
        }
        self.total_items.div_ceil(self.page_size as u64) as u32
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            page_size: self.page_size,
            total_items: self.total_items,
        }
    }
}
