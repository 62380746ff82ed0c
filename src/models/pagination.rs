use serde::{Deserialize, Serialize};

use super::{ServiceError, ServiceResult};

/// Query string for paginated listings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub search: Option<String>,
}

/// One page of an ordered listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: usize,
    pub page: u32,
    pub page_size: u32,
    pub num_pages: u32,
}

impl<T> Page<T> {
    /// Slice a fully ordered listing into the requested 1-based page.
    ///
    /// Page 0 and pages past the end are rejected, except page 1 of an
    /// empty listing which yields an empty page.
    pub fn paginate(items: Vec<T>, page: u32, page_size: u32) -> ServiceResult<Self> {
        let page_size = page_size.max(1);
        let total_count = items.len();
        let num_pages = check_page(page, total_count, page_size)?;

        let start = ((page - 1) * page_size) as usize;
        let items = items
            .into_iter()
            .skip(start)
            .take(page_size as usize)
            .collect();

        Ok(Self {
            items,
            total_count,
            page,
            page_size,
            num_pages,
        })
    }

    pub fn has_next(&self) -> bool {
        self.page < self.num_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            page: self.page,
            page_size: self.page_size,
            num_pages: self.num_pages,
        }
    }
}

/// Number of pages of a listing, or `InvalidPage` when `page` is not one of them.
/// An empty listing still has a first page.
pub fn check_page(page: u32, total_count: usize, page_size: u32) -> ServiceResult<u32> {
    let num_pages = (total_count as u32).div_ceil(page_size.max(1)).max(1);
    if page == 0 || page > num_pages {
        return Err(ServiceError::InvalidPage { page });
    }
    Ok(num_pages)
}

/// Trimmed search term, `None` when blank
pub fn normalize_search(search: Option<String>) -> Option<String> {
    search
        .map(|term| term.trim().to_string())
        .filter(|term| !term.is_empty())
}
