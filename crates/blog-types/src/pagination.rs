//! Pagination envelope for API-facing collaborators.

use serde::{Deserialize, Serialize};

/// Navigation links of a page; `next`/`prev` are `null` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
    #[serde(rename = "self")]
    pub self_link: String,
    pub next: Option<String>,
    pub prev: Option<String>,
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_pages: u64,
    pub total_items: u64,
    pub page: u64,
    pub per_page: u64,
    pub links: PageLinks,
}

impl<T> Page<T> {
    /// Build the envelope. Links are `{endpoint}?page=N&per_page=M`.
    ///
    /// `page` and `per_page` below 1 are treated as 1.
    pub fn new(items: Vec<T>, total_items: u64, page: u64, per_page: u64, endpoint: &str) -> Self {
        let page = page.max(1);
        let per_page = per_page.max(1);
        let total_pages = total_items.div_ceil(per_page);

        let link = |p: u64| format!("{}?page={}&per_page={}", endpoint, p, per_page);
        let links = PageLinks {
            self_link: link(page),
            next: (page < total_pages).then(|| link(page + 1)),
            prev: (page > 1).then(|| link(page - 1)),
        };

        Self {
            items,
            total_pages,
            total_items,
            page,
            per_page,
            links,
        }
    }

    /// Transform the items, keeping the envelope.
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_pages: self.total_pages,
            total_items: self.total_items,
            page: self.page,
            per_page: self.per_page,
            links: self.links,
        }
    }
}
