//! Cursor pagination aggregation
//!
//! The Courier API returns collections one page at a time, with an opaque
//! "next" URL in the page's links. [`paginate_all`] follows that cursor until
//! the collection is exhausted and concatenates the items in order.
//!
//! Aggregation is strictly sequential (the next cursor is only known once the
//! current page is fetched) and all-or-nothing: a fetch failure at any page
//! boundary discards everything and surfaces the error. A page whose next
//! cursor equals the cursor it was fetched with violates the server contract
//! and fails fast instead of looping forever.

use crate::client::ApiError;
use serde::Deserialize;
use std::future::Future;
use thiserror::Error;

/// Pagination errors
#[derive(Error, Debug)]
pub enum PaginationError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("pagination cursor did not advance: {cursor}")]
    CursorLoop { cursor: String },
}

/// A cursor-paginated response: items plus an optional next cursor.
///
/// Once the next cursor is absent (or empty), the page is final. Item order
/// within and across pages is preserved.
pub trait Paginated {
    type Item;

    /// Move this page's items out, leaving the page's metadata intact.
    fn take_items(&mut self) -> Vec<Self::Item>;

    /// The cursor of the next page, if any. Empty strings count as absent.
    fn next_cursor(&self) -> Option<&str>;
}

/// Generic page as the Courier API serializes it.
#[derive(Debug, Clone, Deserialize)]
pub struct Page<T> {
    #[serde(default)]
    pub data: Vec<T>,
    #[serde(default)]
    pub links: PageLinks,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageLinks {
    #[serde(rename = "self", default)]
    pub this: Option<String>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageMeta {
    #[serde(default)]
    pub paging: Option<Paging>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl<T> Paginated for Page<T> {
    type Item = T;

    fn take_items(&mut self) -> Vec<T> {
        std::mem::take(&mut self.data)
    }

    fn next_cursor(&self) -> Option<&str> {
        self.links.next.as_deref().filter(|s| !s.is_empty())
    }
}

/// Follow the next cursor from an already-fetched first page until the
/// collection is exhausted.
///
/// Returns every item in original order together with the final page (whose
/// links and meta describe the end of the collection). Fails with whatever
/// error `fetch` raises at the page boundary where it occurred; pages
/// aggregated so far are discarded.
pub async fn paginate_all<P, F, Fut>(first: P, mut fetch: F) -> Result<(Vec<P::Item>, P), PaginationError>
where
    P: Paginated,
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<P, ApiError>>,
{
    let mut page = first;
    let mut items = page.take_items();
    let mut pages_fetched = 0u64;

    while let Some(cursor) = page.next_cursor().map(str::to_owned) {
        let mut next = fetch(cursor.clone()).await?;
        if next.next_cursor() == Some(cursor.as_str()) {
            return Err(PaginationError::CursorLoop { cursor });
        }

        items.extend(next.take_items());
        page = next;
        pages_fetched += 1;
    }

    tracing::debug!(
        pages = pages_fetched + 1,
        items = items.len(),
        "pagination exhausted"
    );
    Ok((items, page))
}
