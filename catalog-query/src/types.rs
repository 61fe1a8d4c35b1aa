//! Uniform entity query request/response shapes (spec.md §4.9: every
//! plugin-defined entity endpoint accepts `pageSize`, `nextPageToken`,
//! `filterQuery`, `orderBy`, `sortOrder` and returns `{items[], size,
//! nextPageToken?}`).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query parameters as they arrive over HTTP. `filter_query` is a
/// MongoDB-style filter document encoded as a JSON string — reusing the
/// well-known pattern already in this codebase rather than inventing a new
/// filter language (spec.md §1 Non-goals).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityQueryParams {
    pub page_size: Option<usize>,
    pub next_page_token: Option<String>,
    pub filter_query: Option<String>,
    pub order_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityPage<T> {
    pub items: Vec<T>,
    pub size: usize,
    pub next_page_token: Option<String>,
}
