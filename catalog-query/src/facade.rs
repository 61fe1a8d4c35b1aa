//! Entity-agnostic filter/sort/paginate facade over [`processing`], wired
//! to the uniform query contract of spec.md §4.9.
//!
//! `nextPageToken` is deliberately the simplest well-known shape — an
//! opaque string wrapping a plain offset — rather than a new pagination
//! scheme (spec.md §1 Non-goals).

use serde_json::Value;

use crate::processing::{DocumentFilter, DocumentPaginator, DocumentSorter};
use crate::types::{EntityPage, EntityQueryParams, SortOrder};

const DEFAULT_PAGE_SIZE: usize = 50;
const MAX_PAGE_SIZE: usize = 500;

/// Applies `filterQuery`, `orderBy`/`sortOrder`, and `pageSize`/
/// `nextPageToken` to an already-fetched set of entities serialized as
/// JSON. Plugins fetch their own rows; this crate only shapes the result.
pub fn query_entities(mut entities: Vec<Value>, params: &EntityQueryParams) -> Result<EntityPage<Value>, String> {
    if let Some(filter_query) = params.filter_query.as_deref().filter(|s| !s.is_empty()) {
        let filter: Value = serde_json::from_str(filter_query).map_err(|e| format!("invalid filterQuery: {e}"))?;
        entities = DocumentFilter::filter_documents(entities, &filter);
    }

    if let Some(field) = params.order_by.as_deref().filter(|s| !s.is_empty()) {
        let direction = match params.sort_order.unwrap_or(SortOrder::Asc) {
            SortOrder::Asc => 1,
            SortOrder::Desc => -1,
        };
        let sort_spec = serde_json::json!({ field: direction });
        DocumentSorter::sort_documents(&mut entities, &sort_spec);
    }

    let offset = decode_page_token(params.next_page_token.as_deref())?;
    let page_size = params.page_size.unwrap_or(DEFAULT_PAGE_SIZE).min(MAX_PAGE_SIZE);

    let total = entities.len();
    let page = DocumentPaginator::paginate_documents(entities, Some(offset), Some(page_size));
    let size = page.len();

    let next_page_token = if offset + size < total {
        Some(encode_page_token(offset + size))
    } else {
        None
    };

    Ok(EntityPage {
        items: page,
        size,
        next_page_token,
    })
}

fn encode_page_token(offset: usize) -> String {
    offset.to_string()
}

fn decode_page_token(token: Option<&str>) -> Result<usize, String> {
    match token {
        None => Ok(0),
        Some(t) => t.parse().map_err(|_| format!("invalid nextPageToken: {t:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Vec<Value> {
        vec![
            json!({"name": "c", "rank": 3}),
            json!({"name": "a", "rank": 1}),
            json!({"name": "b", "rank": 2}),
        ]
    }

    #[test]
    fn default_page_size_returns_everything_when_small() {
        let page = query_entities(sample(), &EntityQueryParams::default()).unwrap();
        assert_eq!(page.size, 3);
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn orders_by_requested_field() {
        let params = EntityQueryParams {
            order_by: Some("rank".to_string()),
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        let page = query_entities(sample(), &params).unwrap();
        let names: Vec<_> = page.items.iter().map(|v| v["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn paginates_with_continuation_token() {
        let params = EntityQueryParams {
            page_size: Some(2),
            ..Default::default()
        };
        let first = query_entities(sample(), &params).unwrap();
        assert_eq!(first.size, 2);
        let token = first.next_page_token.expect("more pages remain");

        let params2 = EntityQueryParams {
            page_size: Some(2),
            next_page_token: Some(token),
            ..Default::default()
        };
        let second = query_entities(sample(), &params2).unwrap();
        assert_eq!(second.size, 1);
        assert!(second.next_page_token.is_none());
    }

    #[test]
    fn rejects_malformed_filter_query() {
        let params = EntityQueryParams {
            filter_query: Some("not json".to_string()),
            ..Default::default()
        };
        assert!(query_entities(sample(), &params).is_err());
    }
}
