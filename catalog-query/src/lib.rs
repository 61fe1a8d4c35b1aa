//! Entity-agnostic query facade: filter, sort, and paginate a plugin's
//! fetched entities according to the uniform contract every entity
//! endpoint exposes (spec.md §4.9).

mod facade;
mod processing;
mod types;

pub use facade::query_entities;
pub use processing::{DocumentFilter, DocumentPaginator, DocumentSorter};
pub use types::{EntityPage, EntityQueryParams, SortOrder};
