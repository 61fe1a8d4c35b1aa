//! Source Collection, Provider Registry, and the per-plugin reload pipeline
//! (spec.md §4.4, §4.5).

mod collection;
mod loader;
mod provider;
mod repository;

pub use collection::SourceCollection;
pub use loader::Loader;
pub use provider::{EntityDraft, Provider, ProviderFactory, ProviderRegistry};
pub use repository::{EntityRepository, UpsertStats};
