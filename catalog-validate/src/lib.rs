//! The multi-layer source configuration validator (spec.md §4.3) and the
//! `SourceConfig`/`PropertyValue` data model it validates.

mod layers;
mod model;
mod pipeline;
mod redact;
mod result;

pub use layers::{ValidationLayer, ValidationState};
pub use model::{is_sensitive_key, PropertyValue, SecretRef, SourceConfig, SourceOrigin};
pub use pipeline::Validator;
pub use redact::{redact_properties, resolve_properties, EnvSecretResolver, SecretResolver};
pub use result::{Diagnostic, LayerResult, Severity, ValidationResult};
