//! Identity extraction and authorization for the catalog host's management
//! surface (spec.md §4.10). Axum wiring — pulling headers off the request,
//! adapting them to [`HeaderSource`], and attaching the resolved
//! [`Identity`] to request extensions — lives in `catalog-api`; this crate
//! only contracts the policy.

mod authz;
mod identity;

pub use authz::{authorizer_for, Authorizer, NoneAuthorizer, ResourceRef, SarAuthorizer, Verb};
pub use identity::{
    extractor_for, HeaderIdentityExtractor, HeaderSource, Identity, IdentityExtractor, JwtIdentityExtractor,
};
