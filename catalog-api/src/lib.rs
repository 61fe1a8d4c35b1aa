//! HTTP surface for the catalog host: mounts every registered plugin's own
//! entity routes alongside a generic management surface derived from its
//! capability accessors, plus the server-wide plugin/health routes
//! (spec.md §4.9).

mod auth;
mod context;
mod error;
mod management;
mod server_routes;

pub use context::ApiContext;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tracing::info;

/// Assembles the full axum `Router` for one process: every plugin's own
/// routes at `{basePath}`, its management surface at
/// `{basePath}/management`, and the server-wide routes. Called once
/// `lifecycle.start_all()` has already driven every plugin through
/// `Routed`/`Running` (or `Disabled`) — this function only mounts handlers,
/// it does not touch plugin lifecycle state.
pub fn build_router(ctx: Arc<ApiContext>) -> Router {
    let mut router = server_routes::router(ctx.clone());

    for plugin in ctx.registry.all() {
        let descriptor = plugin.descriptor();

        let plugin_routes = *plugin
            .register_routes()
            .downcast::<Router>()
            .expect("register_routes() must return an axum::Router");

        let management_routes = management::router(ctx.clone(), plugin.clone());

        router = router
            .nest(&descriptor.base_path, plugin_routes)
            .nest(&format!("{}/management", descriptor.base_path), management_routes);

        info!(plugin = %descriptor.name, base_path = %descriptor.base_path, "mounted plugin routes");
    }

    if ctx.config.server.cors_enabled {
        router = router.layer(CorsLayer::permissive());
    }

    router
}
