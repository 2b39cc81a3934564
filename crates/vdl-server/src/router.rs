use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler;
use crate::state::AppState;

/// Build the axum router for the full gateway surface.
///
/// Document ids are single path segments here; an id containing `/` is
/// storable through sync but not addressable over this API.
pub fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/_data", get(handler::list_docs))
        .route(
            "/_data/:doc",
            get(handler::doc_history).post(handler::create_doc),
        )
        .route(
            "/_data/:doc/:version",
            get(handler::read_version)
                .post(handler::update_version)
                .delete(handler::delete_version),
        )
        .route("/_files/:doc", get(handler::latest_file))
        .route(
            "/_sync",
            get(handler::sync_export).post(handler::sync_pull),
        )
        .fallback(handler::not_found)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
