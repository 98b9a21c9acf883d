//! HTTP surface: document management, ranking, mapping and chat.

pub mod auth;
pub mod errors;
pub mod handlers;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use self::handlers::AppState;

/// Largest accepted PDF upload
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Build the router. Everything except health, chat and the chat PDF needs basic auth.
pub fn create_router(state: AppState) -> Router {
    let admin = Router::new()
        .route(
            "/documents",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route(
            "/documents/upload",
            post(handlers::upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/documents/:id", delete(handlers::delete_document))
        .route("/documents/:id/pdf", get(handlers::document_pdf))
        .route("/rank", post(handlers::rank_documents))
        .route("/map-sources", post(handlers::map_sources))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_basic_auth,
        ));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/chat", post(handlers::chat))
        .route("/pdf", get(handlers::chat_pdf))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
