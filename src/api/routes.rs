use axum::{
    http::{header, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::analytics::VisitorTracker;

use super::handlers::{
    get_statistics, health_check, track_gallery_view, track_visit, update_duration, AppState,
};

pub fn create_api_router(tracker: Arc<VisitorTracker>) -> Router {
    let state = Arc::new(AppState { tracker });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let api_routes = Router::new()
        .route("/visits", post(track_visit))
        .route("/visits/{id}/duration", post(update_duration))
        .route("/gallery/{image_id}/views", post(track_gallery_view))
        .route("/statistics", get(get_statistics));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
