pub mod analytics;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::core::analytics::AnalyticsEngine;

pub struct AppState {
    pub engine: AnalyticsEngine,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/health", get(analytics::health_check))
        .route("/analytics/analytics", post(analytics::run_analytics))
        .route("/analytics/schema", get(analytics::get_schema))
        .route("/analytics/schema/refresh", post(analytics::refresh_schema))
        .route("/analytics/query", post(analytics::raw_query))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
