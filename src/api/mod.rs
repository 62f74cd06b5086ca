//! HTTP boundary.

pub mod errors;
pub mod extract;
pub mod orders;
pub mod products;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::services::Services;

#[derive(Clone)]
pub struct AppState {
    pub services: Services,
}

pub fn router(services: Services) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(json!({"status": "healthy", "service": "storefront-orders"})) }))
        .route("/api/orders", get(orders::list).post(orders::create))
        .route("/api/orders/:id", axum::routing::put(orders::update).delete(orders::delete))
        .route("/api/products", get(products::list).post(products::create))
        .route("/api/products/:id", get(products::get).put(products::update).delete(products::delete))
        .route("/api/seed-products", axum::routing::post(products::seed))
        .layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
        .with_state(AppState { services })
}
