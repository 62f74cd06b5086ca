use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::extract::{parse_id, ApiJson};
use crate::api::AppState;
use crate::domain::aggregates::ProductDraft;
use crate::identity::Caller;
use crate::services::seed::sample_catalog;
use crate::Result;

/// `featured` is a string flag; only `true` filters.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub featured: Option<String>,
}

pub async fn list(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> Result<impl IntoResponse> {
    let featured_only = q.featured.as_deref() == Some("true");
    let products = s.services.catalog.list(featured_only).await?;
    Ok(Json(json!({ "success": true, "products": products })))
}

pub async fn get(State(s): State<AppState>, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let product = s.services.catalog.get(parse_id(&id, "product")?).await?;
    Ok(Json(json!({ "success": true, "product": product })))
}

pub async fn create(State(s): State<AppState>, caller: Caller, ApiJson(draft): ApiJson<ProductDraft>) -> Result<impl IntoResponse> {
    let grant = caller.admin()?;
    let product = s.services.catalog.create(&grant, draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "product": product }))))
}

pub async fn update(State(s): State<AppState>, caller: Caller, Path(id): Path<String>, ApiJson(draft): ApiJson<ProductDraft>) -> Result<impl IntoResponse> {
    let grant = caller.admin()?;
    let product = s.services.catalog.update(&grant, parse_id(&id, "product")?, draft).await?;
    Ok(Json(json!({ "success": true, "product": product })))
}

pub async fn delete(State(s): State<AppState>, caller: Caller, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let grant = caller.admin()?;
    s.services.catalog.delete(&grant, parse_id(&id, "product")?).await?;
    Ok(Json(json!({ "success": true, "message": "Product deleted successfully" })))
}

/// Replaces the catalog with the demo products.
pub async fn seed(State(s): State<AppState>, caller: Caller) -> Result<impl IntoResponse> {
    let grant = caller.admin()?;
    let products = s.services.catalog.seed(&grant, sample_catalog()).await?;
    Ok(Json(json!({ "success": true, "message": format!("{} products seeded successfully", products.len()), "products": products })))
}
