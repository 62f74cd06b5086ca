use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use crate::api::extract::{parse_id, ApiJson};
use crate::api::AppState;
use crate::identity::Caller;
use crate::services::{OrderPatch, PlaceOrder};
use crate::Result;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub user_id: Option<String>,
}

pub async fn list(State(s): State<AppState>, caller: Caller, Query(q): Query<OrderQuery>) -> Result<impl IntoResponse> {
    let user_id = q.user_id.filter(|id| !id.trim().is_empty());
    let orders = s.services.lifecycle.list_orders(&caller, user_id).await?;
    Ok(Json(json!({ "success": true, "orders": orders })))
}

pub async fn create(State(s): State<AppState>, caller: Caller, ApiJson(request): ApiJson<PlaceOrder>) -> Result<impl IntoResponse> {
    let order = s.services.reservations.place_order(&caller, request).await?;
    Ok((StatusCode::CREATED, Json(json!({ "success": true, "order": order }))))
}

pub async fn update(State(s): State<AppState>, caller: Caller, Path(id): Path<String>, ApiJson(patch): ApiJson<OrderPatch>) -> Result<impl IntoResponse> {
    let grant = caller.admin()?;
    let id = parse_id(&id, "order")?;
    let order = s.services.lifecycle.update_order(&grant, id, patch).await?;
    Ok(Json(json!({ "success": true, "order": order })))
}

pub async fn delete(State(s): State<AppState>, caller: Caller, Path(id): Path<String>) -> Result<impl IntoResponse> {
    let grant = caller.admin()?;
    let id = parse_id(&id, "order")?;
    let deletion = s.services.lifecycle.delete_order(&grant, id).await?;
    Ok(Json(json!({ "success": true, "message": "Order deleted successfully", "stockRestored": deletion.stock_restored() })))
}
