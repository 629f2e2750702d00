use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Html;
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};

use itinerary_core::ServiceError;

use crate::model::{DeleteQuery, SelectRequest};
use crate::sheets::{ItineraryService, SheetView};
use crate::table::{RowId, RowPatch};

type ServiceState = Arc<ItineraryService>;

pub fn router(service: Arc<ItineraryService>) -> Router {
    Router::new()
        .route("/sheets", post(create_sheet))
        .route("/sheets/{id}", get(get_sheet).delete(delete_sheet))
        .route("/sheets/{id}/rows", post(add_row))
        .route("/sheets/{id}/rows/{row}", patch(edit_row).delete(delete_row))
        .route("/sheets/{id}/rows/{row}/@select", post(select_order))
        .route("/sheets/{id}/rows/{row}/@clear", post(clear_row))
        .route("/sheets/{id}/blocks/{row}", delete(delete_block))
        .route("/sheets/{id}/print/itinerary", get(print_itinerary))
        .route("/sheets/{id}/print/pos", get(print_pos))
        .with_state(service)
}

// ---------------------------------------------------------------------------
// POST /sheets
// ---------------------------------------------------------------------------

async fn create_sheet(State(service): State<ServiceState>) -> Json<SheetView> {
    Json(service.create_sheet().await)
}

// ---------------------------------------------------------------------------
// GET /sheets/:id
// ---------------------------------------------------------------------------

async fn get_sheet(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<SheetView>, ServiceError> {
    Ok(Json(service.snapshot(&id).await?))
}

// ---------------------------------------------------------------------------
// DELETE /sheets/:id
// ---------------------------------------------------------------------------

async fn delete_sheet(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    service.delete_sheet(&id).await?;
    Ok(Json(serde_json::json!({ "deleted": id })))
}

// ---------------------------------------------------------------------------
// POST /sheets/:id/rows
// ---------------------------------------------------------------------------

async fn add_row(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let row = service.add_row(&id).await?;
    let sheet = service.snapshot(&id).await?;
    Ok(Json(serde_json::json!({
        "rowId": row,
        "sheet": sheet,
    })))
}

// ---------------------------------------------------------------------------
// PATCH /sheets/:id/rows/:row
// ---------------------------------------------------------------------------

async fn edit_row(
    State(service): State<ServiceState>,
    Path((id, row)): Path<(String, RowId)>,
    Json(patch): Json<RowPatch>,
) -> Result<Json<SheetView>, ServiceError> {
    service.edit_row(&id, row, &patch).await?;
    Ok(Json(service.snapshot(&id).await?))
}

// ---------------------------------------------------------------------------
// DELETE /sheets/:id/rows/:row
// ---------------------------------------------------------------------------

async fn delete_row(
    State(service): State<ServiceState>,
    Path((id, row)): Path<(String, RowId)>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let outcome = service.delete_row(&id, row, query.confirm).await?;
    let sheet = service.snapshot(&id).await?;
    Ok(Json(serde_json::json!({
        "outcome": outcome,
        "sheet": sheet,
    })))
}

// ---------------------------------------------------------------------------
// POST /sheets/:id/rows/:row/@select
// ---------------------------------------------------------------------------

async fn select_order(
    State(service): State<ServiceState>,
    Path((id, row)): Path<(String, RowId)>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let outcome = service.select_order(&id, row, &req.order_key).await?;
    let sheet = service.snapshot(&id).await?;
    Ok(Json(serde_json::json!({
        "outcome": outcome,
        "sheet": sheet,
    })))
}

// ---------------------------------------------------------------------------
// POST /sheets/:id/rows/:row/@clear
// ---------------------------------------------------------------------------

async fn clear_row(
    State(service): State<ServiceState>,
    Path((id, row)): Path<(String, RowId)>,
) -> Result<Json<SheetView>, ServiceError> {
    service.clear_row(&id, row).await?;
    Ok(Json(service.snapshot(&id).await?))
}

// ---------------------------------------------------------------------------
// DELETE /sheets/:id/blocks/:row
// ---------------------------------------------------------------------------

async fn delete_block(
    State(service): State<ServiceState>,
    Path((id, row)): Path<(String, RowId)>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let removed = service.delete_block(&id, row).await?;
    let sheet = service.snapshot(&id).await?;
    Ok(Json(serde_json::json!({
        "removed": removed.len(),
        "sheet": sheet,
    })))
}

// ---------------------------------------------------------------------------
// GET /sheets/:id/print/*
// ---------------------------------------------------------------------------

async fn print_itinerary(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ServiceError> {
    Ok(Html(service.print_itinerary(&id).await?))
}

async fn print_pos(
    State(service): State<ServiceState>,
    Path(id): Path<String>,
) -> Result<Html<String>, ServiceError> {
    Ok(Html(service.print_pos(&id).await?))
}
