use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};

use itinerary_core::ServiceError;

use crate::model::SearchQuery;
use crate::picker::{batches, DEFAULT_BATCH_SIZE};
use crate::sheets::ItineraryService;

type ServiceState = Arc<ItineraryService>;

pub fn router(service: Arc<ItineraryService>) -> Router {
    Router::new()
        .route("/sales-orders", get(search_orders))
        .route("/sales-orders/@refresh", post(refresh_orders))
        .with_state(service)
}

/// GET /sales-orders?q=&page=: picker search, loads the listing on first use.
async fn search_orders(
    State(service): State<ServiceState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let orders = service.search_orders(&query.q).await?;
    let page: &[_] = match query.page {
        Some(n) => batches(&orders, DEFAULT_BATCH_SIZE).nth(n).unwrap_or_default(),
        None => &orders,
    };
    let items: Vec<serde_json::Value> = page
        .iter()
        .map(|o| {
            serde_json::json!({
                "orderKey": o.order_key,
                "primaryKey": o.primary_key,
                "customerName": o.customer_name,
                "label": o.label(),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({
        "total": orders.len(),
        "items": items,
    })))
}

/// POST /sales-orders/@refresh: drop the cached listing and fetch it again.
async fn refresh_orders(
    State(service): State<ServiceState>,
) -> Result<Json<serde_json::Value>, ServiceError> {
    let total = service.refresh_orders().await?;
    Ok(Json(serde_json::json!({ "total": total })))
}
