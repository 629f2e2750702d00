//! Route registration: forwarding proxy, module routes, system endpoints
//! and static files.

use std::path::Path;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::handler::HandlerWithoutStateExt;
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};

use itinerary_upstream::{ApiError, UpstreamGateway};

/// Application shared state.
#[derive(Clone)]
pub struct AppState {
    pub gateway: Arc<UpstreamGateway>,
}

/// Build the complete router with all routes.
pub fn build_router(state: AppState, module_routes: Vec<(&str, Router)>, public_dir: &Path) -> Router {
    let system_routes = Router::new()
        .route("/health", get(health))
        .route("/version", get(version));

    let proxy_routes = Router::new()
        .route("/api/sales_orders", post(proxy_sales_orders))
        .route("/api/get_transaction", post(proxy_transaction))
        .with_state(state);

    let mut app: Router = Router::new()
        .route("/", get(index_page))
        .merge(system_routes)
        .merge(proxy_routes);

    // Mount each module's routes under /{module_name}.
    for (name, router) in module_routes {
        app = app.nest(&format!("/{}", name), router);
    }

    // Static files come after every API route.
    let static_files = ServeDir::new(public_dir)
        .call_fallback_on_method_not_allowed(true)
        .not_found_service(route_not_found.into_service());

    app.fallback_service(static_files)
        .layer(middleware::from_fn(log_request))
        .layer(CorsLayer::permissive())
}

async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let resp = next.run(req).await;
    info!(%method, %uri, status = resp.status().as_u16(), "request");
    resp
}

async fn index_page() -> impl IntoResponse {
    Html(include_str!("web/index.html"))
}

async fn route_not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, "Route not found")
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
    }))
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": "itineraryd",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ---------------------------------------------------------------------------
// Forwarding proxy
// ---------------------------------------------------------------------------

/// Error texts for one relayed endpoint. Browser callers match on these.
struct RelayMessages {
    status_prefix: &'static str,
    invalid_json: &'static str,
    request_failed: &'static str,
}

const SALES_ORDERS: RelayMessages = RelayMessages {
    status_prefix: "API error",
    invalid_json: "Invalid JSON from sales orders API",
    request_failed: "Sales orders API request failed",
};

const TRANSACTION: RelayMessages = RelayMessages {
    status_prefix: "Transaction API error",
    invalid_json: "Invalid JSON from transaction API",
    request_failed: "Transaction API request failed",
};

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(serde_json::json!({ "error": message.into() }))).into_response()
}

/// An absent body counts as `{}`.
fn parse_body(body: &Bytes) -> Result<Value, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(body)
        .map_err(|_| error_body(StatusCode::BAD_REQUEST, "Invalid JSON in request body."))
}

fn relay(result: Result<Value, ApiError>, messages: &RelayMessages) -> Response {
    match result {
        Ok(value) => Json(value).into_response(),
        Err(ApiError::Server { status, .. }) => {
            let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
            error_body(code, format!("{} with status {}", messages.status_prefix, status))
        }
        Err(ApiError::Decode { message, raw }) => {
            error!(error = %message, "{}", messages.invalid_json);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": messages.invalid_json, "raw": raw })),
            )
                .into_response()
        }
        Err(e) => {
            error!(error = %e, "{}", messages.request_failed);
            error_body(StatusCode::INTERNAL_SERVER_ERROR, messages.request_failed)
        }
    }
}

/// POST /api/sales_orders: relay the filter body to the sales-order listing.
async fn proxy_sales_orders(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    relay(state.gateway.list_sales_orders(&payload).await, &SALES_ORDERS)
}

/// POST /api/get_transaction: look up a transaction by `so_pk`.
async fn proxy_transaction(State(state): State<AppState>, body: Bytes) -> Response {
    let payload = match parse_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let so_pk = match payload.get("so_pk") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        _ => return error_body(StatusCode::BAD_REQUEST, "Missing 'so_pk' in request body."),
    };
    relay(state.gateway.get_transaction(&so_pk).await, &TRANSACTION)
}
