//! Upstream Gateway: forwards the two request shapes the itinerary needs
//! to the ERP and hands back the JSON it answered with.

use std::sync::Arc;

use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use crate::error::ApiError;
use crate::token::TokenSource;
use crate::wire;

/// Default path of the sales-order list endpoint.
pub const SALES_ORDERS_PATH: &str = "/api/get_sales_orders";
/// Default path of the transaction detail endpoint.
pub const TRANSACTION_PATH: &str = "/api/get_transaction";

/// Stateless forwarder to the ERP API.
///
/// Each endpoint carries its own credential: the upstream issues separate
/// tokens for the sales-order listing and the transaction lookup.
pub struct UpstreamGateway {
    http: reqwest::Client,
    base_url: String,
    sales_orders_path: String,
    transaction_path: String,
    sales_orders_auth: Arc<dyn TokenSource>,
    transaction_auth: Arc<dyn TokenSource>,
}

impl UpstreamGateway {
    pub fn new(
        base_url: impl Into<String>,
        sales_orders_auth: Arc<dyn TokenSource>,
        transaction_auth: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            sales_orders_path: SALES_ORDERS_PATH.to_string(),
            transaction_path: TRANSACTION_PATH.to_string(),
            sales_orders_auth,
            transaction_auth,
        }
    }

    /// Override the endpoint paths (both relative to the base URL).
    pub fn with_paths(
        mut self,
        sales_orders_path: impl Into<String>,
        transaction_path: impl Into<String>,
    ) -> Self {
        self.sales_orders_path = sales_orders_path.into();
        self.transaction_path = transaction_path.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// List sales orders. `filter` is relayed to the upstream unchanged.
    pub async fn list_sales_orders(&self, filter: &Value) -> Result<Value, ApiError> {
        self.post_json(&self.sales_orders_path, self.sales_orders_auth.as_ref(), filter)
            .await
    }

    /// Fetch a sales order's transaction detail (customer, contact, jobs).
    pub async fn get_transaction(&self, so_pk: &str) -> Result<Value, ApiError> {
        if so_pk.is_empty() {
            return Err(ApiError::MissingKey("sales order has no so_pk".to_string()));
        }
        let query = wire::transaction_query(so_pk);
        self.post_json(&self.transaction_path, self.transaction_auth.as_ref(), &query)
            .await
    }

    async fn post_json(
        &self,
        path: &str,
        auth: &dyn TokenSource,
        body: &Value,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.post(&url).json(body);
        if let Some(value) = auth.authorization().await? {
            req = req.header(AUTHORIZATION, value);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(%url, status = status.as_u16(), "upstream returned error status");
            return Err(ApiError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode {
            message: e.to_string(),
            raw: text,
        })
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::post;
    use axum::Router;

    use super::*;
    use crate::token::{NoAuth, StaticToken};

    async fn sales_orders(headers: HeaderMap, axum::Json(body): axum::Json<Value>) -> axum::response::Response {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        axum::Json(serde_json::json!({
            "success": true,
            "data": [[{"so_upk": "SO-1", "so_pk": "PK-1", "Name_Cust": "Acme"}]],
            "echo": body,
            "auth": auth,
        }))
        .into_response()
    }

    async fn transaction(headers: HeaderMap, axum::Json(body): axum::Json<Value>) -> axum::response::Response {
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        axum::Json(serde_json::json!({ "data": [], "echo": body, "auth": auth })).into_response()
    }

    async fn not_json() -> axum::response::Response {
        (StatusCode::OK, "<html>maintenance</html>").into_response()
    }

    async fn unavailable() -> axum::response::Response {
        (StatusCode::SERVICE_UNAVAILABLE, "down").into_response()
    }

    async fn start_fake_upstream() -> String {
        let app = Router::new()
            .route("/api/get_sales_orders", post(sales_orders))
            .route("/api/get_transaction", post(transaction))
            .route("/broken/json", post(not_json))
            .route("/broken/status", post(unavailable));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn gateway(base: &str) -> UpstreamGateway {
        UpstreamGateway::new(
            base,
            Arc::new(StaticToken::new("so-token")),
            Arc::new(StaticToken::new("trx-token")),
        )
    }

    #[tokio::test]
    async fn relays_sales_order_filter_with_its_credential() {
        let base = start_fake_upstream().await;
        let gw = gateway(&base);

        let filter = serde_json::json!({"limit": 5, "searchKey": "SO"});
        let v = gw.list_sales_orders(&filter).await.unwrap();
        assert_eq!(v["echo"], filter);
        assert_eq!(v["auth"], "so-token");
        assert_eq!(v["data"][0][0]["so_upk"], "SO-1");
    }

    #[tokio::test]
    async fn transaction_lookup_sends_query_and_credential() {
        let base = start_fake_upstream().await;
        let gw = gateway(&base);

        let v = gw.get_transaction("PK-9").await.unwrap();
        assert_eq!(v["auth"], "trx-token");
        assert_eq!(v["echo"]["where"]["SysPK_TransH"], "PK-9");
    }

    #[tokio::test]
    async fn anonymous_requests_carry_no_header() {
        let base = start_fake_upstream().await;
        let gw = UpstreamGateway::new(&base, Arc::new(NoAuth), Arc::new(NoAuth));

        let v = gw.list_sales_orders(&serde_json::json!({})).await.unwrap();
        assert_eq!(v["auth"], "");
    }

    #[tokio::test]
    async fn empty_key_fails_without_request() {
        // Unroutable base: any request would be a network error instead.
        let gw = gateway("http://127.0.0.1:9");
        let err = gw.get_transaction("").await.unwrap_err();
        assert!(matches!(err, ApiError::MissingKey(_)));
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error_with_raw_text() {
        let base = start_fake_upstream().await;
        let gw = gateway(&base).with_paths("/broken/json", "/broken/json");

        match gw.list_sales_orders(&serde_json::json!({})).await.unwrap_err() {
            ApiError::Decode { raw, .. } => assert_eq!(raw, "<html>maintenance</html>"),
            other => panic!("expected Decode, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn error_status_is_relayed() {
        let base = start_fake_upstream().await;
        let gw = gateway(&base).with_paths("/broken/status", "/broken/status");

        match gw.get_transaction("PK-1").await.unwrap_err() {
            ApiError::Server { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "down");
            }
            other => panic!("expected Server, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn unreachable_upstream_is_network_error() {
        let gw = gateway("http://127.0.0.1:9");
        let err = gw.list_sales_orders(&serde_json::json!({})).await.unwrap_err();
        assert!(matches!(err, ApiError::Network(_)));
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let gw = gateway("http://erp.local/");
        assert_eq!(gw.base_url(), "http://erp.local");
    }
}
