//! Where sales orders and their jobs come from.

use async_trait::async_trait;

use itinerary_upstream::wire::{SalesOrderFilter, SalesOrderList, TransactionResponse};
use itinerary_upstream::{ApiError, UpstreamGateway};

use crate::model::{ResolvedOrder, SalesOrderSummary};

/// Read access to the ERP, as the itinerary needs it.
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// The sales-order listing for `filter`.
    async fn sales_orders(&self, filter: &SalesOrderFilter) -> Result<Vec<SalesOrderSummary>, ApiError>;

    /// Header context and jobs of the sales order with detail key `so_pk`.
    async fn transaction(&self, so_pk: &str) -> Result<ResolvedOrder, ApiError>;
}

#[async_trait]
impl OrderSource for UpstreamGateway {
    async fn sales_orders(&self, filter: &SalesOrderFilter) -> Result<Vec<SalesOrderSummary>, ApiError> {
        let body = serde_json::to_value(filter).map_err(|e| ApiError::shape(e.to_string()))?;
        let value = self.list_sales_orders(&body).await?;
        let orders = SalesOrderList::from_value(value)?.into_orders()?;
        Ok(orders.into_iter().map(SalesOrderSummary::from).collect())
    }

    async fn transaction(&self, so_pk: &str) -> Result<ResolvedOrder, ApiError> {
        let value = self.get_transaction(so_pk).await?;
        let trx = TransactionResponse::from_value(value)?.into_first();
        Ok(ResolvedOrder::from_transaction(trx))
    }
}

/// Resolve the jobs of `order`. An order without a detail key cannot be
/// looked up and fails with [`ApiError::MissingKey`].
pub async fn resolve_jobs(source: &dyn OrderSource, order: &SalesOrderSummary) -> Result<ResolvedOrder, ApiError> {
    let Some(so_pk) = order.detail_key() else {
        return Err(ApiError::MissingKey(format!(
            "sales order {} has no detail key",
            order.order_key
        )));
    };
    source.transaction(so_pk).await
}

#[cfg(test)]
pub(crate) mod fake {
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use tokio::sync::{Notify, Semaphore};

    use super::*;

    /// In-memory [`OrderSource`]. Transactions can be gated so a test can
    /// act while a fetch is in flight.
    #[derive(Default)]
    pub struct FakeSource {
        pub orders: Vec<SalesOrderSummary>,
        pub transactions: HashMap<String, ResolvedOrder>,
        /// Keys whose transaction comes back in an unreadable shape.
        pub malformed: HashSet<String>,
        pub fail_listing: bool,
        gate: Option<Semaphore>,
        started: Notify,
        pub listing_calls: AtomicUsize,
        pub transaction_calls: Mutex<Vec<String>>,
    }

    impl FakeSource {
        pub fn new(orders: Vec<SalesOrderSummary>) -> Self {
            Self {
                orders,
                ..Self::default()
            }
        }

        pub fn with_transaction(mut self, so_pk: &str, resolved: ResolvedOrder) -> Self {
            self.transactions.insert(so_pk.to_string(), resolved);
            self
        }

        pub fn with_malformed(mut self, so_pk: &str) -> Self {
            self.malformed.insert(so_pk.to_string());
            self
        }

        /// Hold every transaction fetch until [`release`](Self::release).
        pub fn gated(mut self) -> Self {
            self.gate = Some(Semaphore::new(0));
            self
        }

        pub fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        /// Wait until a transaction fetch has started.
        pub async fn fetch_started(&self) {
            self.started.notified().await;
        }
    }

    #[async_trait]
    impl OrderSource for FakeSource {
        async fn sales_orders(&self, _filter: &SalesOrderFilter) -> Result<Vec<SalesOrderSummary>, ApiError> {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_listing {
                return Err(ApiError::Server { status: 503, body: "down".into() });
            }
            Ok(self.orders.clone())
        }

        async fn transaction(&self, so_pk: &str) -> Result<ResolvedOrder, ApiError> {
            self.transaction_calls.lock().unwrap().push(so_pk.to_string());
            self.started.notify_one();
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            if self.malformed.contains(so_pk) {
                return Err(ApiError::shape(format!("transaction {} is not an object", so_pk)));
            }
            self.transactions
                .get(so_pk)
                .cloned()
                .ok_or_else(|| ApiError::Server { status: 500, body: format!("no {}", so_pk) })
        }
    }
}
