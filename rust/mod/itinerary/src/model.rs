use serde::{Deserialize, Serialize};

use itinerary_upstream::wire::{WireSalesOrder, WireTransaction};

// ---------------------------------------------------------------------------
// SalesOrderSummary
// ---------------------------------------------------------------------------

/// One entry of the sales-order listing, as cached by the picker.
///
/// Fetched in bulk and never mutated; a fresh fetch replaces the whole set.
/// Accepts both the itinerary's camelCase names and the upstream's
/// `so_upk` / `so_pk` / `Name_Cust` on input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderSummary {
    /// Display key (`so_upk`), shown in the SO column.
    #[serde(alias = "so_upk")]
    pub order_key: String,
    /// Detail key (`so_pk`) used to fetch the transaction. May be absent.
    #[serde(alias = "so_pk", default)]
    pub primary_key: Option<String>,
    #[serde(alias = "Name_Cust", default)]
    pub customer_name: String,
}

impl SalesOrderSummary {
    /// Picker list label: `"{orderKey} - {customerName}"`.
    pub fn label(&self) -> String {
        format!("{} - {}", self.order_key, self.customer_name)
    }

    /// The detail key, treating an empty string as absent.
    pub fn detail_key(&self) -> Option<&str> {
        self.primary_key.as_deref().filter(|k| !k.is_empty())
    }
}

impl From<WireSalesOrder> for SalesOrderSummary {
    fn from(w: WireSalesOrder) -> Self {
        Self {
            order_key: w.display_key(),
            primary_key: w.detail_key(),
            customer_name: w.customer_name.unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// JobDetail / HeaderContext
// ---------------------------------------------------------------------------

/// A line item of work under a sales order's transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetail {
    pub description: String,
    pub delivery_date: String,
    /// Job-order number, printed on receipts only.
    #[serde(default)]
    pub job_order_no: Option<String>,
}

impl JobDetail {
    pub fn new(description: impl Into<String>, delivery_date: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            delivery_date: delivery_date.into(),
            job_order_no: None,
        }
    }
}

/// Sales-order-level fields that land on a block's header row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderContext {
    pub customer_name: String,
    pub address: String,
    pub contact_name: String,
}

/// What the upstream knows about one sales order: its header context and
/// its jobs in upstream order. Not cached beyond the fetch that produced it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedOrder {
    pub header: HeaderContext,
    pub jobs: Vec<JobDetail>,
}

impl ResolvedOrder {
    /// Build from the transaction's `data[0]`; a missing transaction
    /// resolves to zero jobs and a blank header.
    pub fn from_transaction(trx: Option<WireTransaction>) -> Self {
        let Some(trx) = trx else {
            return Self::default();
        };

        let customer = trx.customer.unwrap_or_default();
        let header = HeaderContext {
            customer_name: customer.name.unwrap_or_default(),
            address: customer.address.unwrap_or_default(),
            contact_name: trx
                .contact_person
                .and_then(|c| c.name)
                .unwrap_or_default(),
        };

        let jobs = trx
            .ledger_jobs
            .unwrap_or_default()
            .into_iter()
            .map(|j| JobDetail {
                description: j.description.unwrap_or_default(),
                delivery_date: j.delivery_date.unwrap_or_default(),
                job_order_no: j.job_order.and_then(|jo| jo.number).filter(|n| !n.is_empty()),
            })
            .collect();

        Self { header, jobs }
    }
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Body of `POST /sheets/{id}/rows/{row}/@select`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectRequest {
    #[serde(alias = "so_upk")]
    pub order_key: String,
}

/// Query of `DELETE /sheets/{id}/rows/{row}`.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    /// Confirms removing the last row of a block.
    #[serde(default)]
    pub confirm: bool,
}

/// Query of `GET /sales-orders`.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
    /// Zero-based page of [`DEFAULT_BATCH_SIZE`](crate::picker::DEFAULT_BATCH_SIZE)
    /// entries. Absent means every match.
    #[serde(default)]
    pub page: Option<usize>,
}
