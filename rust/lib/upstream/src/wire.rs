//! Typed views of the upstream ERP payloads.
//!
//! Field names follow the upstream exactly. Unknown fields are ignored and
//! every field the itinerary reads is optional: the ERP omits or nulls
//! them freely.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

// ---------------------------------------------------------------------------
// Sales order list
// ---------------------------------------------------------------------------

/// Filter body for the sales-order list endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesOrderFilter {
    #[serde(rename = "empl_pk")]
    pub employee_pk: Option<String>,
    pub prepared_by: Option<String>,
    pub view_all: u8,
    pub search_key: String,
    pub filter_date: FilterDate,
    #[serde(rename = "locationPK")]
    pub location_pk: Option<String>,
    #[serde(rename = "departmentPK")]
    pub department_pk: Option<String>,
    #[serde(rename = "customerPK")]
    pub customer_pk: Option<String>,
    #[serde(rename = "salesRepPK")]
    pub sales_rep_pk: Option<String>,
    pub status: String,
    pub limit: u32,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterDate {
    pub filter: String,
    pub date1: DateBound,
    pub date2: DateBound,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateBound {
    pub hide: bool,
    pub date: String,
}

impl SalesOrderFilter {
    /// All orders dated between `from` and `to` (inclusive, `YYYY-MM-DD`).
    pub fn between(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            employee_pk: None,
            prepared_by: None,
            view_all: 1,
            search_key: String::new(),
            filter_date: FilterDate {
                filter: "from to".to_string(),
                date1: DateBound { hide: false, date: from.into() },
                date2: DateBound { hide: false, date: to.into() },
            },
            location_pk: None,
            department_pk: None,
            customer_pk: None,
            sales_rep_pk: None,
            status: String::new(),
            limit: 1000,
            offset: 0,
        }
    }
}

/// Response of the sales-order list endpoint: `{success, data: [[...]]}`.
#[derive(Debug, Clone, Deserialize)]
pub struct SalesOrderList {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub data: Vec<Value>,
}

impl SalesOrderList {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        serde_json::from_value(value).map_err(|e| ApiError::shape(format!("sales order list: {}", e)))
    }

    /// The orders in `data[0]`. A failed or malformed listing is a shape error.
    pub fn into_orders(self) -> Result<Vec<WireSalesOrder>, ApiError> {
        if !self.success {
            return Err(ApiError::shape("sales order list reported success = false"));
        }
        let Some(Value::Array(rows)) = self.data.into_iter().next() else {
            return Err(ApiError::shape("sales order list data[0] is not an array"));
        };
        rows.into_iter()
            .map(|row| {
                serde_json::from_value(row)
                    .map_err(|e| ApiError::shape(format!("sales order entry: {}", e)))
            })
            .collect()
    }
}

/// One entry of the sales-order listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireSalesOrder {
    #[serde(default)]
    pub so_upk: Option<Value>,
    #[serde(default)]
    pub so_pk: Option<Value>,
    #[serde(rename = "Name_Cust", default, deserialize_with = "lenient_text")]
    pub customer_name: Option<String>,
}

impl WireSalesOrder {
    pub fn display_key(&self) -> String {
        self.so_upk.as_ref().and_then(opaque_key).unwrap_or_default()
    }

    pub fn detail_key(&self) -> Option<String> {
        self.so_pk.as_ref().and_then(opaque_key)
    }
}

/// Keys are opaque: strings pass through, numbers are stringified, and
/// anything else (null, empty string) counts as absent.
fn opaque_key(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Display text of a field the ERP may send as a string or a number.
/// Any other JSON type reads as absent instead of failing the payload.
fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---------------------------------------------------------------------------
// Transaction detail
// ---------------------------------------------------------------------------

/// Query body for the transaction endpoint, keyed by sales-order `so_pk`.
pub fn transaction_query(so_pk: &str) -> Value {
    serde_json::json!({
        "where": {
            "Module_TransH": "SALESORDER",
            "SysPK_TransH": so_pk,
        },
        "include": [
            [
                "transaction_transactionledgerjobs",
                "transactionledgerjob_shippingaddress",
                "transactionledgerjob_location",
                "transactionledgerjob_job",
                "transactionledgerjob_transactionjo"
            ],
            "transaction_customer",
            "transaction_shippingaddress",
            "transaction_contactperson",
            "transaction_department",
            "transaction_location",
            "transaction_employee",
            "transaction_transactionsl",
            "transaction_transactionto"
        ],
        "order": [[{}, "ID_LdgrJob", "ASC"]],
    })
}

/// Response of the transaction endpoint: `{data: [transaction, ...]}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionResponse {
    #[serde(default)]
    pub data: Option<Vec<WireTransaction>>,
}

impl TransactionResponse {
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        serde_json::from_value(value).map_err(|e| ApiError::shape(format!("transaction: {}", e)))
    }

    /// `data[0]`, if the upstream returned one.
    pub fn into_first(self) -> Option<WireTransaction> {
        self.data.and_then(|d| d.into_iter().next())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireTransaction {
    #[serde(rename = "transaction_customer", default)]
    pub customer: Option<WireCustomer>,
    #[serde(rename = "transaction_contactperson", default)]
    pub contact_person: Option<WireContactPerson>,
    #[serde(rename = "transaction_transactionledgerjobs", default)]
    pub ledger_jobs: Option<Vec<WireLedgerJob>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireCustomer {
    #[serde(rename = "Name_Cust", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
    #[serde(rename = "Address_Cust", default, deserialize_with = "lenient_text")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireContactPerson {
    #[serde(rename = "Name_ContactP", default, deserialize_with = "lenient_text")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireLedgerJob {
    #[serde(rename = "Description_LdgrJob", default, deserialize_with = "lenient_text")]
    pub description: Option<String>,
    #[serde(rename = "DeliveryDate_LdgrJob", alias = "DateNeeded_LdgrJob", default, deserialize_with = "lenient_text")]
    pub delivery_date: Option<String>,
    #[serde(rename = "transactionledgerjob_transactionjo", default)]
    pub job_order: Option<WireJobOrder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireJobOrder {
    #[serde(rename = "UserPK_TransH", default, deserialize_with = "lenient_text")]
    pub number: Option<String>,
}
