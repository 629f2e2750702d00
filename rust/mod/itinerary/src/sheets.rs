//! Itinerary sheets: the tables dispatchers edit, plus the shared picker.
//!
//! A selection never holds a sheet lock across the upstream fetch. The row
//! is addressed by id, and the insertion becomes a no-op if that row was
//! deleted while the fetch was in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, MutexGuard};

use itinerary_core::{new_id, now_millis, today_ymd, ServiceError};
use itinerary_upstream::wire::SalesOrderFilter;

use crate::model::SalesOrderSummary;
use crate::picker::SalesOrderPicker;
use crate::print::{self, Branding, ReceiptOrder};
use crate::source::{resolve_jobs, OrderSource};
use crate::table::{BlockId, DeleteOutcome, ItineraryTable, Row, RowId, RowPatch, TableSnapshot};

/// Listing filter applied when the picker loads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PickerDefaults {
    /// Earliest order date, `YYYY-MM-DD`. The latest is always today.
    pub from_date: String,
    pub employee_pk: Option<String>,
    pub prepared_by: Option<String>,
    pub location_pk: Option<String>,
    pub limit: u32,
}

impl Default for PickerDefaults {
    fn default() -> Self {
        Self {
            from_date: "2023-01-01".to_string(),
            employee_pk: None,
            prepared_by: None,
            location_pk: None,
            limit: 1000,
        }
    }
}

impl PickerDefaults {
    pub fn filter(&self, today: &str) -> SalesOrderFilter {
        let mut filter = SalesOrderFilter::between(self.from_date.clone(), today);
        filter.employee_pk = self.employee_pk.clone();
        filter.prepared_by = self.prepared_by.clone();
        filter.location_pk = self.location_pk.clone();
        filter.limit = self.limit;
        filter
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetView {
    pub id: String,
    #[serde(flatten)]
    pub table: TableSnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelectOutcome {
    /// The order's block replaced the target row.
    Inserted {
        #[serde(rename = "blockId")]
        block_id: BlockId,
        rows: usize,
    },
    /// The target row was deleted while its jobs were being fetched.
    TargetGone,
}

/// Sheets untouched for this long are dropped when the next sheet is created.
pub const DEFAULT_SHEET_IDLE: Duration = Duration::from_secs(12 * 60 * 60);

type Sheet = Arc<Mutex<ItineraryTable>>;

struct SheetEntry {
    table: Sheet,
    touched: Instant,
}

pub struct ItineraryService {
    source: Arc<dyn OrderSource>,
    sheets: Mutex<HashMap<String, SheetEntry>>,
    sheet_idle: Duration,
    picker: Mutex<SalesOrderPicker>,
    defaults: PickerDefaults,
    branding: Branding,
}

impl ItineraryService {
    pub fn new(source: Arc<dyn OrderSource>, defaults: PickerDefaults, branding: Branding) -> Self {
        Self {
            source,
            sheets: Mutex::new(HashMap::new()),
            sheet_idle: DEFAULT_SHEET_IDLE,
            picker: Mutex::new(SalesOrderPicker::new()),
            defaults,
            branding,
        }
    }

    /// Override how long an untouched sheet is kept.
    pub fn with_sheet_idle(mut self, idle: Duration) -> Self {
        self.sheet_idle = idle;
        self
    }

    // -----------------------------------------------------------------------
    // Sheets
    // -----------------------------------------------------------------------

    /// New sheet with one placeholder row. Idle sheets are swept first.
    pub async fn create_sheet(&self) -> SheetView {
        let id = new_id();
        let table = ItineraryTable::with_placeholders(1);
        let view = SheetView {
            id: id.clone(),
            table: table.snapshot(),
        };

        let mut sheets = self.sheets.lock().await;
        let before = sheets.len();
        sheets.retain(|_, entry| entry.touched.elapsed() < self.sheet_idle);
        if sheets.len() < before {
            tracing::info!(evicted = before - sheets.len(), "idle sheets dropped");
        }
        sheets.insert(
            id.clone(),
            SheetEntry {
                table: Arc::new(Mutex::new(table)),
                touched: Instant::now(),
            },
        );
        tracing::info!(sheet = %id, "sheet created");
        view
    }

    /// Drop a sheet and its rows.
    pub async fn delete_sheet(&self, id: &str) -> Result<(), ServiceError> {
        match self.sheets.lock().await.remove(id) {
            Some(_) => {
                tracing::info!(sheet = %id, "sheet deleted");
                Ok(())
            }
            None => Err(ServiceError::NotFound(format!("sheet {} not found", id))),
        }
    }

    async fn sheet(&self, id: &str) -> Result<Sheet, ServiceError> {
        let mut sheets = self.sheets.lock().await;
        let entry = sheets
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("sheet {} not found", id)))?;
        entry.touched = Instant::now();
        Ok(Arc::clone(&entry.table))
    }

    /// Run `f` against the sheet's table under its lock.
    pub async fn with_sheet<F, R>(&self, id: &str, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&mut ItineraryTable) -> R,
    {
        let sheet = self.sheet(id).await?;
        let mut table = sheet.lock().await;
        Ok(f(&mut *table))
    }

    /// Like [`with_sheet`](Self::with_sheet), then checks the block
    /// invariants. A broken table fails with `INTERNAL`.
    async fn mutate_sheet<F, R>(&self, id: &str, f: F) -> Result<R, ServiceError>
    where
        F: FnOnce(&mut ItineraryTable) -> R,
    {
        let sheet = self.sheet(id).await?;
        let mut table = sheet.lock().await;
        let result = f(&mut *table);
        check_invariants(id, &table)?;
        Ok(result)
    }

    pub async fn snapshot(&self, id: &str) -> Result<SheetView, ServiceError> {
        let table = self.with_sheet(id, |t| t.snapshot()).await?;
        Ok(SheetView {
            id: id.to_string(),
            table,
        })
    }

    pub async fn add_row(&self, id: &str) -> Result<RowId, ServiceError> {
        self.mutate_sheet(id, |t| t.add_row()).await
    }

    pub async fn edit_row(&self, id: &str, row: RowId, patch: &RowPatch) -> Result<(), ServiceError> {
        self.mutate_sheet(id, |t| t.edit_row(row, patch)).await??;
        Ok(())
    }

    pub async fn clear_row(&self, id: &str, row: RowId) -> Result<(), ServiceError> {
        self.mutate_sheet(id, |t| t.clear_row(row)).await??;
        Ok(())
    }

    /// Delete one row. Removing the last row of a block needs `confirm`;
    /// without it the call fails with `CONFIRMATION_REQUIRED` and nothing changes.
    pub async fn delete_row(&self, id: &str, row: RowId, confirm: bool) -> Result<DeleteOutcome, ServiceError> {
        let outcome = self.mutate_sheet(id, |t| t.delete_row(row, |_| confirm)).await??;
        match &outcome {
            DeleteOutcome::Declined => {
                return Err(ServiceError::ConfirmationRequired(
                    "This is the only row for this SO. Delete anyway?".to_string(),
                ));
            }
            DeleteOutcome::BlockRemoved { block_id } => {
                tracing::info!(sheet = %id, block = %block_id, "block removed with its last row");
            }
            _ => {}
        }
        Ok(outcome)
    }

    pub async fn delete_block(&self, id: &str, row: RowId) -> Result<Vec<Row>, ServiceError> {
        let removed = self.mutate_sheet(id, |t| t.delete_block(row)).await??;
        tracing::info!(sheet = %id, rows = removed.len(), "block deleted");
        Ok(removed)
    }

    // -----------------------------------------------------------------------
    // Picker
    // -----------------------------------------------------------------------

    /// The picker, loaded from the upstream on first use. A failed load
    /// leaves it unloaded.
    async fn loaded_picker(&self) -> Result<MutexGuard<'_, SalesOrderPicker>, ServiceError> {
        let mut picker = self.picker.lock().await;
        if !picker.is_loaded() {
            let filter = self.defaults.filter(&today_ymd());
            match self.source.sales_orders(&filter).await {
                Ok(orders) => {
                    tracing::info!(count = orders.len(), "sales orders loaded");
                    picker.load(orders);
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to load sales orders");
                    return Err(e.into());
                }
            }
        }
        Ok(picker)
    }

    pub async fn search_orders(&self, query: &str) -> Result<Vec<SalesOrderSummary>, ServiceError> {
        let picker = self.loaded_picker().await?;
        Ok(picker.search(query).into_iter().cloned().collect())
    }

    /// Drop the cached listing and fetch it again. Returns the new count.
    pub async fn refresh_orders(&self) -> Result<usize, ServiceError> {
        self.picker.lock().await.invalidate();
        let picker = self.loaded_picker().await?;
        Ok(picker.all().len())
    }

    // -----------------------------------------------------------------------
    // Selection
    // -----------------------------------------------------------------------

    /// Expand the sales order `order_key` into a block at row `row`.
    ///
    /// On a resolution failure the target row is left as it was.
    pub async fn select_order(&self, id: &str, row: RowId, order_key: &str) -> Result<SelectOutcome, ServiceError> {
        let sheet = self.sheet(id).await?;
        if sheet.lock().await.row(row).is_none() {
            return Err(ServiceError::NotFound(format!("row {} not found", row)));
        }

        let order = {
            let picker = self.loaded_picker().await?;
            picker
                .find(order_key)
                .cloned()
                .ok_or_else(|| ServiceError::NotFound(format!("sales order {} not found", order_key)))?
        };

        let resolved = match resolve_jobs(self.source.as_ref(), &order).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::error!(sheet = %id, order = %order.order_key, error = %e, "failed to resolve jobs");
                return Err(e.into());
            }
        };

        let mut table = sheet.lock().await;
        let inserted = table.insert_block_at_row(row, &order, &resolved.header, &resolved.jobs)?;
        check_invariants(id, &table)?;
        match inserted {
            Some(block_id) => {
                let rows = table.block(&block_id).map_or(0, |b| b.len());
                tracing::info!(sheet = %id, order = %order.order_key, block = %block_id, rows, "block inserted");
                Ok(SelectOutcome::Inserted { block_id, rows })
            }
            None => {
                tracing::info!(sheet = %id, row, "target row removed during fetch; selection dropped");
                Ok(SelectOutcome::TargetGone)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Printing
    // -----------------------------------------------------------------------

    pub async fn print_itinerary(&self, id: &str) -> Result<String, ServiceError> {
        self.with_sheet(id, |t| print::render_itinerary(t.rows())).await
    }

    /// Receipts for every sales order present on the sheet. Orders whose
    /// transaction cannot be fetched are skipped.
    pub async fn print_pos(&self, id: &str) -> Result<String, ServiceError> {
        let keys = self.with_sheet(id, |t| t.order_keys()).await?;

        let orders: Vec<SalesOrderSummary> = {
            let picker = self.picker.lock().await;
            if picker.all().is_empty() {
                return Err(ServiceError::Validation(
                    "No sales orders loaded. Open the picker first.".to_string(),
                ));
            }
            picker.matching(keys.iter().map(String::as_str)).into_iter().cloned().collect()
        };

        let mut receipts = Vec::with_capacity(orders.len());
        for order in orders {
            match resolve_jobs(self.source.as_ref(), &order).await {
                Ok(resolved) => receipts.push(ReceiptOrder { order, resolved }),
                Err(e) => {
                    tracing::error!(order = %order.order_key, error = %e, "receipt fetch failed; skipped");
                }
            }
        }

        let transaction_number = format!("TRX-{}", now_millis());
        Ok(print::render_pos_receipts(&receipts, &transaction_number, &self.branding))
    }
}

fn check_invariants(id: &str, table: &ItineraryTable) -> Result<(), ServiceError> {
    table.validate().map_err(|e| {
        tracing::error!(sheet = %id, error = %e, "sheet invariants broken");
        ServiceError::from(e)
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::model::{HeaderContext, JobDetail, ResolvedOrder};
    use crate::source::fake::FakeSource;
    use crate::table::RowRole;

    fn so(key: &str, pk: Option<&str>) -> SalesOrderSummary {
        SalesOrderSummary {
            order_key: key.into(),
            primary_key: pk.map(Into::into),
            customer_name: "Acme".into(),
        }
    }

    fn resolved(descriptions: &[&str]) -> ResolvedOrder {
        ResolvedOrder {
            header: HeaderContext {
                customer_name: "Acme".into(),
                address: "1 Pier Rd".into(),
                contact_name: "Ana".into(),
            },
            jobs: descriptions.iter().map(|d| JobDetail::new(*d, "2024-06-01")).collect(),
        }
    }

    fn fake() -> FakeSource {
        FakeSource::new(vec![so("SO-1", Some("PK-1")), so("SO-2", Some("PK-2")), so("SO-3", None)])
            .with_transaction("PK-1", resolved(&["A", "B", "C"]))
            .with_transaction("PK-2", resolved(&[]))
    }

    fn service(source: FakeSource) -> (Arc<FakeSource>, ItineraryService) {
        let source = Arc::new(source);
        let svc = ItineraryService::new(source.clone(), PickerDefaults::default(), Branding::default());
        (source, svc)
    }

    #[test]
    fn picker_defaults_build_filter() {
        let defaults = PickerDefaults {
            location_pk: Some("loc".into()),
            limit: 50,
            ..PickerDefaults::default()
        };
        let filter = defaults.filter("2024-06-30");
        assert_eq!(filter.filter_date.date1.date, "2023-01-01");
        assert_eq!(filter.filter_date.date2.date, "2024-06-30");
        assert_eq!(filter.location_pk.as_deref(), Some("loc"));
        assert_eq!(filter.limit, 50);
    }

    #[tokio::test]
    async fn select_expands_block() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;

        let outcome = svc.select_order(&sheet.id, row, "SO-1").await.unwrap();
        assert_eq!(
            outcome,
            SelectOutcome::Inserted { block_id: BlockId::new("block-PK-1"), rows: 3 }
        );

        let view = svc.snapshot(&sheet.id).await.unwrap();
        assert_eq!(view.table.rows.len(), 3);
        assert_eq!(view.table.rows[0].role, RowRole::BlockHeader);
        assert_eq!(view.table.rows[0].cells.so_id, "SO-1");
        assert_eq!(view.table.rows[2].cells.description, "C");
    }

    #[tokio::test]
    async fn zero_jobs_still_produce_header_row() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;

        svc.select_order(&sheet.id, row, "SO-2").await.unwrap();
        let view = svc.snapshot(&sheet.id).await.unwrap();
        assert_eq!(view.table.rows.len(), 1);
        assert_eq!(view.table.rows[0].cells.so_id, "SO-2");
        assert!(view.table.rows[0].cells.description.is_empty());
    }

    #[tokio::test]
    async fn missing_key_leaves_row_untouched() {
        let (source, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;

        let err = svc.select_order(&sheet.id, row, "SO-3").await.unwrap_err();
        assert_eq!(err.error_code(), "MISSING_KEY");
        assert!(source.transaction_calls.lock().unwrap().is_empty());

        let view = svc.snapshot(&sheet.id).await.unwrap();
        assert_eq!(view.table.rows.len(), 1);
        assert_eq!(view.table.rows[0].role, RowRole::Placeholder);
    }

    #[tokio::test]
    async fn upstream_failure_leaves_row_untouched() {
        let (_, svc) = service(FakeSource::new(vec![so("SO-9", Some("PK-9"))]));
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;

        let err = svc.select_order(&sheet.id, row, "SO-9").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_UNAVAILABLE");
        assert_eq!(svc.snapshot(&sheet.id).await.unwrap().table.rows[0].role, RowRole::Placeholder);
    }

    #[tokio::test]
    async fn malformed_transaction_leaves_row_untouched() {
        let (_, svc) = service(FakeSource::new(vec![so("SO-8", Some("PK-8"))]).with_malformed("PK-8"));
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;

        let err = svc.select_order(&sheet.id, row, "SO-8").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_FORMAT");

        let view = svc.snapshot(&sheet.id).await.unwrap();
        assert_eq!(view.table.rows.len(), 1);
        assert_eq!(view.table.rows[0].id, row);
        assert_eq!(view.table.rows[0].role, RowRole::Placeholder);
        assert!(view.table.rows[0].cells.so_id.is_empty());
    }

    #[tokio::test]
    async fn unknown_order_or_row_is_not_found() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;

        let err = svc.select_order(&sheet.id, row, "SO-404").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        let err = svc.select_order(&sheet.id, 999, "SO-1").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        let err = svc.select_order("nope", row, "SO-1").await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn row_deleted_during_fetch_drops_selection() {
        let (source, svc) = service(fake().gated());
        let svc = Arc::new(svc);
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;
        let other = svc.add_row(&sheet.id).await.unwrap();

        let task = {
            let svc = Arc::clone(&svc);
            let id = sheet.id.clone();
            tokio::spawn(async move { svc.select_order(&id, row, "SO-1").await })
        };

        source.fetch_started().await;
        // The sheet stays editable while the fetch is in flight.
        svc.delete_row(&sheet.id, row, false).await.unwrap();
        source.release();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome, SelectOutcome::TargetGone);

        let view = svc.snapshot(&sheet.id).await.unwrap();
        assert_eq!(view.table.rows.len(), 1);
        assert_eq!(view.table.rows[0].id, other);
    }

    #[tokio::test]
    async fn delete_only_block_row_needs_confirmation() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let placeholder = sheet.table.rows[0].id;
        svc.select_order(&sheet.id, placeholder, "SO-2").await.unwrap();
        let row = svc.snapshot(&sheet.id).await.unwrap().table.rows[0].id;
        assert_ne!(row, placeholder);

        let err = svc.delete_row(&sheet.id, row, false).await.unwrap_err();
        assert_eq!(err.error_code(), "CONFIRMATION_REQUIRED");
        assert_eq!(svc.snapshot(&sheet.id).await.unwrap().table.rows.len(), 1);

        let outcome = svc.delete_row(&sheet.id, row, true).await.unwrap();
        assert!(matches!(outcome, DeleteOutcome::BlockRemoved { .. }));
        assert!(svc.snapshot(&sheet.id).await.unwrap().table.rows.is_empty());
    }

    #[tokio::test]
    async fn deleted_sheet_is_gone() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        svc.delete_sheet(&sheet.id).await.unwrap();

        let err = svc.snapshot(&sheet.id).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
        let err = svc.delete_sheet(&sheet.id).await.unwrap_err();
        assert_eq!(err.error_code(), "NOT_FOUND");
    }

    #[tokio::test]
    async fn idle_sheets_are_swept_on_create() {
        let (_, svc) = service(fake());
        let svc = svc.with_sheet_idle(Duration::ZERO);
        let old = svc.create_sheet().await;
        let new = svc.create_sheet().await;

        assert_eq!(svc.snapshot(&old.id).await.unwrap_err().error_code(), "NOT_FOUND");
        assert!(svc.snapshot(&new.id).await.is_ok());
    }

    #[tokio::test]
    async fn used_sheets_survive_sweep() {
        let (_, svc) = service(fake());
        let svc = svc.with_sheet_idle(Duration::from_secs(3600));
        let first = svc.create_sheet().await;
        svc.create_sheet().await;
        assert!(svc.snapshot(&first.id).await.is_ok());
    }

    #[tokio::test]
    async fn picker_loads_once_until_refresh() {
        let (source, svc) = service(fake());
        assert_eq!(svc.search_orders("").await.unwrap().len(), 3);
        assert_eq!(svc.search_orders("so-1").await.unwrap().len(), 1);
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 1);

        assert_eq!(svc.refresh_orders().await.unwrap(), 3);
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn failed_listing_is_retried_next_time() {
        let mut source = fake();
        source.fail_listing = true;
        let (source, svc) = service(source);

        let err = svc.search_orders("").await.unwrap_err();
        assert_eq!(err.error_code(), "UPSTREAM_UNAVAILABLE");
        assert!(svc.search_orders("").await.is_err());
        assert_eq!(source.listing_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pos_requires_loaded_orders() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let err = svc.print_pos(&sheet.id).await.unwrap_err();
        assert_eq!(err.error_code(), "VALIDATION_FAILED");
    }

    #[tokio::test]
    async fn pos_prints_receipts_for_orders_on_sheet() {
        let (source, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;
        svc.select_order(&sheet.id, row, "SO-1").await.unwrap();
        source.transaction_calls.lock().unwrap().clear();

        let html = svc.print_pos(&sheet.id).await.unwrap();
        assert_eq!(html.matches("class=\"jo-block\"").count(), 3);
        assert!(html.contains("TRX-"));
        assert_eq!(*source.transaction_calls.lock().unwrap(), vec!["PK-1".to_string()]);
    }

    #[tokio::test]
    async fn itinerary_print_reflects_sheet() {
        let (_, svc) = service(fake());
        let sheet = svc.create_sheet().await;
        let row = sheet.table.rows[0].id;
        svc.select_order(&sheet.id, row, "SO-1").await.unwrap();

        let html = svc.print_itinerary(&sheet.id).await.unwrap();
        assert!(html.contains("LOGISTIC ITINERARY"));
        assert!(html.contains("<td>SO-1</td>"));
        assert!(html.contains("<td>B</td>"));
    }
}
