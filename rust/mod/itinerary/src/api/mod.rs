mod sales_orders;
mod sheets;

use std::sync::Arc;
use axum::Router;

use crate::sheets::ItineraryService;

/// Build the complete itinerary module router.
///
/// Routes:
/// - `POST   /sheets`                              create sheet
/// - `GET    /sheets/:id`                          table snapshot
/// - `DELETE /sheets/:id`                          drop the sheet
/// - `POST   /sheets/:id/rows`                     add placeholder row
/// - `PATCH  /sheets/:id/rows/:row`                edit free-text cells
/// - `DELETE /sheets/:id/rows/:row?confirm=`       delete row
/// - `POST   /sheets/:id/rows/:row/@select`        expand a sales order into a block
/// - `POST   /sheets/:id/rows/:row/@clear`         clear row
/// - `DELETE /sheets/:id/blocks/:row`              delete the row's whole block
/// - `GET    /sheets/:id/print/itinerary`          printable itinerary
/// - `GET    /sheets/:id/print/pos`                POS job receipts
/// - `GET    /sales-orders?q=&page=`               picker search, optionally one batch
/// - `POST   /sales-orders/@refresh`               reload picker cache
pub fn router(service: Arc<ItineraryService>) -> Router {
    Router::new()
        .merge(sheets::router(Arc::clone(&service)))
        .merge(sales_orders::router(service))
}
