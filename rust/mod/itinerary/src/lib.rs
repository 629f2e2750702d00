//! Logistic itinerary: turns selected sales orders into printable delivery
//! sheets, one block of rows per order and one row per job.

pub mod api;
pub mod model;
pub mod picker;
pub mod print;
pub mod sheets;
pub mod source;
pub mod table;

use std::sync::Arc;

use axum::Router;
use itinerary_core::Module;

use print::Branding;
use sheets::{ItineraryService, PickerDefaults};
use source::OrderSource;

/// The itinerary module: sheets, the sales-order picker and printing.
pub struct ItineraryModule {
    service: Arc<ItineraryService>,
}

impl ItineraryModule {
    pub fn new(source: Arc<dyn OrderSource>, defaults: PickerDefaults, branding: Branding) -> Self {
        Self {
            service: Arc::new(ItineraryService::new(source, defaults, branding)),
        }
    }

    pub fn service(&self) -> &Arc<ItineraryService> {
        &self.service
    }
}

impl Module for ItineraryModule {
    fn name(&self) -> &str {
        "itinerary"
    }

    fn routes(&self) -> Router {
        api::router(Arc::clone(&self.service))
    }
}
