//! Sales Order Picker: the searchable list a dispatcher picks from.
//!
//! The listing is fetched once and reused until [`SalesOrderPicker::invalidate`].

use crate::model::SalesOrderSummary;

/// How many entries the list view appends per scroll step.
pub const DEFAULT_BATCH_SIZE: usize = 10;

#[derive(Debug, Default)]
pub struct SalesOrderPicker {
    cache: Option<Vec<SalesOrderSummary>>,
}

impl SalesOrderPicker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_loaded(&self) -> bool {
        self.cache.is_some()
    }

    /// Replace the cached listing.
    pub fn load(&mut self, orders: Vec<SalesOrderSummary>) {
        self.cache = Some(orders);
    }

    /// Drop the cache; the next access refetches.
    pub fn invalidate(&mut self) {
        self.cache = None;
    }

    /// The cached listing, empty when not loaded.
    pub fn all(&self) -> &[SalesOrderSummary] {
        self.cache.as_deref().unwrap_or_default()
    }

    /// Orders whose display key contains `query`, case-insensitively.
    /// An empty (or blank) query matches everything. Order is preserved.
    pub fn search(&self, query: &str) -> Vec<&SalesOrderSummary> {
        let needle = query.trim().to_lowercase();
        self.all()
            .iter()
            .filter(|o| needle.is_empty() || o.order_key.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn find(&self, order_key: &str) -> Option<&SalesOrderSummary> {
        self.all().iter().find(|o| o.order_key == order_key)
    }

    /// Cached entries for the given display keys, in the order given.
    /// Keys with no cached entry are skipped.
    pub fn matching<'a, I>(&self, keys: I) -> Vec<&SalesOrderSummary>
    where
        I: IntoIterator<Item = &'a str>,
    {
        keys.into_iter().filter_map(|k| self.find(k)).collect()
    }
}

/// Split `items` into consecutive pages of `size` (at least 1).
pub fn batches<T>(items: &[T], size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(size.max(1))
}
