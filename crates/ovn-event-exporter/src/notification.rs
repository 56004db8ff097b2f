//! Change subscription sink
//!
//! Bridges row-change notifications from the OVSDB client into increments of
//! the `ovn_events_total` counter.

use ovn_exporter_core::prelude::*;
use ovn_exporter_core::EventMetrics;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Counts every delivered row change, one increment per notification
///
/// No deduplication: a change redelivered after a reconnect is counted again.
pub struct EventCounterSink {
    metrics: EventMetrics,
    delivered: AtomicU64,
}

impl EventCounterSink {
    pub fn new(schema: SchemaIdentity) -> Self {
        Self {
            metrics: EventMetrics::new(schema),
            delivered: AtomicU64::new(0),
        }
    }

    pub fn schema(&self) -> SchemaIdentity {
        self.metrics.schema()
    }

    /// Notifications handled since start
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }
}

impl ChangeHandler for EventCounterSink {
    fn on_row_change(&self, change: RowChange) {
        debug!(
            schema = %self.metrics.schema(),
            "IDL New event \"{}\", table \"{}\"",
            change.event,
            change.table
        );
        self.metrics.record_change(&change);
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }
}
