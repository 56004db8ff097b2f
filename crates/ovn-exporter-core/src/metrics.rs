//! Metrics for the OVN event exporter
//!
//! Counters are recorded through the `metrics` facade; whichever recorder is
//! installed (the Prometheus recorder in the daemon, a local one in tests)
//! receives them.

use crate::event::{classify, EventLabels, RowChange, SchemaIdentity};
use metrics::{counter, describe_counter, Unit};

/// Metric names as constants for consistency
pub mod names {
    pub const EVENTS_TOTAL: &str = "ovn_events_total";
}

/// Labels for metrics
pub mod labels {
    pub const SCHEMA: &str = "schema";
    pub const TABLE: &str = "table";
    pub const EVENT: &str = "event";
}

/// Register help text with the installed recorder
pub fn describe() {
    describe_counter!(names::EVENTS_TOTAL, Unit::Count, "OVN events counter");
}

/// Row-change event metrics for one schema
#[derive(Debug, Clone, Copy)]
pub struct EventMetrics {
    schema: SchemaIdentity,
}

impl EventMetrics {
    pub fn new(schema: SchemaIdentity) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> SchemaIdentity {
        self.schema
    }

    /// Increment the counter for a change and return the labels used
    pub fn record_change(&self, change: &RowChange) -> EventLabels {
        let labels = classify(self.schema, change);
        counter!(
            names::EVENTS_TOTAL,
            labels::SCHEMA => labels.schema,
            labels::TABLE => labels.table.clone(),
            labels::EVENT => labels.event,
        )
        .increment(1);
        labels
    }
}
