//! Collaborator seams for the OVN event exporter
//!
//! The exporter core never talks to the wire directly. It consumes three
//! capabilities from the database client, each expressed as a trait:
//!
//! ```text
//! OVSDB client ──► ChangeHandler   (per-row callback, synchronous)
//!      │
//!      ├────────► StatusSource    (snapshot of _Server.Database rows)
//!      │
//!      └────────► Lifecycle       (stop / is_running)
//! ```

use crate::error::Result;
use crate::event::RowChange;
use crate::status::DatabaseStatus;
use async_trait::async_trait;

/// Lifecycle management for long-lived connections
#[async_trait]
pub trait Lifecycle: Send + Sync {
    /// Stop the component gracefully
    ///
    /// Closes connections and background tasks. Safe to call twice.
    async fn stop(&self) -> Result<()>;

    /// Check if the component is running
    fn is_running(&self) -> bool;
}

/// Receives row-change notifications from the database client
///
/// Invoked on the client's dispatch task for every delivered change, so
/// implementations must not block.
pub trait ChangeHandler: Send + Sync {
    fn on_row_change(&self, change: RowChange);
}

impl<F> ChangeHandler for F
where
    F: Fn(RowChange) + Send + Sync,
{
    fn on_row_change(&self, change: RowChange) {
        self(change)
    }
}

/// Read-only view of the server/cluster status table
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Snapshot of the status rows
    ///
    /// Fails with `StatusUnavailable` until the server has sent the table.
    async fn database_status(&self) -> Result<Vec<DatabaseStatus>>;

    /// Name of the database whose status row is of interest
    fn database_name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::RowEvent;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_closure_handler_behind_arc() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let handler: Arc<dyn ChangeHandler> = Arc::new(move |_change: RowChange| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        handler.on_row_change(RowChange::new("Chassis", "a", RowEvent::Create));
        let shared = handler.clone();
        shared.on_row_change(RowChange::new("Chassis", "a", RowEvent::Delete));

        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
