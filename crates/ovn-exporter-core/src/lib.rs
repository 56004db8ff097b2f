//! # OVN Exporter Core
//!
//! Core types, collaborator traits, and metrics for the OVN event exporter.
//!
//! This crate holds everything that is independent of the OVSDB wire and the
//! HTTP listener:
//! - Row-change events and their classification into counter labels
//! - Server/cluster status rows and the leadership decision
//! - The `ovn_events_total` counter
//! - Configuration and error taxonomy
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ OVSDB client│────►│ChangeHandler│────►│  registry   │
//! └─────────────┘     └─────────────┘     └──────┬──────┘
//!        │                                       │
//!        ▼                                       ▼
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │StatusSource │────►│  evaluate   │────►│ exposition  │
//! └─────────────┘     └─────────────┘     │    gate     │
//!                                         └─────────────┘
//! ```

pub mod config;
pub mod error;
pub mod event;
pub mod metrics;
pub mod status;
pub mod strategy;

pub use crate::config::*;
pub use crate::error::*;
pub use crate::event::*;
pub use crate::metrics::{describe as describe_metrics, EventMetrics};
pub use crate::status::*;
pub use crate::strategy::*;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::ExporterConfig;
    pub use crate::error::{ExporterError, Result};
    pub use crate::event::{RowChange, RowEvent, SchemaIdentity};
    pub use crate::status::{DatabaseStatus, LeadershipFlag, StatusSelector};
    pub use crate::strategy::{ChangeHandler, Lifecycle, StatusSource};
}
