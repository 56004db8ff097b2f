//! Row-change events and their classification
//!
//! Every committed row mutation seen by the local replica becomes a
//! [`RowChange`]. The classifier turns it into the label triple of the
//! `ovn_events_total` counter.

use serde::{Deserialize, Serialize};
use std::fmt;

/// OVSDB schema name of the southbound database
pub const SBDB_SCHEMA_NAME: &str = "OVN_Southbound";
/// OVSDB schema name of the northbound database
pub const NBDB_SCHEMA_NAME: &str = "OVN_Northbound";

/// Which OVN database the process is attached to
///
/// Fixed once at startup from the connection flag that was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaIdentity {
    Northbound,
    Southbound,
}

impl SchemaIdentity {
    /// Resolve from an OVSDB schema name; anything but the northbound
    /// schema is treated as southbound.
    pub fn from_schema_name(name: &str) -> Self {
        if name == NBDB_SCHEMA_NAME {
            Self::Northbound
        } else {
            Self::Southbound
        }
    }

    /// OVSDB database name used for `get_schema` / `monitor`
    pub fn schema_name(&self) -> &'static str {
        match self {
            Self::Northbound => NBDB_SCHEMA_NAME,
            Self::Southbound => SBDB_SCHEMA_NAME,
        }
    }

    /// Value of the `schema` metric label
    pub fn label(&self) -> &'static str {
        match self {
            Self::Northbound => "northbound",
            Self::Southbound => "southbound",
        }
    }
}

impl fmt::Display for SchemaIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of row mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowEvent {
    Create,
    Update,
    Delete,
}

impl RowEvent {
    /// Classify a `<row-update>` by which of `old`/`new` it carries.
    ///
    /// Returns `None` when neither is present.
    pub fn from_presence(has_old: bool, has_new: bool) -> Option<Self> {
        match (has_old, has_new) {
            (false, true) => Some(Self::Create),
            (true, true) => Some(Self::Update),
            (true, false) => Some(Self::Delete),
            (false, false) => None,
        }
    }

    /// Value of the `event` metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for RowEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single row-change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowChange {
    /// Table the row belongs to
    pub table: String,
    /// Row UUID as reported by the server
    pub row_uuid: String,
    /// Mutation kind
    pub event: RowEvent,
}

impl RowChange {
    pub fn new(table: impl Into<String>, row_uuid: impl Into<String>, event: RowEvent) -> Self {
        Self {
            table: table.into(),
            row_uuid: row_uuid.into(),
            event,
        }
    }
}

/// Label values for one counter increment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EventLabels {
    pub schema: &'static str,
    pub table: String,
    pub event: &'static str,
}

/// Map a change to the counter it increments.
pub fn classify(schema: SchemaIdentity, change: &RowChange) -> EventLabels {
    EventLabels {
        schema: schema.label(),
        table: change.table.clone(),
        event: change.event.as_str(),
    }
}
