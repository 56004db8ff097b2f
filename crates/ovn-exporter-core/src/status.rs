//! Server/cluster status rows and leadership determination
//!
//! The OVSDB server publishes one `_Server.Database` row per hosted
//! database. [`evaluate`] decides from a snapshot of those rows whether the
//! local connection is attached to the instance that should expose metrics.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Deployment model of a hosted database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseModel {
    Standalone,
    Clustered,
    Relay,
}

impl DatabaseModel {
    /// Parse the `model` column. Unknown values fall back to standalone.
    pub fn parse(model: &str) -> Self {
        match model {
            "clustered" => Self::Clustered,
            "relay" => Self::Relay,
            _ => Self::Standalone,
        }
    }

    /// Clustered and relay databases have a leader elsewhere in the cluster
    pub fn has_leadership(&self) -> bool {
        matches!(self, Self::Clustered | Self::Relay)
    }
}

/// One row of the server's `Database` status table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStatus {
    pub name: String,
    pub model: DatabaseModel,
    /// The server has the database schema loaded
    pub schema_present: bool,
    pub connected: bool,
    pub leader: bool,
    /// Cluster ids (UUID strings) the row belongs to; empty when standalone
    #[serde(default)]
    pub cluster_ids: Vec<String>,
}

/// How the status row of interest is located
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusSelector {
    /// Match a configured cluster id as a prefix of any of the row's cluster ids
    ClusterId(String),
    /// Match the database name exactly
    DatabaseName(String),
}

impl StatusSelector {
    /// Cluster id wins when configured; otherwise the database name.
    pub fn new(cluster_id: Option<&str>, database: &str) -> Self {
        match cluster_id {
            Some(cid) if !cid.is_empty() => Self::ClusterId(cid.to_string()),
            _ => Self::DatabaseName(database.to_string()),
        }
    }

    pub fn matches(&self, row: &DatabaseStatus) -> bool {
        match self {
            Self::ClusterId(cid) => row.cluster_ids.iter().any(|id| id.starts_with(cid.as_str())),
            Self::DatabaseName(name) => row.name == *name,
        }
    }
}

impl fmt::Display for StatusSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterId(cid) => write!(f, "cluster {}", cid),
            Self::DatabaseName(name) => f.write_str(name),
        }
    }
}

/// Outcome of one leadership evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderDecision {
    /// Standalone database, always authoritative
    Standalone,
    /// Clustered or relay member currently holding leadership
    ClusterLeader,
    /// No status row matched the selector
    NotFound,
    /// Clustered or relay member without schema, connection, or leadership
    Follower,
}

impl LeaderDecision {
    pub fn is_leader(&self) -> bool {
        matches!(self, Self::Standalone | Self::ClusterLeader)
    }
}

/// Decide leadership from a status snapshot.
///
/// `database` names the monitored database in the not-found log, whichever
/// way the selector locates the row.
pub fn evaluate(rows: &[DatabaseStatus], selector: &StatusSelector, database: &str) -> LeaderDecision {
    let Some(row) = rows.iter().find(|row| selector.matches(row)) else {
        info!(selector = %selector, "Server does not have {} database", database);
        return LeaderDecision::NotFound;
    };

    if !row.model.has_leadership() {
        return LeaderDecision::Standalone;
    }

    if row.schema_present && row.connected && row.leader {
        LeaderDecision::ClusterLeader
    } else {
        debug!(
            database = %row.name,
            model = ?row.model,
            schema = row.schema_present,
            connected = row.connected,
            leader = row.leader,
            "Database is not the cluster leader"
        );
        LeaderDecision::Follower
    }
}

/// Shorthand for `evaluate(..).is_leader()`
pub fn is_leader(rows: &[DatabaseStatus], selector: &StatusSelector, database: &str) -> bool {
    evaluate(rows, selector, database).is_leader()
}

/// Process-wide leadership cell
///
/// Written only by the leadership monitor, read by the exposition loop.
#[derive(Debug, Clone, Default)]
pub struct LeadershipFlag(Arc<AtomicBool>);

impl LeadershipFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, leader: bool) {
        self.0.store(leader, Ordering::Release);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
