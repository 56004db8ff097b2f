//! Error types for the OVN event exporter
//!
//! Uses `thiserror` for ergonomic error handling with full context preservation.

use std::fmt;
use thiserror::Error;

/// Result type alias for exporter operations
pub type Result<T> = std::result::Result<T, ExporterError>;

/// Primary error type for all exporter operations
#[derive(Error, Debug)]
pub enum ExporterError {
    /// Invalid or conflicting configuration (flags, files, connection strings)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// OVSDB connection could not be established or was lost
    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Operation timeout
    #[error("Timeout: {operation} exceeded {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Malformed or unexpected JSON-RPC traffic
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    /// Server/cluster status rows are not (yet) available
    #[error("Status unavailable: {message}")]
    StatusUnavailable { message: String },

    /// Socket or listener I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP exposition failure
    #[error("HTTP error: {message}")]
    Http { message: String },

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ExporterError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a protocol error
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }

    /// Create a status-unavailable error
    pub fn status_unavailable(message: impl Into<String>) -> Self {
        Self::StatusUnavailable {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }
}

/// Error context for enhanced debugging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub component: &'static str,
    pub operation: String,
    pub database: Option<String>,
    pub table: Option<String>,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}::{}]", self.component, self.operation)?;
        if let Some(ref db) = self.database {
            write!(f, " db={}", db)?;
        }
        if let Some(ref table) = self.table {
            write!(f, " table={}", table)?;
        }
        Ok(())
    }
}

/// Extension trait for adding context to errors
pub trait ErrorContextExt<T> {
    fn with_context(self, ctx: ErrorContext) -> Result<T>;
}

impl<T> ErrorContextExt<T> for Result<T> {
    fn with_context(self, ctx: ErrorContext) -> Result<T> {
        self.map_err(|e| {
            tracing::error!(
                error = %e,
                component = ctx.component,
                operation = %ctx.operation,
                database = ?ctx.database,
                table = ?ctx.table,
                "Operation failed"
            );
            e
        })
    }
}
