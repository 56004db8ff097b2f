//! Configuration types for the OVN event exporter
//!
//! Uses the `config` crate for layered configuration from defaults, an
//! optional file and the environment. Command-line flags are applied on top
//! by the binary.

use crate::error::{ExporterError, Result};
use crate::event::SchemaIdentity;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Root configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// OVSDB connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Metrics listener configuration
    #[serde(default)]
    pub http: HttpConfig,

    /// Leadership tracking configuration
    #[serde(default)]
    pub leadership: LeadershipConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ============================================================================
// Database Configuration
// ============================================================================

/// OVSDB connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Southbound connection string (`tcp:host:port`, `unix:/path`, comma-separated)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sbdb: Option<String>,

    /// Northbound connection string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbdb: Option<String>,

    /// Initial connection timeout
    #[serde(with = "humantime_serde", default = "default_connect_timeout")]
    pub timeout: Duration,

    /// Select the status row by cluster id prefix instead of database name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_id: Option<String>,

    /// First delay before reconnecting after a lost connection
    #[serde(with = "humantime_serde", default = "default_reconnect_backoff")]
    pub reconnect_backoff: Duration,

    /// Upper bound for the doubling reconnect delay
    #[serde(with = "humantime_serde", default = "default_reconnect_max_backoff")]
    pub reconnect_max_backoff: Duration,
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_reconnect_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_reconnect_max_backoff() -> Duration {
    Duration::from_secs(8)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            sbdb: None,
            nbdb: None,
            timeout: default_connect_timeout(),
            cluster_id: None,
            reconnect_backoff: default_reconnect_backoff(),
            reconnect_max_backoff: default_reconnect_max_backoff(),
        }
    }
}

/// Resolved connection target: which schema, and where
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseTarget {
    pub schema: SchemaIdentity,
    pub remotes: Vec<Remote>,
}

impl DatabaseConfig {
    /// Exactly one of `sbdb`/`nbdb` must be set.
    pub fn target(&self) -> Result<DatabaseTarget> {
        let sbdb = self.sbdb.as_deref().filter(|s| !s.is_empty());
        let nbdb = self.nbdb.as_deref().filter(|s| !s.is_empty());

        let (schema, connection) = match (sbdb, nbdb) {
            (Some(sb), None) => (SchemaIdentity::Southbound, sb),
            (None, Some(nb)) => (SchemaIdentity::Northbound, nb),
            _ => {
                return Err(ExporterError::config(
                    "Only NBDB or SBDB usage possible. --nbdb and --sbdb parameter \
                     cannot be used together and one of them is required",
                ))
            }
        };

        Ok(DatabaseTarget {
            schema,
            remotes: Remote::parse_list(connection)?,
        })
    }
}

/// One OVSDB remote
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remote {
    Tcp { host: String, port: u16 },
    Unix { path: String },
}

impl Remote {
    /// Parse an OVSDB connection string such as `tcp:10.0.0.1:6642`
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        let (method, rest) = s
            .split_once(':')
            .ok_or_else(|| ExporterError::config(format!("Invalid connection string '{}'", s)))?;

        match method {
            "tcp" => {
                let (host, port) = rest.rsplit_once(':').ok_or_else(|| {
                    ExporterError::config(format!("Missing port in connection string '{}'", s))
                })?;
                let port = port.parse().map_err(|_| {
                    ExporterError::config(format!("Invalid port in connection string '{}'", s))
                })?;
                let host = host.trim_start_matches('[').trim_end_matches(']');
                if host.is_empty() {
                    return Err(ExporterError::config(format!(
                        "Missing host in connection string '{}'",
                        s
                    )));
                }
                Ok(Self::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            "unix" if !rest.is_empty() => Ok(Self::Unix {
                path: rest.to_string(),
            }),
            "ssl" => Err(ExporterError::config(format!(
                "SSL remotes are not supported: '{}'",
                s
            ))),
            _ => Err(ExporterError::config(format!(
                "Unsupported connection string '{}'",
                s
            ))),
        }
    }

    /// Parse a comma-separated list of remotes
    pub fn parse_list(s: &str) -> Result<Vec<Self>> {
        let remotes = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Self::parse)
            .collect::<Result<Vec<_>>>()?;
        if remotes.is_empty() {
            return Err(ExporterError::config("Empty connection string"));
        }
        Ok(remotes)
    }
}

impl fmt::Display for Remote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp { host, port } if host.contains(':') => write!(f, "tcp:[{}]:{}", host, port),
            Self::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
            Self::Unix { path } => write!(f, "unix:{}", path),
        }
    }
}

// ============================================================================
// HTTP Configuration
// ============================================================================

/// Metrics listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Listen port
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_port() -> u16 {
    9000
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            bind_port: default_bind_port(),
        }
    }
}

impl HttpConfig {
    /// `host:port` string suitable for `TcpListener::bind`
    pub fn listen_addr(&self) -> String {
        if self.bind_address.contains(':') && !self.bind_address.starts_with('[') {
            format!("[{}]:{}", self.bind_address, self.bind_port)
        } else {
            format!("{}:{}", self.bind_address, self.bind_port)
        }
    }
}

// ============================================================================
// Leadership Configuration
// ============================================================================

/// Leadership tracking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadershipConfig {
    /// How often the status table is re-evaluated
    #[serde(with = "humantime_serde", default = "default_check_interval")]
    pub check_interval: Duration,

    /// How often the exposition gate follows the leadership flag
    #[serde(with = "humantime_serde", default = "default_gate_interval")]
    pub gate_interval: Duration,
}

fn default_check_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_gate_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for LeadershipConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            gate_interval: default_gate_interval(),
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log format: "json" or "pretty"
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Configuration Loading
// ============================================================================

impl ExporterConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&str>) -> std::result::Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        // Add default values
        builder = builder.add_source(config::Config::try_from(&Self::default())?);

        // Add config file if specified
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }

        // Add environment variables with prefix OVN_EXPORTER__
        builder = builder.add_source(
            config::Environment::with_prefix("OVN_EXPORTER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_cli_defaults() {
        let config = ExporterConfig::default();
        assert_eq!(config.http.bind_port, 9000);
        assert_eq!(config.http.bind_address, "0.0.0.0");
        assert_eq!(config.database.timeout, Duration::from_secs(30));
        assert_eq!(config.database.reconnect_backoff, Duration::from_secs(1));
        assert_eq!(config.database.reconnect_max_backoff, Duration::from_secs(8));
        assert_eq!(config.leadership.check_interval, Duration::from_secs(60));
        assert_eq!(config.leadership.gate_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_target_requires_exactly_one_database() {
        let mut db = DatabaseConfig::default();
        assert!(matches!(db.target(), Err(ExporterError::Configuration { .. })));

        db.sbdb = Some("tcp:127.0.0.1:6642".to_string());
        db.nbdb = Some("tcp:127.0.0.1:6641".to_string());
        assert!(matches!(db.target(), Err(ExporterError::Configuration { .. })));

        db.nbdb = None;
        let target = db.target().unwrap();
        assert_eq!(target.schema, SchemaIdentity::Southbound);
        assert_eq!(
            target.remotes,
            vec![Remote::Tcp {
                host: "127.0.0.1".to_string(),
                port: 6642
            }]
        );

        db.sbdb = None;
        db.nbdb = Some("unix:/var/run/ovn/ovnnb_db.sock".to_string());
        assert_eq!(db.target().unwrap().schema, SchemaIdentity::Northbound);
    }

    #[test]
    fn test_remote_parsing() {
        assert_eq!(
            Remote::parse("tcp:[fd00::1]:6641").unwrap(),
            Remote::Tcp {
                host: "fd00::1".to_string(),
                port: 6641
            }
        );
        assert_eq!(
            Remote::parse("tcp:[fd00::1]:6641").unwrap().to_string(),
            "tcp:[fd00::1]:6641"
        );
        assert!(Remote::parse("ssl:10.0.0.1:6641").is_err());
        assert!(Remote::parse("tcp:10.0.0.1").is_err());
        assert!(Remote::parse("tcp:10.0.0.1:http").is_err());
        assert!(Remote::parse("10.0.0.1:6641").is_err());

        let list = Remote::parse_list("tcp:10.0.0.1:6642,tcp:10.0.0.2:6642").unwrap();
        assert_eq!(list.len(), 2);
        assert!(Remote::parse_list(" , ").is_err());
    }

    #[test]
    fn test_listen_addr() {
        let mut http = HttpConfig::default();
        assert_eq!(http.listen_addr(), "0.0.0.0:9000");
        http.bind_address = "::".to_string();
        assert_eq!(http.listen_addr(), "[::]:9000");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = ExporterConfig::load(None).unwrap();
        assert_eq!(config.http.bind_port, 9000);
        assert_eq!(config.observability.log_format, "json");
    }
}
