//! OVN Event Exporter CLI
//!
//! Exports OVN database change events as Prometheus metrics from the cluster
//! leader only.

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use ovn_event_exporter::{shutdown, Exporter, MetricsRenderer};
use ovn_exporter_core::prelude::*;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "ovn-event-exporter")]
#[command(about = "Export OVN events from OVN Southbound or Northbound database")]
#[command(version)]
struct Args {
    /// OVN Southbound OVSDB connection string
    #[arg(long, env = "OVN_SBDB")]
    sbdb: Option<String>,

    /// OVN Northbound OVSDB connection string
    #[arg(long, env = "OVN_NBDB")]
    nbdb: Option<String>,

    /// Metrics exposing TCP port [default: 9000]
    #[arg(long = "bind_port", env = "BIND_PORT")]
    bind_port: Option<u16>,

    /// Metrics exposing IP address [default: 0.0.0.0]
    #[arg(long = "bind_address", env = "BIND_ADDRESS")]
    bind_address: Option<String>,

    /// OVS DB connection timeout in seconds [default: 30]
    #[arg(long, env = "OVSDB_TIMEOUT")]
    timeout: Option<u64>,

    /// Select the server status row by cluster id prefix
    #[arg(long = "cluster_id", env = "OVN_CLUSTER_ID")]
    cluster_id: Option<String>,

    /// Configuration file path
    #[arg(short, long, env = "OVN_EXPORTER_CONFIG")]
    config: Option<String>,

    /// Log format: json or pretty
    #[arg(long = "log_format", env = "LOG_FORMAT")]
    log_format: Option<String>,

    /// Set logging level to DEBUG
    #[arg(long)]
    debug: bool,
}

impl Args {
    /// Apply command-line values over file/env configuration
    fn apply(&self, config: &mut ExporterConfig) {
        if self.sbdb.is_some() {
            config.database.sbdb = self.sbdb.clone();
        }
        if self.nbdb.is_some() {
            config.database.nbdb = self.nbdb.clone();
        }
        if let Some(timeout) = self.timeout {
            config.database.timeout = Duration::from_secs(timeout);
        }
        if self.cluster_id.is_some() {
            config.database.cluster_id = self.cluster_id.clone();
        }
        if let Some(port) = self.bind_port {
            config.http.bind_port = port;
        }
        if let Some(ref address) = self.bind_address {
            config.http.bind_address = address.clone();
        }
        if let Some(ref format) = self.log_format {
            config.observability.log_format = format.clone();
        }
        if self.debug {
            config.observability.log_level = "debug".to_string();
        }
    }
}

/// Defaults, then file, then environment, then flags
fn load_config(args: &Args) -> anyhow::Result<ExporterConfig> {
    let mut config = ExporterConfig::load(args.config.as_deref()).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            args.config.as_deref().unwrap_or("environment")
        )
    })?;
    args.apply(&mut config);
    Ok(config)
}

/// `--debug` wins over `RUST_LOG`, which wins over the configured level
fn log_directives(config: &ExporterConfig, debug: bool, env: Option<String>) -> String {
    if debug {
        return "debug".to_string();
    }
    env.filter(|directives| !directives.is_empty())
        .unwrap_or_else(|| config.observability.log_level.clone())
}

fn init_tracing(config: &ExporterConfig, debug: bool) {
    let directives = log_directives(config, debug, std::env::var(EnvFilter::DEFAULT_ENV).ok());
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.observability.log_format == "pretty" {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config, args.debug);
    debug!("Logging level set to {}", config.observability.log_level);
    debug!(args = ?args, "Provided arguments");

    // Reject conflicting flags before any connection attempt
    if let Err(e) = config.database.target() {
        error!(error = %e, "Invalid database selection");
        return ExitCode::FAILURE;
    }

    let prometheus = match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => handle,
        Err(e) => {
            error!(error = %e, "Failed to install metrics recorder");
            return ExitCode::FAILURE;
        }
    };
    ovn_exporter_core::describe_metrics();
    let render: MetricsRenderer = Arc::new(move || prometheus.render());

    let signal = match shutdown::install_signal_handlers() {
        Ok(signal) => signal,
        Err(e) => {
            error!(error = %e, "Failed to install signal handlers");
            return ExitCode::FAILURE;
        }
    };

    let exporter = match Exporter::start(&config, render).await {
        Ok(exporter) => exporter,
        Err(e) => {
            error!(error = %e, "Cannot connect to OVS DB. Check parameters");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %exporter.metrics_addr(),
        schema = %exporter.schema(),
        "Exporter running"
    );

    match exporter.run_until(signal).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Exporter stopped with error");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_databases_rejected_before_connecting() {
        let args = Args::parse_from([
            "ovn-event-exporter",
            "--sbdb",
            "tcp:127.0.0.1:6642",
            "--nbdb",
            "tcp:127.0.0.1:6641",
        ]);
        let mut config = ExporterConfig::default();
        args.apply(&mut config);
        assert!(matches!(
            config.database.target(),
            Err(ExporterError::Configuration { .. })
        ));
    }

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::parse_from([
            "ovn-event-exporter",
            "--nbdb=tcp:127.0.0.1:6641",
            "--bind_port=9100",
            "--bind_address=127.0.0.1",
            "--timeout=5",
            "--debug",
        ]);
        let mut config = ExporterConfig::default();
        args.apply(&mut config);

        assert_eq!(config.http.listen_addr(), "127.0.0.1:9100");
        assert_eq!(config.database.timeout, Duration::from_secs(5));
        assert_eq!(config.observability.log_level, "debug");
        assert_eq!(config.database.target().unwrap().schema, SchemaIdentity::Northbound);
    }

    #[test]
    fn test_debug_flag_overrides_rust_log() {
        let config = ExporterConfig::default();
        assert_eq!(log_directives(&config, true, Some("warn".to_string())), "debug");
        assert_eq!(log_directives(&config, false, Some("warn".to_string())), "warn");
        assert_eq!(log_directives(&config, false, Some(String::new())), "info");
        assert_eq!(log_directives(&config, false, None), "info");
    }

    #[test]
    fn test_defaults_without_flags() {
        let args = Args::parse_from(["ovn-event-exporter", "--sbdb=unix:/run/ovn/ovnsb_db.sock"]);
        let mut config = ExporterConfig::default();
        args.apply(&mut config);

        assert_eq!(config.http.bind_port, 9000);
        assert_eq!(config.http.bind_address, "0.0.0.0");
        assert_eq!(config.database.timeout, Duration::from_secs(30));
        assert_eq!(config.observability.log_level, "info");
    }
}
