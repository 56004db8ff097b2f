//! # OVN Event Exporter
//!
//! Counts row changes in an OVN northbound or southbound database and
//! exposes them as Prometheus metrics, but only while the attached server is
//! the cluster leader (or a standalone server).
//!
//! ## Components
//!
//! - `ovsdb`: JSON-RPC monitor client, the source of row changes and status rows
//! - `notification`: sink turning row changes into counter increments
//! - `leader`: periodic leadership check writing the shared flag
//! - `exposition`: gate choosing metrics or placeholder, and the HTTP listener
//!
//! ## Usage
//!
//! ```rust,ignore
//! let exporter = Exporter::start(&config, render).await?;
//! exporter.run_until(shutdown::install_signal_handlers()?).await?;
//! ```

pub mod exposition;
pub mod leader;
pub mod notification;
pub mod ovsdb;
pub mod shutdown;

pub use exposition::*;
pub use leader::*;
pub use notification::*;
pub use ovsdb::*;

use ovn_exporter_core::prelude::*;
use ovn_exporter_core::DatabaseTarget;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Renders the registry contents in the exposition format
pub type MetricsRenderer = Arc<dyn Fn() -> String + Send + Sync>;

/// Running exporter: connection, leadership monitor and metrics listener
pub struct Exporter {
    target: DatabaseTarget,
    sink: Arc<EventCounterSink>,
    client: Arc<OvsdbClient>,
    flag: LeadershipFlag,
    gate: Arc<ExpositionGate>,
    monitor: MonitorHandle,
    server: MetricsServer,
    gate_interval: Duration,
}

impl Exporter {
    /// Connect to the database and start serving.
    ///
    /// Fails fast: a configuration problem or a connection that does not
    /// come up within the configured timeout is returned, never retried.
    /// Once started, a lost connection is re-established in the background.
    pub async fn start(config: &ExporterConfig, render: MetricsRenderer) -> Result<Self> {
        let target = config.database.target()?;
        info!(
            schema = %target.schema,
            remotes = ?target.remotes.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Starting OVN event exporter"
        );

        let sink = Arc::new(EventCounterSink::new(target.schema));
        let client_config = OvsdbClientConfig::new(
            target.remotes.clone(),
            target.schema,
            config.database.timeout,
        )
        .with_reconnect_backoff(
            config.database.reconnect_backoff,
            config.database.reconnect_max_backoff,
        );
        let client = Arc::new(OvsdbClient::connect(client_config, sink.clone()).await?);

        let flag = LeadershipFlag::new();
        let selector = StatusSelector::new(config.database.cluster_id.as_deref(), target.schema.schema_name());
        let monitor = LeadershipMonitor::new(
            client.clone(),
            selector,
            flag.clone(),
            config.leadership.check_interval,
        )
        .spawn();

        let gate = Arc::new(ExpositionGate::new());
        let state = ExpositionState {
            gate: gate.clone(),
            render,
        };
        let server = match MetricsServer::start(&config.http.listen_addr(), state).await {
            Ok(server) => server,
            Err(e) => {
                monitor.cancel();
                if let Err(stop_err) = client.close().await {
                    warn!(error = %stop_err, "Error closing OVSDB connection");
                }
                return Err(e);
            }
        };

        Ok(Self {
            target,
            sink,
            client,
            flag,
            gate,
            monitor,
            server,
            gate_interval: config.leadership.gate_interval,
        })
    }

    pub fn metrics_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn schema(&self) -> SchemaIdentity {
        self.target.schema
    }

    /// Read side of the leadership flag
    pub fn leadership(&self) -> LeadershipFlag {
        self.flag.clone()
    }

    /// Follow the leadership flag until `shutdown` completes, then tear down.
    pub async fn run_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut ticker = tokio::time::interval(self.gate_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    // Counters do not advance while disconnected
                    let transition = self.gate.tick(self.flag.get() && self.client.is_running());
                    debug!(?transition, "Exposition gate tick");
                }
            }
        }

        self.shutdown().await
    }

    async fn shutdown(self) -> Result<()> {
        self.monitor.cancel();

        let server_result = self.server.shutdown().await;
        if let Err(ref e) = server_result {
            error!(error = %e, "Metrics listener did not stop cleanly");
        }

        self.client.close().await?;

        info!(
            schema = %self.target.schema,
            events = self.sink.delivered(),
            "OVN event exporter stopped"
        );
        server_result
    }
}
