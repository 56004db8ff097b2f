//! Exposition gate and HTTP surface
//!
//! Only the leader serves real metrics. Other members answer scrapes with a
//! fixed placeholder so they stay reachable for health checks without
//! publishing counts that would be double-counted across the cluster.

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use ovn_exporter_core::prelude::*;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Body served by non-leaders
pub const PLACEHOLDER_BODY: &str = "### I wish I could be a leader\n";

const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const PLACEHOLDER_CONTENT_TYPE: &str = "text/plain";

/// Handler variant currently served
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exposition {
    Metrics,
    Placeholder,
}

/// Result of one gate tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateTransition {
    SwitchedToMetrics,
    SwitchedToPlaceholder,
    Unchanged,
}

/// Selects which variant scrapes receive
///
/// Starts on the placeholder; only [`ExpositionGate::tick`] moves it.
#[derive(Debug, Default)]
pub struct ExpositionGate {
    serving_metrics: AtomicBool,
}

impl ExpositionGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Exposition {
        if self.serving_metrics.load(Ordering::Acquire) {
            Exposition::Metrics
        } else {
            Exposition::Placeholder
        }
    }

    /// Follow the leadership flag
    pub fn tick(&self, leader: bool) -> GateTransition {
        let was_serving = self.serving_metrics.swap(leader, Ordering::AcqRel);
        match (was_serving, leader) {
            (false, true) => {
                info!("Leader: exposing metrics");
                GateTransition::SwitchedToMetrics
            }
            (true, false) => {
                info!("Not leader: serving placeholder");
                GateTransition::SwitchedToPlaceholder
            }
            _ => GateTransition::Unchanged,
        }
    }
}

/// HTTP state: the gate plus a renderer for the registry contents
#[derive(Clone)]
pub struct ExpositionState {
    pub gate: Arc<ExpositionGate>,
    pub render: Arc<dyn Fn() -> String + Send + Sync>,
}

async fn scrape(State(state): State<ExpositionState>) -> impl IntoResponse {
    match state.gate.current() {
        Exposition::Metrics => ([(CONTENT_TYPE, METRICS_CONTENT_TYPE)], (state.render)()),
        Exposition::Placeholder => (
            [(CONTENT_TYPE, PLACEHOLDER_CONTENT_TYPE)],
            PLACEHOLDER_BODY.to_string(),
        ),
    }
}

/// Routes for the metrics listener
pub fn router(state: ExpositionState) -> Router {
    Router::new()
        .route("/", get(scrape))
        .route("/metrics", get(scrape))
        .with_state(state)
}

/// Running metrics listener
pub struct MetricsServer {
    local_addr: SocketAddr,
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<std::io::Result<()>>,
}

impl MetricsServer {
    /// Bind `listen` and serve in the background
    pub async fn start(listen: &str, state: ExpositionState) -> Result<Self> {
        let listener = TcpListener::bind(listen).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, rx) = oneshot::channel::<()>();

        let app = router(state);
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = rx.await;
                })
                .await
        });

        info!(listen = %local_addr, "Metrics listener started");
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown.send(());
        match self.task.await {
            Ok(Ok(())) => {
                debug!("Metrics listener stopped");
                Ok(())
            }
            Ok(Err(e)) => Err(ExporterError::Io(e)),
            Err(e) => Err(ExporterError::Http {
                message: format!("Metrics listener task failed: {}", e),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn state(gate: Arc<ExpositionGate>) -> ExpositionState {
        ExpositionState {
            gate,
            render: Arc::new(|| "ovn_events_total{schema=\"southbound\"} 3\n".to_string()),
        }
    }

    async fn get_body(app: Router, path: &str) -> (StatusCode, String, String) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response.headers()[CONTENT_TYPE].to_str().unwrap().to_string();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, content_type, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn test_gate_transitions() {
        let gate = ExpositionGate::new();
        assert_eq!(gate.current(), Exposition::Placeholder);

        assert_eq!(gate.tick(false), GateTransition::Unchanged);
        assert_eq!(gate.tick(true), GateTransition::SwitchedToMetrics);
        assert_eq!(gate.current(), Exposition::Metrics);
        assert_eq!(gate.tick(true), GateTransition::Unchanged);
        assert_eq!(gate.tick(true), GateTransition::Unchanged);
        assert_eq!(gate.tick(false), GateTransition::SwitchedToPlaceholder);
        assert_eq!(gate.current(), Exposition::Placeholder);
        assert_eq!(gate.tick(false), GateTransition::Unchanged);
    }

    #[tokio::test]
    async fn test_non_leader_serves_placeholder() {
        let gate = Arc::new(ExpositionGate::new());
        let (status, content_type, body) = get_body(router(state(gate)), "/metrics").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type, "text/plain");
        assert_eq!(body, PLACEHOLDER_BODY);
    }

    #[tokio::test]
    async fn test_leader_serves_rendered_metrics() {
        let gate = Arc::new(ExpositionGate::new());
        gate.tick(true);

        for path in ["/", "/metrics"] {
            let (status, content_type, body) = get_body(router(state(gate.clone())), path).await;
            assert_eq!(status, StatusCode::OK);
            assert!(content_type.starts_with("text/plain"));
            assert!(body.contains("ovn_events_total"));
        }
    }

    #[tokio::test]
    async fn test_unknown_path_is_not_found() {
        let gate = Arc::new(ExpositionGate::new());
        let response = router(state(gate))
            .oneshot(Request::builder().uri("/admin").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_server_graceful_shutdown() {
        let gate = Arc::new(ExpositionGate::new());
        let server = MetricsServer::start("127.0.0.1:0", state(gate)).await.unwrap();
        assert_ne!(server.local_addr().port(), 0);
        server.shutdown().await.unwrap();
    }
}
