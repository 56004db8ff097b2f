//! OVSDB JSON-RPC monitor client
//!
//! Keeps a read-only subscription to one OVN database and to the server's
//! `_Server.Database` status table. Row updates are classified and handed to a
//! [`ChangeHandler`]; status rows are cached for the leadership monitor.
//!
//! Only what the exporter needs from RFC 7047 is implemented: `get_schema`,
//! `monitor`, `update` notifications and `echo` replies.
//!
//! A lost connection is re-established in the background with doubling
//! backoff; every new session re-subscribes and receives the full table
//! contents again.

use async_trait::async_trait;
use bytes::{Buf, BytesMut};
use ovn_exporter_core::prelude::*;
use ovn_exporter_core::{DatabaseModel, ErrorContext, ErrorContextExt, Remote};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

/// Monitor id used for the change subscription
const CHANGES_MONITOR: &str = "ovn-events";
/// Monitor id used for the server status subscription
const SERVER_MONITOR: &str = "server-status";
/// Database and table the server publishes its status in
const SERVER_DATABASE: &str = "_Server";
const SERVER_TABLE: &str = "Database";

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;
type StatusRows = Arc<RwLock<Option<HashMap<String, DatabaseStatus>>>>;

/// OVSDB client configuration
#[derive(Debug, Clone)]
pub struct OvsdbClientConfig {
    /// Remotes, tried in order
    pub remotes: Vec<Remote>,
    /// Database to monitor (`OVN_Southbound` / `OVN_Northbound`)
    pub database: String,
    /// Bound on connect + schema fetch + initial monitor, per attempt
    pub timeout: Duration,
    /// First reconnect delay after a lost connection
    pub reconnect_backoff: Duration,
    /// Cap for the doubling reconnect delay
    pub reconnect_max_backoff: Duration,
}

impl OvsdbClientConfig {
    pub fn new(remotes: Vec<Remote>, schema: SchemaIdentity, timeout: Duration) -> Self {
        Self {
            remotes,
            database: schema.schema_name().to_string(),
            timeout,
            reconnect_backoff: Duration::from_secs(1),
            reconnect_max_backoff: Duration::from_secs(8),
        }
    }

    pub fn with_reconnect_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.reconnect_backoff = initial;
        self.reconnect_max_backoff = max.max(initial);
        self
    }
}

/// Which subscription a monitor reply or update belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonitorTarget {
    Changes,
    ServerStatus,
}

impl MonitorTarget {
    fn from_id(id: &Value) -> Option<Self> {
        match id.as_str()? {
            CHANGES_MONITOR => Some(Self::Changes),
            SERVER_MONITOR => Some(Self::ServerStatus),
            _ => None,
        }
    }
}

/// Outstanding request awaiting its reply
enum Pending {
    Call(oneshot::Sender<Result<Value>>),
    Monitor {
        target: MonitorTarget,
        done: oneshot::Sender<Result<()>>,
    },
}

impl Pending {
    fn fail(self, err: ExporterError) {
        match self {
            Self::Call(tx) => {
                let _ = tx.send(Err(err));
            }
            Self::Monitor { done, .. } => {
                let _ = done.send(Err(err));
            }
        }
    }
}

/// State shared between the client handle, the reader task and the
/// reconnect supervisor
struct Shared {
    config: OvsdbClientConfig,
    writer: tokio::sync::Mutex<Option<BoxedWriter>>,
    pending: Mutex<HashMap<u64, Pending>>,
    status: StatusRows,
    handler: Arc<dyn ChangeHandler>,
    connected: AtomicBool,
    next_id: AtomicU64,
}

impl Shared {
    fn new(config: OvsdbClientConfig, handler: Arc<dyn ChangeHandler>) -> Self {
        Self {
            config,
            writer: tokio::sync::Mutex::new(None),
            pending: Mutex::new(HashMap::new()),
            status: Arc::new(RwLock::new(None)),
            handler,
            connected: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
        }
    }

    async fn send(&self, message: &Value) -> Result<()> {
        let payload = serde_json::to_vec(message)
            .map_err(|e| ExporterError::protocol(format!("Failed to encode request: {}", e)))?;
        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| ExporterError::connection("Not connected to OVSDB server"))?;
        writer
            .write_all(&payload)
            .await
            .map_err(|e| ExporterError::connection_with_source("Failed to send request", e))?;
        writer
            .flush()
            .await
            .map_err(|e| ExporterError::connection_with_source("Failed to flush request", e))
    }

    fn register(&self, id: u64, pending: Pending) {
        if let Ok(mut map) = self.pending.lock() {
            map.insert(id, pending);
        }
    }

    fn take(&self, id: u64) -> Option<Pending> {
        self.pending.lock().ok().and_then(|mut map| map.remove(&id))
    }

    #[cfg(test)]
    fn pending_len(&self) -> usize {
        self.pending.lock().map(|map| map.len()).unwrap_or(0)
    }

    fn fail_all(&self, message: &str) {
        let drained: Vec<Pending> = match self.pending.lock() {
            Ok(mut map) => map.drain().map(|(_, p)| p).collect(),
            Err(_) => Vec::new(),
        };
        for pending in drained {
            pending.fail(ExporterError::connection(message));
        }
    }

    /// Close the socket, fail outstanding requests and forget status rows
    async fn disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(mut writer) = self.writer.lock().await.take() {
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "Error shutting down OVSDB socket");
            }
        }
        if let Ok(mut status) = self.status.write() {
            *status = None;
        }
        self.fail_all(reason);
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Send a request whose reply slot is already registered under `id`
    async fn request(&self, id: u64, method: &str, params: Value) -> Result<()> {
        let sent = self
            .send(&json!({ "method": method, "params": params, "id": id }))
            .await;
        if sent.is_err() {
            self.take(id);
        }
        sent
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_id();
        let (tx, rx) = oneshot::channel();
        self.register(id, Pending::Call(tx));
        self.request(id, method, params).await?;
        rx.await
            .map_err(|_| ExporterError::connection(format!("Connection closed awaiting {}", method)))?
    }

    async fn monitor(&self, target: MonitorTarget, params: Value) -> Result<()> {
        let id = self.next_id();
        let (done, rx) = oneshot::channel();
        self.register(id, Pending::Monitor { target, done });
        self.request(id, "monitor", params).await?;
        rx.await
            .map_err(|_| ExporterError::connection("Connection closed awaiting monitor reply"))?
    }

    async fn table_names(&self) -> Result<Vec<String>> {
        let schema = self.call("get_schema", json!([self.config.database])).await?;
        let tables = schema
            .get("tables")
            .and_then(Value::as_object)
            .ok_or_else(|| ExporterError::protocol("Schema has no tables"))?;
        Ok(tables.keys().cloned().collect())
    }

    async fn monitor_changes(&self, tables: &[String]) -> Result<()> {
        let requests: Map<String, Value> = tables
            .iter()
            .map(|table| (table.clone(), json!({})))
            .collect();
        self.monitor(
            MonitorTarget::Changes,
            json!([self.config.database, CHANGES_MONITOR, requests]),
        )
        .await
    }

    async fn monitor_server_status(&self) -> Result<()> {
        self.monitor(
            MonitorTarget::ServerStatus,
            json!([
                SERVER_DATABASE,
                SERVER_MONITOR,
                { SERVER_TABLE: { "columns": ["name", "model", "schema", "connected", "leader", "cid"] } }
            ]),
        )
        .await
    }

    async fn handle_message(&self, message: Value) {
        match message.get("method").and_then(Value::as_str) {
            Some("update") => self.handle_update(&message),
            Some("echo") => {
                let reply = json!({
                    "id": message.get("id").cloned().unwrap_or(Value::Null),
                    "result": message.get("params").cloned().unwrap_or_else(|| json!([])),
                    "error": Value::Null,
                });
                if let Err(e) = self.send(&reply).await {
                    warn!(error = %e, "Failed to answer echo");
                }
            }
            Some(method) => debug!(method, "Ignoring unsupported notification"),
            None => self.handle_response(message),
        }
    }

    fn handle_update(&self, message: &Value) {
        let params = message.get("params").and_then(Value::as_array);
        let (Some(id), Some(updates)) = (
            params.and_then(|p| p.first()),
            params.and_then(|p| p.get(1)),
        ) else {
            warn!(payload = %message, "Malformed update notification");
            return;
        };

        match MonitorTarget::from_id(id) {
            Some(MonitorTarget::Changes) => {
                dispatch_table_updates(updates, self.handler.as_ref());
            }
            Some(MonitorTarget::ServerStatus) => apply_status_updates(&self.status, updates),
            None => debug!(monitor = %id, "Update for unknown monitor"),
        }
    }

    fn handle_response(&self, message: Value) {
        let Some(id) = message.get("id").and_then(Value::as_u64) else {
            warn!(payload = %message, "Response without numeric id");
            return;
        };
        let Some(pending) = self.take(id) else {
            debug!(id, "Response for unknown request");
            return;
        };

        let error = message.get("error").filter(|e| !e.is_null());
        if let Some(error) = error {
            pending.fail(ExporterError::protocol(format!("Server returned error: {}", error)));
            return;
        }

        let result = message.get("result").cloned().unwrap_or(Value::Null);
        match pending {
            Pending::Call(tx) => {
                let _ = tx.send(Ok(result));
            }
            Pending::Monitor { target, done } => {
                match target {
                    MonitorTarget::Changes => {
                        let delivered = dispatch_table_updates(&result, self.handler.as_ref());
                        info!(rows = delivered, "Initial database contents received");
                    }
                    MonitorTarget::ServerStatus => {
                        if let Ok(mut status) = self.status.write() {
                            status.get_or_insert_with(HashMap::new);
                        }
                        apply_status_updates(&self.status, &result);
                    }
                }
                let _ = done.send(Ok(()));
            }
        }
    }
}

/// Reader task of one connection, aborted when dropped
struct ReaderTask(JoinHandle<()>);

impl Drop for ReaderTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// One established connection with both subscriptions in place
struct Session {
    remote: Remote,
    reader: ReaderTask,
}

/// Open a connection, fetch the schema and subscribe.
///
/// Any early return drops the reader task, which aborts it. The caller
/// still has to [`Shared::disconnect`] to release the socket.
async fn open_session(shared: &Arc<Shared>) -> Result<Session> {
    let (remote, reader, writer) = open_first(&shared.config.remotes).await?;
    info!(remote = %remote, database = %shared.config.database, "Connected to OVSDB server");

    *shared.writer.lock().await = Some(writer);
    shared.connected.store(true, Ordering::SeqCst);
    let reader = ReaderTask(tokio::spawn(read_loop(reader, shared.clone())));

    let tables = shared.table_names().await?;
    debug!(tables = ?tables, "Monitoring all tables");
    shared.monitor_changes(&tables).await?;

    if let Err(e) = shared.monitor_server_status().await {
        warn!(error = %e, "Server status table unavailable; leadership cannot be determined");
    }

    Ok(Session { remote, reader })
}

/// Wait for the session to end, then reconnect with doubling backoff.
///
/// A fresh session re-delivers the full table contents as creates.
async fn supervise(shared: Arc<Shared>, mut session: Session) {
    loop {
        let _ = (&mut session.reader.0).await;
        shared.disconnect("connection lost").await;

        let mut delay = shared.config.reconnect_backoff;
        let mut attempt: u32 = 1;
        session = loop {
            tokio::time::sleep(delay).await;
            match tokio::time::timeout(shared.config.timeout, open_session(&shared)).await {
                Ok(Ok(session)) => {
                    info!(remote = %session.remote, attempt, "Reconnected to OVSDB server; resynchronizing");
                    break session;
                }
                Ok(Err(e)) => warn!(error = %e, attempt, "OVSDB reconnect failed"),
                Err(_) => warn!(attempt, timeout = ?shared.config.timeout, "OVSDB reconnect timed out"),
            }
            shared.disconnect("reconnect failed").await;
            delay = (delay * 2).min(shared.config.reconnect_max_backoff);
            attempt = attempt.saturating_add(1);
        };
    }
}

/// OVSDB monitor client
///
/// Keeps the subscription alive across connection losses until stopped.
pub struct OvsdbClient {
    shared: Arc<Shared>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl OvsdbClient {
    /// Connect, fetch the schema and subscribe to every table.
    ///
    /// The initial attempt is bounded by `config.timeout` and not retried.
    /// Reconnects happen only after a session has been established once.
    pub async fn connect(config: OvsdbClientConfig, handler: Arc<dyn ChangeHandler>) -> Result<Self> {
        let timeout = config.timeout;
        let shared = Arc::new(Shared::new(config, handler));
        let database = shared.config.database.clone();

        let session = match tokio::time::timeout(timeout, open_session(&shared)).await {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => {
                shared.disconnect("connect failed").await;
                return Err(e).with_context(ErrorContext {
                    component: "ovsdb_client",
                    operation: "connect".to_string(),
                    database: Some(database),
                    table: None,
                });
            }
            Err(_) => {
                shared.disconnect("connect timed out").await;
                return Err(ExporterError::timeout(
                    format!("connecting to {}", database),
                    timeout.as_millis() as u64,
                ));
            }
        };

        let supervisor = tokio::spawn(supervise(shared.clone(), session));
        Ok(Self {
            shared,
            supervisor: Mutex::new(Some(supervisor)),
            stopped: AtomicBool::new(false),
        })
    }

    /// Drop the subscription and close the socket
    pub async fn close(&self) -> Result<()> {
        self.stop().await
    }
}

impl Drop for OvsdbClient {
    fn drop(&mut self) {
        if let Some(task) = self.supervisor.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
    }
}

#[async_trait]
impl Lifecycle for OvsdbClient {
    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let supervisor = self.supervisor.lock().ok().and_then(|mut s| s.take());
        if let Some(task) = supervisor {
            task.abort();
            let _ = task.await;
        }
        self.shared.disconnect("client stopped").await;
        info!(database = %self.shared.config.database, "OVSDB connection closed");
        Ok(())
    }

    /// True while a session is established
    fn is_running(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst) && self.shared.connected.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for OvsdbClient {
    async fn database_status(&self) -> Result<Vec<DatabaseStatus>> {
        let status = self
            .shared
            .status
            .read()
            .map_err(|_| ExporterError::Internal("status cache poisoned".to_string()))?;
        match status.as_ref() {
            Some(rows) => Ok(rows.values().cloned().collect()),
            None => Err(ExporterError::status_unavailable(format!(
                "{} table not received from server",
                SERVER_TABLE
            ))),
        }
    }

    fn database_name(&self) -> &str {
        &self.shared.config.database
    }
}

async fn open_first(remotes: &[Remote]) -> Result<(Remote, BoxedReader, BoxedWriter)> {
    let mut last_err = ExporterError::config("No OVSDB remotes configured");
    for remote in remotes {
        match open(remote).await {
            Ok((reader, writer)) => return Ok((remote.clone(), reader, writer)),
            Err(e) => {
                warn!(remote = %remote, error = %e, "Failed to connect to OVSDB remote");
                last_err = ExporterError::connection_with_source(format!("Cannot connect to {}", remote), e);
            }
        }
    }
    Err(last_err)
}

async fn open(remote: &Remote) -> std::io::Result<(BoxedReader, BoxedWriter)> {
    match remote {
        Remote::Tcp { host, port } => {
            let stream = tokio::net::TcpStream::connect((host.as_str(), *port)).await?;
            stream.set_nodelay(true)?;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
        #[cfg(unix)]
        Remote::Unix { path } => {
            let stream = tokio::net::UnixStream::connect(path).await?;
            let (r, w) = stream.into_split();
            Ok((Box::new(r), Box::new(w)))
        }
        #[cfg(not(unix))]
        Remote::Unix { .. } => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "unix sockets are not supported on this platform",
        )),
    }
}

async fn read_loop(mut reader: BoxedReader, shared: Arc<Shared>) {
    let mut buf = BytesMut::with_capacity(64 * 1024);
    let reason = loop {
        match reader.read_buf(&mut buf).await {
            Ok(0) => break "connection closed by server".to_string(),
            Ok(n) => trace!(bytes = n, "Read from OVSDB socket"),
            Err(e) => break e.to_string(),
        }
        match decode_messages(&mut buf) {
            Ok(messages) => {
                for message in messages {
                    shared.handle_message(message).await;
                }
            }
            Err(e) => break e.to_string(),
        }
    };

    if shared.connected.swap(false, Ordering::SeqCst) {
        error!(reason = %reason, "OVSDB connection lost");
    }
    if let Ok(mut status) = shared.status.write() {
        *status = None;
    }
    shared.fail_all(&reason);
}

/// Split complete JSON values off the front of `buf`.
///
/// OVSDB frames messages by concatenation, so a partial value at the end of
/// the buffer is left in place for the next read.
pub fn decode_messages(buf: &mut BytesMut) -> Result<Vec<Value>> {
    let mut messages = Vec::new();
    let consumed = {
        let mut stream = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<Value>();
        loop {
            match stream.next() {
                Some(Ok(value)) => messages.push(value),
                Some(Err(e)) if e.is_eof() => break,
                Some(Err(e)) => return Err(ExporterError::protocol(format!("Invalid JSON: {}", e))),
                None => break,
            }
        }
        stream.byte_offset()
    };
    buf.advance(consumed);
    Ok(messages)
}

/// Feed every row of a `<table-updates>` object to the handler.
///
/// Returns the number of notifications delivered. Malformed entries are
/// logged and skipped.
pub fn dispatch_table_updates(updates: &Value, handler: &dyn ChangeHandler) -> usize {
    let Some(tables) = updates.as_object() else {
        warn!(updates = %updates, "Table updates are not an object");
        return 0;
    };

    let mut delivered = 0;
    for (table, rows) in tables {
        let Some(rows) = rows.as_object() else {
            warn!(table = %table, "Row updates are not an object");
            continue;
        };
        for (uuid, row) in rows {
            let has_old = row.get("old").is_some_and(|v| !v.is_null());
            let has_new = row.get("new").is_some_and(|v| !v.is_null());
            match RowEvent::from_presence(has_old, has_new) {
                Some(event) => {
                    handler.on_row_change(RowChange::new(table.clone(), uuid.clone(), event));
                    delivered += 1;
                }
                None => warn!(table = %table, uuid = %uuid, "Row update without old or new"),
            }
        }
    }
    delivered
}

fn apply_status_updates(status: &StatusRows, updates: &Value) {
    let Some(rows) = updates.get(SERVER_TABLE).and_then(Value::as_object) else {
        return;
    };
    let Ok(mut guard) = status.write() else {
        return;
    };
    let cache = guard.get_or_insert_with(HashMap::new);

    for (uuid, row) in rows {
        match row.get("new").filter(|v| !v.is_null()) {
            Some(new) => match parse_database_row(new) {
                Some(parsed) => {
                    trace!(uuid = %uuid, database = %parsed.name, "Status row updated");
                    cache.insert(uuid.clone(), parsed);
                }
                None => warn!(uuid = %uuid, "Malformed Database status row"),
            },
            None => {
                cache.remove(uuid);
            }
        }
    }
}

/// Decode one `_Server.Database` row
pub fn parse_database_row(row: &Value) -> Option<DatabaseStatus> {
    Some(DatabaseStatus {
        name: row.get("name")?.as_str()?.to_string(),
        model: DatabaseModel::parse(row.get("model").and_then(Value::as_str).unwrap_or("standalone")),
        schema_present: row.get("schema").is_some_and(|v| !atoms(v).is_empty()),
        connected: row.get("connected").and_then(Value::as_bool).unwrap_or(false),
        leader: row.get("leader").and_then(Value::as_bool).unwrap_or(false),
        cluster_ids: row
            .get("cid")
            .map(|v| atoms(v).into_iter().filter_map(atom_string).collect())
            .unwrap_or_default(),
    })
}

/// Flatten an OVSDB `<value>`: a set yields its members, an atom itself.
fn atoms(value: &Value) -> Vec<&Value> {
    match value.as_array().map(Vec::as_slice) {
        Some([tag, members]) if tag == "set" => members.as_array().map(|m| m.iter().collect()).unwrap_or_default(),
        _ => vec![value],
    }
}

/// String form of an atom: plain strings, or `["uuid", "..."]`.
fn atom_string(atom: &Value) -> Option<String> {
    match atom {
        Value::String(s) => Some(s.clone()),
        Value::Array(pair) => match pair.as_slice() {
            [tag, Value::String(id)] if tag == "uuid" || tag == "named-uuid" => Some(id.clone()),
            _ => None,
        },
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording(Mutex<Vec<RowChange>>);

    impl ChangeHandler for Recording {
        fn on_row_change(&self, change: RowChange) {
            self.0.lock().unwrap().push(change);
        }
    }

    fn shared() -> Shared {
        let config = OvsdbClientConfig::new(
            vec![Remote::Tcp {
                host: "127.0.0.1".to_string(),
                port: 6642,
            }],
            SchemaIdentity::Southbound,
            Duration::from_secs(1),
        );
        Shared::new(config, Arc::new(Recording::default()))
    }

    #[tokio::test]
    async fn test_failed_send_releases_reply_slot() {
        let shared = shared();

        let err = shared.call("get_schema", json!(["OVN_Southbound"])).await.unwrap_err();
        assert!(matches!(err, ExporterError::Connection { .. }));
        assert_eq!(shared.pending_len(), 0);

        let err = shared.monitor_server_status().await.unwrap_err();
        assert!(matches!(err, ExporterError::Connection { .. }));
        assert_eq!(shared.pending_len(), 0);
    }

    #[test]
    fn test_reconnect_backoff_cap_not_below_initial() {
        let config = OvsdbClientConfig::new(vec![], SchemaIdentity::Northbound, Duration::from_secs(1))
            .with_reconnect_backoff(Duration::from_secs(4), Duration::from_secs(2));
        assert_eq!(config.reconnect_max_backoff, Duration::from_secs(4));
    }

    #[test]
    fn test_decode_keeps_partial_tail() {
        let mut buf = BytesMut::from(&br#"{"id":1,"result":{}}{"method":"echo","par"#[..]);
        let messages = decode_messages(&mut buf).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(&buf[..], br#"{"method":"echo","par"#);

        buf.extend_from_slice(br#"ams":[],"id":"echo"}"#);
        let messages = decode_messages(&mut buf).unwrap();
        assert_eq!(messages[0]["method"], "echo");
        assert!(buf.is_empty());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let mut buf = BytesMut::from(&b"}{"[..]);
        assert!(decode_messages(&mut buf).is_err());
    }

    #[test]
    fn test_dispatch_classifies_rows() {
        let handler = Recording::default();
        let updates = json!({
            "Port_Binding": {
                "a": { "new": { "logical_port": "lsp1" } },
                "b": { "old": { "chassis": ["set", []] }, "new": { "logical_port": "lsp2" } },
                "c": { "old": { "logical_port": "lsp3" } }
            },
            "Chassis": {
                "d": {}
            }
        });

        assert_eq!(dispatch_table_updates(&updates, &handler), 3);

        let mut seen = handler.0.into_inner().unwrap();
        seen.sort_by(|x, y| x.row_uuid.cmp(&y.row_uuid));
        assert_eq!(seen[0].event, RowEvent::Create);
        assert_eq!(seen[1].event, RowEvent::Update);
        assert_eq!(seen[2].event, RowEvent::Delete);
        assert!(seen.iter().all(|c| c.table == "Port_Binding"));
    }

    #[test]
    fn test_parse_database_row() {
        let row = json!({
            "name": "OVN_Southbound",
            "model": "clustered",
            "schema": "{\"name\":\"OVN_Southbound\"}",
            "connected": true,
            "leader": false,
            "cid": ["uuid", "8d2a7f0c-31a4-4c3e-9d55-0b0e5f1f2a11"]
        });
        let parsed = parse_database_row(&row).unwrap();
        assert_eq!(parsed.model, DatabaseModel::Clustered);
        assert!(parsed.schema_present);
        assert!(parsed.connected);
        assert!(!parsed.leader);
        assert_eq!(parsed.cluster_ids, vec!["8d2a7f0c-31a4-4c3e-9d55-0b0e5f1f2a11"]);

        let standalone = json!({
            "name": "_Server",
            "model": "standalone",
            "schema": ["set", []],
            "connected": true,
            "leader": true,
            "cid": ["set", []]
        });
        let parsed = parse_database_row(&standalone).unwrap();
        assert!(!parsed.schema_present);
        assert!(parsed.cluster_ids.is_empty());

        assert!(parse_database_row(&json!({ "model": "relay" })).is_none());
    }

    #[test]
    fn test_status_updates_insert_and_delete() {
        let status: StatusRows = Arc::new(RwLock::new(None));
        apply_status_updates(
            &status,
            &json!({ "Database": { "u1": { "new": { "name": "OVN_Northbound", "model": "standalone" } } } }),
        );
        assert_eq!(status.read().unwrap().as_ref().unwrap().len(), 1);

        apply_status_updates(
            &status,
            &json!({ "Database": { "u1": { "old": { "name": "OVN_Northbound" } } } }),
        );
        assert!(status.read().unwrap().as_ref().unwrap().is_empty());
    }
}
