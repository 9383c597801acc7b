//! # Serve Mode
//!
//! Exposes the [`Workbench`] operations as a JSON-lines protocol over any byte stream (stdin and
//! stdout in practice), so a front end in another process can drive per-tab sessions.
//!
//! Every request line is an object with an `op` tag, the operation arguments and an optional
//! `id`. Every reply line echoes the `id` next to the usual envelope:
//!
//! ```text
//! > {"id": 1, "op": "loadSchema", "key": "tab-1", "path": "protos/helloworld.proto"}
//! > {"id": 2, "op": "status", "key": "tab-1"}
//! < {"id":2,"success":true,"data":{"exists":true,"connected":false,"hasSchema":true,...}}
//! < {"id":1,"success":true,"data":null}
//! ```
//!
//! Requests on different keys run concurrently, so replies come back in completion order.
//! Requests on the same key run one after the other, in arrival order: each one waits for its
//! predecessor on that key to finish before it touches the session.
use anyhow::Context;
use protodeck_core::BoxError;
use protodeck_core::client::{ChannelConnector, Connector};
use protodeck_core::dispatch::CallOptions;
use protodeck_core::tonic;
use protodeck_core::tonic::client::GrpcService;
use protodeck_core::workbench::{ApiResponse, Workbench};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tracing::{debug, warn};

/// One request line, minus its `id`.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operation {
    LoadSchema {
        key: String,
        path: PathBuf,
    },
    SetIncludeDirs {
        key: String,
        dirs: Vec<PathBuf>,
    },
    Describe {
        key: String,
    },
    ParseSchema {
        #[serde(default)]
        content: String,
        path: Option<PathBuf>,
        key: Option<String>,
    },
    Connect {
        key: String,
        endpoint: String,
        service: String,
    },
    Reconnect {
        key: String,
    },
    Call {
        key: String,
        method: String,
        #[serde(default)]
        body: Value,
        #[serde(default)]
        headers: BTreeMap<String, String>,
        timeout_ms: Option<u64>,
    },
    Disconnect {
        key: String,
    },
    Status {
        key: String,
    },
    CloseSession {
        key: String,
    },
}

impl Operation {
    /// Session the operation acts on, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Operation::ParseSchema { key, .. } => key.as_deref(),
            Operation::LoadSchema { key, .. }
            | Operation::SetIncludeDirs { key, .. }
            | Operation::Describe { key }
            | Operation::Connect { key, .. }
            | Operation::Reconnect { key }
            | Operation::Call { key, .. }
            | Operation::Disconnect { key }
            | Operation::Status { key }
            | Operation::CloseSession { key } => Some(key.as_str()),
        }
    }
}

/// Orders requests per key.
///
/// Every request entering a lane gets a guard to hold until its reply is sent and, unless the
/// lane was idle, a signal that fires once the previous request of the same key dropped its
/// guard.
#[derive(Debug, Default)]
pub struct KeyLanes {
    tails: HashMap<String, oneshot::Receiver<()>>,
}

impl KeyLanes {
    pub fn enter(&mut self, key: &str) -> (Option<oneshot::Receiver<()>>, oneshot::Sender<()>) {
        let (guard, done) = oneshot::channel();
        let previous = self.tails.insert(key.to_string(), done);
        (previous, guard)
    }

    /// Forgets lanes whose last request has finished.
    pub fn prune(&mut self) {
        self.tails.retain(|_, done| {
            matches!(done.try_recv(), Err(oneshot::error::TryRecvError::Empty))
        });
    }

    pub fn len(&self) -> usize {
        self.tails.len()
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct Reply {
    pub id: Value,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

/// Like [`protodeck_core::workbench::ApiError`], plus `InvalidRequest` for lines that are
/// not a known operation.
#[derive(Debug, Serialize, PartialEq)]
pub struct ReplyError {
    pub kind: String,
    pub message: String,
}

impl Reply {
    fn new<T: Serialize>(id: Value, response: ApiResponse<T>) -> Self {
        match response.into_result() {
            Ok(data) => Self {
                id,
                success: true,
                data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
                error: None,
            },
            Err(error) => Self {
                id,
                success: false,
                data: None,
                error: Some(ReplyError {
                    kind: error.kind.to_string(),
                    message: error.message,
                }),
            },
        }
    }

    fn invalid_request(id: Value, message: impl ToString) -> Self {
        Self {
            id,
            success: false,
            data: None,
            error: Some(ReplyError {
                kind: "InvalidRequest".to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// Splits a request line into its `id` and operation.
pub fn parse_line(line: &str) -> Result<(Value, Operation), Reply> {
    let mut request: Value =
        serde_json::from_str(line).map_err(|e| Reply::invalid_request(Value::Null, e))?;

    let id = request
        .as_object_mut()
        .and_then(|object| object.remove("id"))
        .unwrap_or(Value::Null);

    match serde_json::from_value(request) {
        Ok(operation) => Ok((id, operation)),
        Err(err) => Err(Reply::invalid_request(id, err)),
    }
}

/// Runs `operation` against `workbench`, answering with `id`.
pub async fn execute<C>(workbench: &Workbench<C>, id: Value, operation: Operation) -> Reply
where
    C: Connector,
    C::Transport: GrpcService<tonic::body::Body>,
    <C::Transport as GrpcService<tonic::body::Body>>::Error: Into<BoxError>,
    <C::Transport as GrpcService<tonic::body::Body>>::ResponseBody:
        http_body::Body<Data = tonic::codegen::Bytes> + Send + 'static,
    <<C::Transport as GrpcService<tonic::body::Body>>::ResponseBody as http_body::Body>::Error:
        Into<BoxError> + Send,
{
    match operation {
        Operation::LoadSchema { key, path } => Reply::new(id, workbench.load_schema(&key, path).await),
        Operation::SetIncludeDirs { key, dirs } => {
            Reply::new(id, workbench.set_include_dirs(&key, dirs).await)
        }
        Operation::Describe { key } => Reply::new(id, workbench.describe(&key).await),
        Operation::ParseSchema { content, path, key } => Reply::new(
            id,
            workbench.parse_schema(&content, path, key.as_deref()).await,
        ),
        Operation::Connect {
            key,
            endpoint,
            service,
        } => Reply::new(id, workbench.connect(&key, &endpoint, &service).await),
        Operation::Reconnect { key } => Reply::new(id, workbench.reconnect(&key).await),
        Operation::Call {
            key,
            method,
            body,
            headers,
            timeout_ms,
        } => {
            let options = CallOptions {
                headers: headers.into_iter().collect(),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            Reply::new(
                id,
                workbench.call_with_options(&key, &method, body, options).await,
            )
        }
        Operation::Disconnect { key } => Reply::new(id, workbench.disconnect(&key).await),
        Operation::Status { key } => Reply::new(id, workbench.status(&key).await),
        Operation::CloseSession { key } => Reply::new(id, workbench.close_session(&key).await),
    }
}

/// Reads requests from `input` until EOF and writes one reply line per request to `output`.
pub async fn run<R, W>(
    workbench: Arc<Workbench<ChannelConnector>>,
    input: R,
    mut output: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::channel::<Reply>(64);

    let writer = tokio::spawn(async move {
        while let Some(reply) = rx.recv().await {
            let mut line = serde_json::to_vec(&reply)?;
            line.push(b'\n');
            output.write_all(&line).await?;
            output.flush().await?;
        }
        anyhow::Ok(())
    });

    let mut tasks = JoinSet::new();
    let mut lanes = KeyLanes::default();
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await.context("Failed to read request")? {
        while let Some(result) = tasks.try_join_next() {
            log_task_failure(result);
        }
        lanes.prune();

        if line.trim().is_empty() {
            continue;
        }

        let tx = tx.clone();
        match parse_line(&line) {
            Ok((id, operation)) => {
                debug!(?id, ?operation, busy_keys = lanes.len(), "Request received");
                let (previous, guard) = match operation.key() {
                    Some(key) => {
                        let (previous, guard) = lanes.enter(key);
                        (previous, Some(guard))
                    }
                    None => (None, None),
                };
                let workbench = Arc::clone(&workbench);
                tasks.spawn(async move {
                    let _guard = guard;
                    if let Some(previous) = previous {
                        // Resolves with an error once the predecessor drops its guard.
                        let _ = previous.await;
                    }
                    let reply = execute(&workbench, id, operation).await;
                    let _ = tx.send(reply).await;
                });
            }
            Err(reply) => {
                warn!(line = %line, "Rejected request line");
                let _ = tx.send(reply).await;
            }
        }
    }

    while let Some(result) = tasks.join_next().await {
        log_task_failure(result);
    }

    drop(tx);
    writer.await.context("Reply writer panicked")?
}

fn log_task_failure(result: Result<(), tokio::task::JoinError>) {
    if let Err(err) = result {
        warn!("Request task failed: {err}");
    }
}
