//! # Workbench
//!
//! The facade a UI talks to. It owns the [`SessionStore`], loads schemas, connects clients and
//! dispatches calls. Every operation answers with an [`ApiResponse`] envelope instead of a
//! `Result`, so nothing a user types can make it fail in any other way than an error value
//! with a stable [`ErrorKind`].
use crate::BoxError;
use crate::client::{ChannelConnector, Connector, DynamicClient};
use crate::config::Config;
use crate::descriptor::{self, DescriptorSet};
use crate::dispatch::{CallError, CallOptions, RequestDispatcher};
use crate::error::{Categorized, ErrorKind, SessionStateError};
use crate::schema::{SchemaLoader, SchemaRoot};
use crate::session::{SessionStatus, SessionStore};
use http_body::Body as HttpBody;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tonic::client::GrpcService;
use tracing::{info, warn};

/// Error part of an [`ApiResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl<E: Categorized> From<&E> for ApiError {
    fn from(err: &E) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// The uniform `{success, data?, error?}` envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(error: ApiError) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
        }
    }

    /// Kind of the error, `None` on success.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    pub fn into_result(self) -> Result<Option<T>, ApiError> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.data),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> ApiResponse<U> {
        ApiResponse {
            success: self.success,
            data: self.data.map(f),
            error: self.error,
        }
    }
}

impl<T, E: Categorized> From<Result<T, E>> for ApiResponse<T> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(err) => Self::err(ApiError::from(&err)),
        }
    }
}

/// Per-key schema loading, connections and calls.
pub struct Workbench<C: Connector = ChannelConnector> {
    config: Config,
    loader: SchemaLoader,
    connector: C,
    dispatcher: RequestDispatcher,
    sessions: SessionStore<C::Transport>,
}

impl Workbench<ChannelConnector> {
    /// A workbench that connects with `tonic` channels.
    pub fn new(config: Config) -> Self {
        let connector = ChannelConnector::from_config(&config);
        Self::with_connector(config, connector)
    }
}

impl Default for Workbench<ChannelConnector> {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl<C> Workbench<C>
where
    C: Connector,
    C::Transport: GrpcService<tonic::body::Body>,
    <C::Transport as GrpcService<tonic::body::Body>>::Error: Into<BoxError>,
    <C::Transport as GrpcService<tonic::body::Body>>::ResponseBody:
        HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <<C::Transport as GrpcService<tonic::body::Body>>::ResponseBody as HttpBody>::Error:
        Into<BoxError> + Send,
{
    pub fn with_connector(config: Config, connector: C) -> Self {
        Self {
            loader: SchemaLoader::new(&config),
            dispatcher: RequestDispatcher::new(config.call_timeout()),
            connector,
            sessions: SessionStore::new(),
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn sessions(&self) -> &SessionStore<C::Transport> {
        &self.sessions
    }

    /// Loads `path` into the session `key`.
    ///
    /// On success the session holds the new schema and is disconnected, since its client was
    /// built from the previous schema. On failure the session keeps its schema and client.
    pub async fn load_schema(&self, key: &str, path: impl Into<PathBuf>) -> ApiResponse<()> {
        let path = path.into();
        let session = self.sessions.get_or_create(key);
        let mut session = session.lock().await;

        match self.loader.load(&path, session.include_dirs()).await {
            Ok(schema) => {
                info!(session = %key, path = %path.display(), "Schema loaded into session");
                session.set_schema(Some(path), Arc::new(schema));
                ApiResponse::ok(())
            }
            Err(err) => respond("load_schema", key, Err(err)),
        }
    }

    /// Sets the include directories used by later loads of `key`.
    pub async fn set_include_dirs(&self, key: &str, dirs: Vec<PathBuf>) -> ApiResponse<()> {
        self.sessions.set_include_dirs(key, dirs).await;
        ApiResponse::ok(())
    }

    /// Lists services, methods and request field trees of `root`.
    pub fn extract_descriptors(&self, root: &SchemaRoot) -> ApiResponse<DescriptorSet> {
        ApiResponse::ok(descriptor::extract(root))
    }

    /// Lists the schema loaded into `key`.
    pub async fn describe(&self, key: &str) -> ApiResponse<DescriptorSet> {
        let result = match self.sessions.get(key) {
            Some(session) => match session.lock().await.schema() {
                Some(schema) => Ok(descriptor::extract(schema)),
                None => Err(SessionStateError::NoSchema(key.to_string())),
            },
            None => Err(SessionStateError::NoSchema(key.to_string())),
        };
        respond("describe", key, result)
    }

    /// Parses schema content for display.
    ///
    /// With a `path`, the file at `path` is loaded (so its imports resolve relative to it),
    /// and with a `key` as well, the result is stored in that session. If the session already
    /// holds the schema of `path`, it is listed without reloading. Without a `path`, `content`
    /// is parsed in memory and no session is touched.
    pub async fn parse_schema(
        &self,
        content: &str,
        path: Option<PathBuf>,
        key: Option<&str>,
    ) -> ApiResponse<DescriptorSet> {
        let label = key.unwrap_or("-");

        let Some(key) = key else {
            let result = match path {
                Some(path) => self.loader.load(&path, &[]).await,
                None => self.loader.load_from_content(content, &[]).await,
            };
            return respond("parse_schema", label, result.map(|s| descriptor::extract(&s)));
        };

        let session = self.sessions.get_or_create(key);
        let mut session = session.lock().await;

        if let (Some(path), Some(schema)) = (&path, session.schema())
            && session.schema_path() == Some(path.as_path())
        {
            return ApiResponse::ok(descriptor::extract(schema));
        }

        let result = match &path {
            Some(path) => self.loader.load(path, session.include_dirs()).await,
            None => {
                self.loader
                    .load_from_content(content, session.include_dirs())
                    .await
            }
        };

        match result {
            Ok(schema) => {
                let listing = descriptor::extract(&schema);
                if path.is_some() {
                    session.set_schema(path, Arc::new(schema));
                }
                ApiResponse::ok(listing)
            }
            Err(err) => respond("parse_schema", label, Err(err)),
        }
    }

    /// Connects `key` to `service` at `endpoint`, replacing any previous client.
    ///
    /// A failed connect leaves the session as it was.
    pub async fn connect(&self, key: &str, endpoint: &str, service: &str) -> ApiResponse<()> {
        let session = self.sessions.get_or_create(key);
        let mut session = session.lock().await;

        let Some(schema) = session.schema().cloned() else {
            return respond::<(), _>(
                "connect",
                key,
                Err(SessionStateError::NoSchema(key.to_string())),
            );
        };

        match DynamicClient::connect(
            &schema,
            service,
            endpoint,
            self.config.codec,
            &self.connector,
        ) {
            Ok(client) => {
                info!(session = %key, endpoint = %client.target(), service = %client.service().full_name(), "Connected");
                session.set_client(client, endpoint.to_string(), service.to_string());
                ApiResponse::ok(())
            }
            Err(err) => respond("connect", key, Err(err)),
        }
    }

    /// Connects again with the endpoint and service of the last connection.
    pub async fn reconnect(&self, key: &str) -> ApiResponse<()> {
        let previous = match self.sessions.get(key) {
            Some(session) => {
                let session = session.lock().await;
                session
                    .endpoint()
                    .zip(session.service_name())
                    .map(|(endpoint, service)| (endpoint.to_string(), service.to_string()))
            }
            None => None,
        };

        match previous {
            Some((endpoint, service)) => self.connect(key, &endpoint, &service).await,
            None => respond(
                "reconnect",
                key,
                Err(SessionStateError::NoPreviousConnection(key.to_string())),
            ),
        }
    }

    /// Calls `method` with `value` as request on the client of `key`.
    pub async fn call(&self, key: &str, method: &str, value: Value) -> ApiResponse<Value> {
        self.call_with_options(key, method, value, CallOptions::default())
            .await
    }

    /// Like [`Workbench::call`], with gRPC metadata attached.
    pub async fn call_with_metadata(
        &self,
        key: &str,
        method: &str,
        value: Value,
        headers: Vec<(String, String)>,
    ) -> ApiResponse<Value> {
        let options = CallOptions {
            headers,
            ..CallOptions::default()
        };
        self.call_with_options(key, method, value, options).await
    }

    pub async fn call_with_options(
        &self,
        key: &str,
        method: &str,
        value: Value,
        options: CallOptions,
    ) -> ApiResponse<Value> {
        let result = match self.sessions.get(key) {
            Some(session) => {
                let mut session = session.lock().await;
                self.dispatcher
                    .call(&mut *session, method, &value, options)
                    .await
            }
            None => Err(CallError::SessionState(SessionStateError::NoSchema(
                key.to_string(),
            ))),
        };
        respond("call", key, result)
    }

    /// Closes the client of `key`. Succeeds when there is nothing to close.
    pub async fn disconnect(&self, key: &str) -> ApiResponse<()> {
        self.sessions.disconnect(key).await;
        ApiResponse::ok(())
    }

    pub async fn status(&self, key: &str) -> ApiResponse<SessionStatus> {
        ApiResponse::ok(self.sessions.status(key).await)
    }

    /// Forgets `key`, closing its client. Returns whether the session existed.
    pub async fn close_session(&self, key: &str) -> ApiResponse<bool> {
        ApiResponse::ok(self.sessions.remove(key).await)
    }
}

fn respond<T, E: Categorized>(op: &str, key: &str, result: Result<T, E>) -> ApiResponse<T> {
    if let Err(err) = &result {
        warn!(session = %key, op, kind = %err.kind(), "{err}");
    }
    result.into()
}
