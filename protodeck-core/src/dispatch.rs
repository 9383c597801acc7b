//! # Request Dispatch
//!
//! Runs one unary call through the client of a session and turns the outcome into either a
//! plain JSON value or a [`CallError`] of a well defined kind.
use crate::BoxError;
use crate::client::MethodBindingError;
use crate::error::{Categorized, ErrorKind, SessionStateError};
use crate::grpc::client::{GrpcRequestError, UnaryCall};
use crate::grpc::codec::CodecError;
use crate::session::Session;
use http_body::Body as HttpBody;
use serde_json::Value;
use std::time::Duration;
use tonic::client::GrpcService;
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error(transparent)]
    SessionState(#[from] SessionStateError),
    #[error(transparent)]
    MethodBinding(#[from] MethodBindingError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Request(#[from] GrpcRequestError),
    #[error("Server returned {code:?}: {message}", code = .0.code(), message = .0.message())]
    Status(tonic::Status),
    #[error("Call to '{method}' timed out after {}ms", timeout.as_millis())]
    Timeout { method: String, timeout: Duration },
}

impl Categorized for CallError {
    fn kind(&self) -> ErrorKind {
        match self {
            CallError::SessionState(err) => err.kind(),
            CallError::MethodBinding(err) => err.kind(),
            CallError::Codec(err) => err.kind(),
            CallError::Request(err) => err.kind(),
            CallError::Status(_) | CallError::Timeout { .. } => ErrorKind::TransportError,
        }
    }
}

/// Per-call settings.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// gRPC metadata sent with the request.
    pub headers: Vec<(String, String)>,
    /// Overrides the dispatcher's default timeout.
    pub timeout: Option<Duration>,
}

/// Executes calls. Stateless apart from the default timeout.
#[derive(Debug, Clone, Default)]
pub struct RequestDispatcher {
    default_timeout: Option<Duration>,
}

impl RequestDispatcher {
    pub fn new(default_timeout: Option<Duration>) -> Self {
        Self { default_timeout }
    }

    /// Calls `method` on the client of `session` with `value` as request.
    ///
    /// `method` must match the declared method name exactly (`SayHello`, not `sayHello`).
    /// Exactly one response is awaited and returned as a plain JSON value.
    ///
    /// If the returned future is dropped or times out, the session is left as it was.
    pub async fn call<S>(
        &self,
        session: &mut Session<S>,
        method: &str,
        value: &Value,
        options: CallOptions,
    ) -> Result<Value, CallError>
    where
        S: GrpcService<tonic::body::Body>,
        S::Error: Into<BoxError>,
        S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
        <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
    {
        let key = session.key().to_string();

        if session.schema().is_none() {
            return Err(SessionStateError::NoSchema(key).into());
        }
        let Some(client) = session.client_mut() else {
            return Err(SessionStateError::NotConnected(key).into());
        };

        let binding = client.method(method)?.clone();
        binding.ensure_unary()?;
        let path = binding.path_and_query()?;
        let payload = binding.serialize(value)?;

        let timeout = options.timeout.or(self.default_timeout);
        debug!(session = %key, path = %path, bytes = payload.len(), "Dispatching call");

        let call = UnaryCall::new(path, payload)
            .with_headers(options.headers)?
            .with_timeout(timeout);
        let pending = client.grpc_mut().unary(call);

        let outcome = match timeout {
            Some(limit) => tokio::time::timeout(limit, pending).await.map_err(|_| {
                warn!(session = %key, method = %method, "Call timed out");
                CallError::Timeout {
                    method: method.to_string(),
                    timeout: limit,
                }
            })?,
            None => pending.await,
        };

        let bytes = outcome?.map_err(|status| {
            debug!(session = %key, code = ?status.code(), "Server returned an error status");
            CallError::Status(status)
        })?;

        Ok(binding.deserialize(&bytes)?)
    }
}
