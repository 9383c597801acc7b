use crate::config::CodecOptions;
use crate::error::{Categorized, ErrorKind};
use crate::grpc::codec::{CodecError, MessageCodec};
use bytes::Bytes;
use http::uri::PathAndQuery;
use prost_reflect::MethodDescriptor;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MethodBindingError {
    #[error("Method '{method}' not found on service '{service}'")]
    UnknownMethod { method: String, service: String },
    #[error("Method '{method}' is {streaming}, only unary calls are supported")]
    Streaming {
        method: String,
        streaming: &'static str,
    },
    #[error("Method '{method}' has an invalid path '{path}': {message}")]
    InvalidPath {
        method: String,
        path: String,
        message: String,
    },
}

impl Categorized for MethodBindingError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::MethodBindingError
    }
}

/// The serialize/deserialize pair of one method, together with its HTTP/2 path.
///
/// Bindings are plain values built from the schema alone, so they can be inspected and
/// exercised without a transport.
#[derive(Debug, Clone)]
pub struct MethodBinding {
    name: String,
    path: String,
    request: MessageCodec,
    response: MessageCodec,
    client_streaming: bool,
    server_streaming: bool,
}

impl MethodBinding {
    pub fn new(method: &MethodDescriptor, options: CodecOptions) -> Self {
        Self {
            name: method.name().to_string(),
            path: format!("/{}/{}", method.parent_service().full_name(), method.name()),
            request: MessageCodec::new(method.input(), options),
            response: MessageCodec::new(method.output(), options),
            client_streaming: method.is_client_streaming(),
            server_streaming: method.is_server_streaming(),
        }
    }

    /// The method name as declared in the schema.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// `/<service full name>/<method>`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn request(&self) -> &MessageCodec {
        &self.request
    }

    pub fn response(&self) -> &MessageCodec {
        &self.response
    }

    pub fn is_client_streaming(&self) -> bool {
        self.client_streaming
    }

    pub fn is_server_streaming(&self) -> bool {
        self.server_streaming
    }

    /// Encodes a request value.
    pub fn serialize(&self, value: &Value) -> Result<Bytes, CodecError> {
        self.request.encode(value)
    }

    /// Decodes a response message.
    pub fn deserialize(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        self.response.decode(bytes)
    }

    pub fn ensure_unary(&self) -> Result<(), MethodBindingError> {
        let streaming = match (self.client_streaming, self.server_streaming) {
            (false, false) => return Ok(()),
            (true, false) => "client streaming",
            (false, true) => "server streaming",
            (true, true) => "bidirectional streaming",
        };

        Err(MethodBindingError::Streaming {
            method: self.name.clone(),
            streaming,
        })
    }

    pub fn path_and_query(&self) -> Result<PathAndQuery, MethodBindingError> {
        self.path
            .parse::<PathAndQuery>()
            .map_err(|err| MethodBindingError::InvalidPath {
                method: self.name.clone(),
                path: self.path.clone(),
                message: err.to_string(),
            })
    }
}
