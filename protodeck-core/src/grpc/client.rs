//! # Unary Transport Client
//!
//! [`GrpcClient`] sends one already encoded request message to a runtime-chosen path and hands
//! back the encoded response. Message structure is none of its business: the bytes pass
//! through [`BytesCodec`] untouched.
//!
//! A call is described by a [`UnaryCall`], which collects the path, the payload, metadata and an
//! optional deadline before anything touches the transport. Bad metadata is therefore reported
//! before the service is polled for readiness.
use super::codec::BytesCodec;
use crate::BoxError;
use crate::error::{Categorized, ErrorKind};
use bytes::Bytes;
use http::uri::PathAndQuery;
use http_body::Body as HttpBody;
use std::time::Duration;
use tonic::{
    Request, Status,
    client::{Grpc, GrpcService},
    metadata::{
        AsciiMetadataKey, AsciiMetadataValue, MetadataMap,
        errors::{InvalidMetadataKey, InvalidMetadataValue},
    },
    transport::Channel,
};

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Transport is not ready to accept requests: {0}")]
    NotReady(#[source] BoxError),
    #[error("'{key}' is not a valid metadata key")]
    MetadataKey {
        key: String,
        #[source]
        source: InvalidMetadataKey,
    },
    #[error("Metadata '{key}' has a value that is not printable ASCII")]
    MetadataValue {
        key: String,
        #[source]
        source: InvalidMetadataValue,
    },
}

impl Categorized for GrpcRequestError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransportError
    }
}

/// Everything needed to issue one unary request.
#[derive(Debug)]
pub struct UnaryCall {
    path: PathAndQuery,
    payload: Bytes,
    metadata: MetadataMap,
    timeout: Option<Duration>,
}

impl UnaryCall {
    pub fn new(path: PathAndQuery, payload: Bytes) -> Self {
        Self {
            path,
            payload,
            metadata: MetadataMap::new(),
            timeout: None,
        }
    }

    /// Adds `headers` as ASCII metadata. Repeated keys are all sent.
    pub fn with_headers<I, K, V>(mut self, headers: I) -> Result<Self, GrpcRequestError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in headers {
            let key = key.as_ref();
            let name = AsciiMetadataKey::from_bytes(key.trim().as_bytes()).map_err(|source| {
                GrpcRequestError::MetadataKey {
                    key: key.to_string(),
                    source,
                }
            })?;
            let value = AsciiMetadataValue::try_from(value.as_ref()).map_err(|source| {
                GrpcRequestError::MetadataValue {
                    key: key.to_string(),
                    source,
                }
            })?;
            self.metadata.append(name, value);
        }
        Ok(self)
    }

    /// Sent to the server as `grpc-timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &PathAndQuery {
        &self.path
    }

    pub fn metadata(&self) -> &MetadataMap {
        &self.metadata
    }

    fn into_parts(self) -> (PathAndQuery, Request<Bytes>) {
        let mut request = Request::new(self.payload);
        *request.metadata_mut() = self.metadata;
        if let Some(timeout) = self.timeout {
            request.set_timeout(timeout);
        }
        (self.path, request)
    }
}

/// Issues unary calls over any `tonic` transport.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    inner: Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(transport: S) -> Self {
        Self {
            inner: Grpc::new(transport),
        }
    }

    /// Sends `call` and waits for the single response message.
    ///
    /// The outer error means the request never reached the server; the inner `Status` is the
    /// server's (or the transport's) verdict on a request that was sent.
    pub async fn unary(
        &mut self,
        call: UnaryCall,
    ) -> Result<Result<Bytes, Status>, GrpcRequestError> {
        self.inner
            .ready()
            .await
            .map_err(|err| GrpcRequestError::NotReady(err.into()))?;

        let (path, request) = call.into_parts();

        Ok(self
            .inner
            .unary(request, path, BytesCodec)
            .await
            .map(|response| response.into_inner()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> UnaryCall {
        UnaryCall::new(PathAndQuery::from_static("/pkg.Svc/Do"), Bytes::new())
    }

    #[test]
    fn test_headers_become_metadata() {
        let call = call()
            .with_headers([("authorization", "Bearer t"), ("x-tag", "a"), ("x-tag", "b")])
            .unwrap();

        assert_eq!(call.metadata().get("authorization").unwrap(), "Bearer t");
        let tags: Vec<_> = call.metadata().get_all("x-tag").iter().collect();
        assert_eq!(tags.len(), 2);
    }

    #[test]
    fn test_invalid_metadata_is_rejected() {
        let err = call().with_headers([("bad key", "v")]).unwrap_err();
        assert!(matches!(err, GrpcRequestError::MetadataKey { .. }));

        let err = call().with_headers([("x-ok", "line\nbreak")]).unwrap_err();
        assert!(matches!(err, GrpcRequestError::MetadataValue { ref key, .. } if key == "x-ok"));
        assert_eq!(err.kind(), ErrorKind::TransportError);
    }

    #[test]
    fn test_timeout_is_attached_to_the_request() {
        let (path, request) = call()
            .with_timeout(Some(Duration::from_millis(250)))
            .into_parts();

        assert_eq!(path.as_str(), "/pkg.Svc/Do");
        assert!(request.metadata().get("grpc-timeout").is_some());
    }
}
