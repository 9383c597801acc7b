//! # Echo Service
//!
//! **INTERNAL USE ONLY**: This crate exists solely to provide a gRPC server implementation
//! and its schema for integration testing `protodeck-core`.
//! It is not intended for production use.
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Request, Response, Status};

pub mod pb {
    tonic::include_proto!("echo");
}

pub use pb::echo_service_server::{EchoService, EchoServiceServer};
use pb::{EchoRequest, EchoResponse};

/// Source of `echo.proto`, for loading it without touching the file system.
pub const ECHO_PROTO: &str = include_str!("../proto/echo.proto");

/// Header whose values `UnaryEcho` copies into the response.
pub const ECHO_METADATA_KEY: &str = "x-echo";

/// Message of the status returned by `FailingEcho`.
pub const FAILURE_MESSAGE: &str = "echo refused";

/// Directory holding `echo.proto`.
pub fn proto_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("proto")
}

/// Path of `echo.proto`.
pub fn proto_path() -> PathBuf {
    proto_dir().join("echo.proto")
}

/// Echoes requests back.
///
/// * `UnaryEcho` returns the message after waiting `delay_ms`, plus every `x-echo` header.
/// * `FailingEcho` always fails with `FAILED_PRECONDITION`.
/// * `ServerStreamingEcho` sends the message three times.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoServiceImpl;

/// A server ready to be used as an in-process transport.
pub fn server() -> EchoServiceServer<EchoServiceImpl> {
    EchoServiceServer::new(EchoServiceImpl)
}

#[tonic::async_trait]
impl EchoService for EchoServiceImpl {
    type ServerStreamingEchoStream = ReceiverStream<Result<EchoResponse, Status>>;

    async fn unary_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        let metadata = request
            .metadata()
            .get_all(ECHO_METADATA_KEY)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_string)
            .collect();

        let request = request.into_inner();
        if request.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(request.delay_ms)).await;
        }

        Ok(Response::new(EchoResponse {
            message: request.message,
            metadata,
        }))
    }

    async fn failing_echo(
        &self,
        _request: Request<EchoRequest>,
    ) -> Result<Response<EchoResponse>, Status> {
        Err(Status::failed_precondition(FAILURE_MESSAGE))
    }

    async fn server_streaming_echo(
        &self,
        request: Request<EchoRequest>,
    ) -> Result<Response<Self::ServerStreamingEchoStream>, Status> {
        let message = request.into_inner().message;
        let (tx, rx) = tokio::sync::mpsc::channel(4);

        tokio::spawn(async move {
            for seq in 0..3 {
                let response = EchoResponse {
                    message: format!("{message} - seq {seq}"),
                    metadata: vec![],
                };
                if tx.send(Ok(response)).await.is_err() {
                    break;
                }
            }
        });

        Ok(Response::new(ReceiverStream::new(rx)))
    }
}
