//! # Dynamic Client
//!
//! A [`DynamicClient`] is a gRPC client for one service of a loaded schema, created at
//! runtime instead of generated at build time.
//!
//! Connecting runs through three steps:
//!
//! 1. The service is looked up in the [`SchemaRoot`], by full name or by an unambiguous short
//!    name.
//! 2. Every method of the service becomes a [`MethodBinding`]: the HTTP/2 path plus a request
//!    and a response codec.
//! 3. The endpoint is parsed into a [`Target`] and handed to a [`Connector`], which returns
//!    the transport the calls will go through.
//!
//! ## Example
//!
//! ```rust,no_run
//! use protodeck_core::client::{ChannelConnector, DynamicClient};
//! use protodeck_core::config::CodecOptions;
//! use protodeck_core::schema::SchemaLoader;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = SchemaLoader::default().load("protos/helloworld.proto", &[]).await?;
//!
//! let client = DynamicClient::connect(
//!     &schema,
//!     "helloworld.Greeter",
//!     "localhost:50051",
//!     CodecOptions::default(),
//!     &ChannelConnector::default(),
//! )?;
//!
//! let binding = client.method("SayHello")?;
//! assert_eq!(binding.path(), "/helloworld.Greeter/SayHello");
//! # Ok(())
//! # }
//! ```
pub mod binding;
pub mod connector;
pub mod target;

pub use binding::{MethodBinding, MethodBindingError};
pub use connector::{ChannelConnector, Connector, TransportError};
pub use target::{Target, TargetError};

use crate::BoxError;
use crate::config::CodecOptions;
use crate::error::{Categorized, ErrorKind};
use crate::grpc::client::GrpcClient;
use crate::schema::{SchemaRoot, ServiceNotFoundError};
use http_body::Body as HttpBody;
use prost_reflect::ServiceDescriptor;
use tonic::client::GrpcService;
use tonic::transport::Channel;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    ServiceNotFound(#[from] ServiceNotFoundError),
    #[error(transparent)]
    InvalidTarget(#[from] TargetError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl Categorized for ConnectError {
    fn kind(&self) -> ErrorKind {
        match self {
            ConnectError::ServiceNotFound(err) => err.kind(),
            ConnectError::InvalidTarget(err) => err.kind(),
            ConnectError::Transport(err) => err.kind(),
        }
    }
}

/// A client bound to one service and one endpoint.
#[derive(Debug, Clone)]
pub struct DynamicClient<S = Channel> {
    service: ServiceDescriptor,
    target: Target,
    bindings: Vec<MethodBinding>,
    grpc: GrpcClient<S>,
}

impl<S> DynamicClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Builds a client for `service_name` of `schema` that talks to `endpoint`.
    ///
    /// The schema is only read. Method-level problems (unknown or streaming methods) are
    /// reported when a method is looked up, not here.
    pub fn connect<C>(
        schema: &SchemaRoot,
        service_name: &str,
        endpoint: &str,
        options: CodecOptions,
        connector: &C,
    ) -> Result<Self, ConnectError>
    where
        C: Connector<Transport = S>,
    {
        let service = schema.find_service(service_name)?;
        let target = Target::parse(endpoint)?;
        let transport = connector.connect(&target)?;

        Ok(Self::from_transport(service, target, transport, options))
    }

    /// Wraps an existing transport.
    pub fn from_transport(
        service: ServiceDescriptor,
        target: Target,
        transport: S,
        options: CodecOptions,
    ) -> Self {
        let bindings = service
            .methods()
            .map(|method| MethodBinding::new(&method, options))
            .collect::<Vec<_>>();

        debug!(
            service = %service.full_name(),
            endpoint = %target,
            methods = bindings.len(),
            "Built dynamic client"
        );

        Self {
            service,
            target,
            bindings,
            grpc: GrpcClient::new(transport),
        }
    }
}

impl<S> DynamicClient<S> {
    pub fn service(&self) -> &ServiceDescriptor {
        &self.service
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    /// Bindings in declaration order.
    pub fn bindings(&self) -> &[MethodBinding] {
        &self.bindings
    }

    /// Finds a method by the exact name it is declared with.
    pub fn method(&self, name: &str) -> Result<&MethodBinding, MethodBindingError> {
        self.bindings
            .iter()
            .find(|binding| binding.name() == name)
            .ok_or_else(|| MethodBindingError::UnknownMethod {
                method: name.to_string(),
                service: self.service.full_name().to_string(),
            })
    }

    pub(crate) fn grpc_mut(&mut self) -> &mut GrpcClient<S> {
        &mut self.grpc
    }

    /// Closes the transport. In-flight calls holding a clone of the channel finish on their own.
    pub fn close(self) {
        debug!(service = %self.service.full_name(), endpoint = %self.target, "Closing client");
    }
}
