//! Transport construction.
//!
//! A [`Connector`] turns a [`Target`] into a transport handle that [`DynamicClient`] can
//! issue calls through. [`ChannelConnector`] builds real `tonic` channels. Any closure
//! `Fn(&Target) -> Result<S, E>` is a connector as well, which is how in-process services are
//! plugged in.
//!
//! [`DynamicClient`]: super::DynamicClient
use super::target::Target;
use crate::BoxError;
use crate::config::Config;
use crate::error::{Categorized, ErrorKind};
use std::time::Duration;
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Invalid endpoint '{endpoint}': {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("Failed to configure TLS for '{endpoint}': {source}")]
    Tls {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },
    #[error("Failed to connect to '{endpoint}': {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: BoxError,
    },
}

impl Categorized for TransportError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransportError
    }
}

/// Builds transport handles for targets.
pub trait Connector {
    type Transport;

    fn connect(&self, target: &Target) -> Result<Self::Transport, TransportError>;
}

impl<F, S, E> Connector for F
where
    F: Fn(&Target) -> Result<S, E>,
    E: Into<BoxError>,
{
    type Transport = S;

    fn connect(&self, target: &Target) -> Result<S, TransportError> {
        self(target).map_err(|err| TransportError::Connect {
            endpoint: target.to_string(),
            source: err.into(),
        })
    }
}

/// Creates lazily connected `tonic` channels.
///
/// No I/O happens when connecting: the channel dials on its first request, so an unreachable
/// server surfaces as a transport error of the first call.
#[derive(Debug, Clone)]
pub struct ChannelConnector {
    connect_timeout: Duration,
}

impl ChannelConnector {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.connect_timeout())
    }
}

impl Default for ChannelConnector {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Connector for ChannelConnector {
    type Transport = Channel;

    fn connect(&self, target: &Target) -> Result<Channel, TransportError> {
        let uri = target.uri();

        let mut endpoint = Endpoint::from_shared(uri.clone())
            .map_err(|source| TransportError::InvalidEndpoint {
                endpoint: uri.clone(),
                source,
            })?
            .connect_timeout(self.connect_timeout);

        if target.uses_tls() {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|source| TransportError::Tls {
                    endpoint: uri.clone(),
                    source,
                })?;
        }

        debug!(endpoint = %uri, tls = target.uses_tls(), "Created lazy channel");
        Ok(endpoint.connect_lazy())
    }
}
