//! Endpoint parsing.
//!
//! Users type endpoints in many shapes (`localhost:50051`, `api.example.com`,
//! `https://api.example.com:8443/`). A [`Target`] normalizes them into a bare `host:port`
//! authority plus the decision whether the channel uses TLS.
use crate::error::{Categorized, ErrorKind};
use http::uri::Authority;
use std::fmt;
use std::str::FromStr;

const TLS_PORT: u16 = 443;
const LOCAL_HOSTS: &[&str] = &["localhost", "127.0.0.1"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TargetError {
    #[error("Endpoint is empty")]
    Empty,
    #[error("Unsupported scheme '{0}', expected 'http' or 'https'")]
    UnsupportedScheme(String),
    #[error("Invalid endpoint '{endpoint}': {message}")]
    InvalidAuthority { endpoint: String, message: String },
}

impl Categorized for TargetError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::TransportError
    }
}

/// A parsed endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    authority: Authority,
    tls: bool,
}

impl Target {
    /// Parses an endpoint.
    ///
    /// TLS is used when the endpoint has an `https://` scheme, or has no scheme and either
    /// targets port 443 or has no port and a non-local host (port 443 is then appended).
    /// `http://` always means plaintext.
    pub fn parse(endpoint: &str) -> Result<Self, TargetError> {
        let trimmed = endpoint.trim();
        if trimmed.is_empty() {
            return Err(TargetError::Empty);
        }

        let (scheme_tls, rest) = match trimmed.split_once("://") {
            Some((scheme, rest)) => match scheme.to_ascii_lowercase().as_str() {
                "https" => (Some(true), rest),
                "http" => (Some(false), rest),
                _ => return Err(TargetError::UnsupportedScheme(scheme.to_string())),
            },
            None => (None, trimmed),
        };

        let authority = parse_authority(endpoint, rest.trim_end_matches('/'))?;

        let tls = scheme_tls.unwrap_or_else(|| match authority.port_u16() {
            Some(port) => port == TLS_PORT,
            None => !LOCAL_HOSTS.contains(&authority.host()),
        });

        let authority = if scheme_tls.is_none() && tls && authority.port().is_none() {
            parse_authority(endpoint, &format!("{authority}:{TLS_PORT}"))?
        } else {
            authority
        };

        Ok(Self { authority, tls })
    }

    /// The bare `host[:port]` authority handed to the transport.
    pub fn authority(&self) -> &str {
        self.authority.as_str()
    }

    pub fn host(&self) -> &str {
        self.authority.host()
    }

    pub fn port(&self) -> Option<u16> {
        self.authority.port_u16()
    }

    pub fn uses_tls(&self) -> bool {
        self.tls
    }

    /// The authority with the scheme matching the TLS decision.
    pub fn uri(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{scheme}://{}", self.authority)
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri())
    }
}

fn parse_authority(endpoint: &str, authority: &str) -> Result<Authority, TargetError> {
    let invalid = |message: String| TargetError::InvalidAuthority {
        endpoint: endpoint.to_string(),
        message,
    };

    if authority.is_empty() {
        return Err(invalid("missing host".to_string()));
    }

    Authority::from_str(authority).map_err(|err| invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_endpoint_is_plaintext() {
        let target = Target::parse("localhost:50051").unwrap();
        assert!(!target.uses_tls());
        assert_eq!(target.authority(), "localhost:50051");
        assert_eq!(target.uri(), "http://localhost:50051");
    }

    #[test]
    fn test_bare_remote_host_gets_tls_port() {
        let target = Target::parse("api.example.com").unwrap();
        assert!(target.uses_tls());
        assert_eq!(target.authority(), "api.example.com:443");
        assert_eq!(target.port(), Some(443));
    }

    #[test]
    fn test_bare_local_host_stays_plaintext() {
        for endpoint in ["localhost", "127.0.0.1"] {
            let target = Target::parse(endpoint).unwrap();
            assert!(!target.uses_tls(), "{endpoint}");
            assert_eq!(target.authority(), endpoint);
        }
    }

    #[test]
    fn test_port_443_without_scheme_uses_tls() {
        let target = Target::parse("10.0.0.7:443").unwrap();
        assert!(target.uses_tls());
        assert_eq!(target.uri(), "https://10.0.0.7:443");
    }

    #[test]
    fn test_scheme_decides_tls_and_is_stripped() {
        let secure = Target::parse("https://grpc.example.com:8443/").unwrap();
        assert!(secure.uses_tls());
        assert_eq!(secure.authority(), "grpc.example.com:8443");

        let plain = Target::parse("http://grpc.example.com").unwrap();
        assert!(!plain.uses_tls());
        assert_eq!(plain.authority(), "grpc.example.com");

        let forced = Target::parse("http://grpc.example.com:443").unwrap();
        assert!(!forced.uses_tls());
    }

    #[test]
    fn test_invalid_endpoints() {
        assert_eq!(Target::parse("   "), Err(TargetError::Empty));
        assert!(matches!(
            Target::parse("ftp://example.com"),
            Err(TargetError::UnsupportedScheme(scheme)) if scheme == "ftp"
        ));
        assert!(matches!(
            Target::parse("https://"),
            Err(TargetError::InvalidAuthority { .. })
        ));
        assert!(matches!(
            Target::parse("localhost:50051/some/path"),
            Err(TargetError::InvalidAuthority { .. })
        ));
    }
}
