//! # Error Kinds
//!
//! Every error returned by this crate belongs to one stable [`ErrorKind`]. Callers that only
//! need to branch on the category (or show it in a UI) use [`Categorized::kind`], while the
//! concrete `thiserror` enums keep the full context for logging.
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed schema syntax, or a type reference that does not resolve.
    ParseError,
    /// An import (or the root file) could not be found under any search root.
    ImportResolutionError,
    /// A schema file exists but could not be read.
    IoError,
    /// The requested service is not part of the loaded schema.
    ServiceNotFoundError,
    /// The requested method is unknown to the client or cannot be called.
    MethodBindingError,
    /// Connection/channel failure, including status codes reported by the server.
    TransportError,
    /// The request value does not fit the message type, or the response bytes are invalid.
    CodecError,
    /// The session is not in a state that allows the operation.
    SessionStateError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ParseError => "ParseError",
            ErrorKind::ImportResolutionError => "ImportResolutionError",
            ErrorKind::IoError => "IoError",
            ErrorKind::ServiceNotFoundError => "ServiceNotFoundError",
            ErrorKind::MethodBindingError => "MethodBindingError",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::CodecError => "CodecError",
            ErrorKind::SessionStateError => "SessionStateError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Implemented by every error enum of this crate.
pub trait Categorized: std::error::Error {
    fn kind(&self) -> ErrorKind;
}

/// Returned when an operation needs a session in a different state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionStateError {
    #[error("No schema loaded in session '{0}'")]
    NoSchema(String),
    #[error("Session '{0}' is not connected")]
    NotConnected(String),
    #[error("Session '{0}' has never been connected, nothing to reconnect")]
    NoPreviousConnection(String),
}

impl Categorized for SessionStateError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::SessionStateError
    }
}
