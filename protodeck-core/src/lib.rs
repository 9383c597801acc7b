//! # Protodeck Core
//!
//! `protodeck-core` is the library powering Protodeck. It loads `.proto` schemas at runtime,
//! including their imports, and builds gRPC clients from them on the fly, so any unary method
//! of any service can be called with JSON input and no generated stubs.
//!
//! ## Key Components
//!
//! * **[`schema::SchemaLoader`]:** Resolves imports across search roots and compiles the files
//!   into a [`schema::SchemaRoot`].
//! * **[`descriptor::extract`]:** Turns a schema into a flat listing of services, methods and
//!   recursive request field trees for display.
//! * **[`client::DynamicClient`]:** A transport client bound to one service. Each method is a
//!   [`client::MethodBinding`] pairing its HTTP/2 path with request/response codecs.
//! * **[`session::SessionStore`]:** Independent sessions (one per UI tab) addressed by an
//!   opaque key.
//! * **[`workbench::Workbench`]:** The facade a UI talks to. Every operation returns the
//!   uniform [`workbench::ApiResponse`] envelope.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost`, `prost-reflect`, and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod client;
pub mod config;
pub mod descriptor;
pub mod dispatch;
pub mod error;
pub mod grpc;
pub mod schema;
pub mod session;
pub mod workbench;

// Re-exports
pub use prost;
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
