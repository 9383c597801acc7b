//! # Generic gRPC Transport
//!
//! This module contains the low-level building blocks for performing gRPC calls using
//! dynamic message types.
//!
//! Unlike standard `tonic` clients which are strongly typed (e.g., `HelloRequest`),
//! the components here work with `serde_json::Value` on one side and raw Protobuf bytes on
//! the wire. The JSON <-> bytes step lives in [`codec::MessageCodec`], outside of the
//! transport, so that encoding failures can be told apart from network failures.
pub mod client;
pub mod codec;
