//! # Configuration
//!
//! Settings shared by every session. All fields have defaults, so an empty JSON object
//! (or no config file at all) is a valid configuration.
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Include directories consulted after the ones declared on a session.
    pub include_dirs: Vec<PathBuf>,
    /// Serve `google/protobuf/*.proto` imports from the bundled copies.
    pub well_known_types: bool,
    /// Use the process working directory as the last search root.
    pub working_dir_fallback: bool,
    /// Upper bound for a single call, in milliseconds. `0` disables the limit.
    pub call_timeout_ms: u64,
    /// Upper bound for establishing a connection, in milliseconds.
    pub connect_timeout_ms: u64,
    pub codec: CodecOptions,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            include_dirs: vec![],
            well_known_types: true,
            working_dir_fallback: true,
            call_timeout_ms: 30_000,
            connect_timeout_ms: 5_000,
            codec: CodecOptions::default(),
        }
    }
}

impl Config {
    pub fn call_timeout(&self) -> Option<Duration> {
        (self.call_timeout_ms > 0).then(|| Duration::from_millis(self.call_timeout_ms))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

/// How JSON values are mapped to and from Protobuf messages.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(default)]
pub struct CodecOptions {
    /// Emit `snake_case` proto field names instead of `lowerCamelCase` JSON names.
    pub use_proto_field_names: bool,
    /// Emit fields that hold their default value.
    pub emit_default_fields: bool,
    /// Reject request objects with fields the message type does not declare.
    pub deny_unknown_fields: bool,
}

impl Default for CodecOptions {
    fn default() -> Self {
        Self {
            use_proto_field_names: false,
            emit_default_fields: false,
            deny_unknown_fields: true,
        }
    }
}
