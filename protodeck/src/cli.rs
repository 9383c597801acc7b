//! # CLI
//!
//! This module defines the command-line interface of `protodeck` using `clap`.
//!
//! It is responsible for parsing user input and performing validation (e.g., ensuring headers are `key:value`);
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "protodeck", version, about = "Call gRPC services straight from their .proto files")]
pub struct Cli {
    /// Path to a JSON configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List the services, methods and request fields of a schema
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// protodeck describe protos/helloworld.proto -I vendor/protos
    /// protodeck describe protos/helloworld.proto --symbol helloworld.HelloRequest
    /// ```
    Describe {
        /// Root .proto file
        proto: PathBuf,

        /// Extra directory to resolve imports from (repeatable, searched in order)
        #[arg(short = 'I', long = "include")]
        include_dirs: Vec<PathBuf>,

        /// Show a single service, message or enum (e.g. my.package.Message)
        #[arg(long, conflicts_with = "json")]
        symbol: Option<String>,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Perform a unary gRPC call
    ///
    /// The request and response types are taken from the given .proto file.
    ///
    /// ## Examples:
    ///
    /// ```bash
    /// protodeck call localhost:50051 helloworld.Greeter/SayHello --proto protos/helloworld.proto --body '{"name": "Ada"}'
    /// ```
    Call {
        /// Server address. `https://`, port 443 or a remote host without port use TLS
        endpoint: String,

        /// Method to call (package.Service/Method)
        #[arg(value_parser = parse_method)]
        method: (String, String),

        /// Root .proto file declaring the service
        #[arg(long)]
        proto: PathBuf,

        /// Extra directory to resolve imports from (repeatable, searched in order)
        #[arg(short = 'I', long = "include")]
        include_dirs: Vec<PathBuf>,

        /// JSON request body
        #[arg(long, value_parser = parse_body, default_value = "{}")]
        body: serde_json::Value,

        #[arg(short = 'H', long = "header", value_parser = parse_header)]
        headers: Vec<(String, String)>,

        /// Call timeout in milliseconds (overrides the configured one)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Serve the session API as JSON lines over stdin/stdout
    ///
    /// Each input line is a request such as `{"id": 1, "op": "status", "key": "tab-1"}`;
    /// each output line is the matching `{"id": 1, "success": true, "data": ...}` reply.
    Serve,
}

fn parse_method(value: &str) -> Result<(String, String), String> {
    let (service, method) = value.rsplit_once('/').ok_or_else(|| {
        format!("Invalid method format: '{value}'. Expected 'package.Service/Method'",)
    })?;

    if service.trim().is_empty() || method.trim().is_empty() {
        return Err("Service and Method names cannot be empty".to_string());
    }

    Ok((service.to_string(), method.to_string()))
}

fn parse_header(s: &str) -> Result<(String, String), String> {
    s.split_once(':')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| "Format must be 'key:value'".to_string())
}

fn parse_body(value: &str) -> Result<serde_json::Value, String> {
    serde_json::from_str(value).map_err(|e| format!("Invalid JSON: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(
            parse_method("helloworld.Greeter/SayHello"),
            Ok(("helloworld.Greeter".to_string(), "SayHello".to_string()))
        );
        assert!(parse_method("helloworld.Greeter").is_err());
        assert!(parse_method("/SayHello").is_err());
        assert!(parse_method("helloworld.Greeter/ ").is_err());
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("authorization: Bearer abc:def"),
            Ok(("authorization".to_string(), "Bearer abc:def".to_string()))
        );
        assert!(parse_header("no-separator").is_err());
    }

    #[test]
    fn test_parse_body() {
        assert_eq!(
            parse_body(r#"{"name": "Ada"}"#),
            Ok(serde_json::json!({ "name": "Ada" }))
        );
        assert!(parse_body("{name}").unwrap_err().starts_with("Invalid JSON"));
    }

    #[test]
    fn test_describe_symbol_conflicts_with_json() {
        let parsed = Cli::try_parse_from([
            "protodeck",
            "describe",
            "a.proto",
            "--symbol",
            "pkg.Msg",
            "--json",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_call_arguments() {
        let cli = Cli::try_parse_from([
            "protodeck",
            "call",
            "localhost:50051",
            "echo.EchoService/UnaryEcho",
            "--proto",
            "echo.proto",
            "-I",
            "vendor",
            "-H",
            "x-echo:1",
            "-v",
        ])
        .unwrap();

        assert!(cli.verbose);
        match cli.command {
            Commands::Call {
                method,
                body,
                include_dirs,
                headers,
                ..
            } => {
                assert_eq!(method.1, "UnaryEcho");
                assert_eq!(body, serde_json::json!({}));
                assert_eq!(include_dirs, vec![PathBuf::from("vendor")]);
                assert_eq!(headers, vec![("x-echo".to_string(), "1".to_string())]);
            }
            _ => panic!("expected the call command"),
        }
    }
}
