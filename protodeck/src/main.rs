//! # Protodeck CLI Entry Point
//!
//! The main executable for Protodeck. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`], sets up logging and
//!    reads the configuration file.
//! 2. **Execution**: Loads the schema and talks to the server through a `protodeck_core`
//!    [`Workbench`], or hands stdin/stdout to [`serve::run`].
//! 3. **Presentation**: Formats and prints the resulting data or error to standard output/error.

mod cli;
mod config;
mod formatter;
mod serve;

use clap::Parser;
use cli::{Cli, Commands};
use config::ConfigManager;
use formatter::FormattedString;
use protodeck_core::config::Config;
use protodeck_core::descriptor;
use protodeck_core::dispatch::CallOptions;
use protodeck_core::schema::SchemaLoader;
use protodeck_core::workbench::{ApiError, ApiResponse, Workbench};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Session key used by the one-shot commands.
const CLI_SESSION: &str = "cli";

#[tokio::main]
async fn main() {
    let args = Cli::parse();

    init_tracing(args.verbose);

    let config = match load_config(args.config) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", FormattedString::from(err));
            process::exit(1);
        }
    };

    match args.command {
        Commands::Describe {
            proto,
            include_dirs,
            symbol,
            json,
        } => describe(&config, proto, include_dirs, symbol, json).await,
        Commands::Call {
            endpoint,
            method,
            proto,
            include_dirs,
            body,
            headers,
            timeout_ms,
        } => {
            let (service, method) = method;
            let options = CallOptions {
                headers,
                timeout: timeout_ms.map(Duration::from_millis),
            };
            run_call(config, endpoint, service, method, proto, include_dirs, body, options).await
        }
        Commands::Serve => {
            let workbench = Arc::new(Workbench::new(config));
            let input = tokio::io::BufReader::new(tokio::io::stdin());

            if let Err(err) = serve::run(workbench, input, tokio::io::stdout()).await {
                eprintln!("{}", FormattedString::from(err));
                process::exit(1);
            }
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Logs go to stderr, stdout carries results (and the serve protocol).
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<Config> {
    let manager = match path {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };
    tracing::debug!(path = %manager.path().display(), "Loading configuration");
    manager.load()
}

fn exit_on_error<T>(response: ApiResponse<T>) -> Option<T> {
    match response.into_result() {
        Ok(data) => data,
        Err(err) => fail(err),
    }
}

fn fail(err: ApiError) -> ! {
    eprintln!("{}", FormattedString::from(err));
    process::exit(1);
}

async fn describe(
    config: &Config,
    proto: PathBuf,
    include_dirs: Vec<PathBuf>,
    symbol: Option<String>,
    json: bool,
) {
    let schema = match SchemaLoader::new(config).load(&proto, &include_dirs).await {
        Ok(schema) => schema,
        Err(err) => fail(ApiError::from(&err)),
    };

    if let Some(symbol) = symbol {
        match schema.get_descriptor_by_symbol(&symbol) {
            Some(descriptor) => println!("{}", FormattedString::from(descriptor)),
            None => {
                eprintln!(
                    "{}",
                    FormattedString::from(anyhow::anyhow!("Symbol '{symbol}' not found"))
                );
                process::exit(1);
            }
        }
        return;
    }

    let set = descriptor::extract(&schema);
    if json {
        match serde_json::to_value(&set) {
            Ok(value) => println!("{}", FormattedString::from(value)),
            Err(err) => {
                eprintln!("{}", FormattedString::from(anyhow::Error::from(err)));
                process::exit(1);
            }
        }
    } else {
        println!("{}", FormattedString::from(set));
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_call(
    config: Config,
    endpoint: String,
    service: String,
    method: String,
    proto: PathBuf,
    include_dirs: Vec<PathBuf>,
    body: serde_json::Value,
    options: CallOptions,
) {
    let workbench = Workbench::new(config);

    exit_on_error(workbench.set_include_dirs(CLI_SESSION, include_dirs).await);
    exit_on_error(workbench.load_schema(CLI_SESSION, proto).await);
    exit_on_error(workbench.connect(CLI_SESSION, &endpoint, &service).await);

    let response = workbench
        .call_with_options(CLI_SESSION, &method, body, options)
        .await;

    if let Some(value) = exit_on_error(response) {
        println!("{}", FormattedString::from(value));
    }

    workbench.close_session(CLI_SESSION).await;
}
