//! `pinhub` command-line entry point.
//!
//! Reads one JSON request from `--json` or stdin, writes exactly one JSON
//! response to stdout and exits with status 0 iff it reports success.
//! Logs go to stderr.

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use pinhub::backend::BackendKind;
use pinhub::config::Config;
use serde_json::{Value, json};
use tracing_subscriber::EnvFilter;

/// Control Raspberry Pi GPIO pins with JSON commands.
#[derive(Parser, Debug)]
#[command(name = "pinhub")]
#[command(version)]
#[command(about = "Control GPIO pins, sensors and serial links with one JSON command")]
struct Args {
    /// Request object; read from stdin when omitted.
    #[arg(long, value_name = "JSON")]
    json: Option<String>,

    /// Configuration file (default: ./pinhub.toml when present).
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Device and routine store, overriding the configuration.
    #[arg(long, value_name = "FILE")]
    store: Option<PathBuf>,

    /// Pin backend, overriding the configuration.
    #[arg(long, value_enum)]
    backend: Option<BackendKind>,
}

fn prepare(args: &Args) -> anyhow::Result<(Config, String)> {
    let mut config = Config::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(store) = &args.store {
        config.store.path.clone_from(store);
    }
    if let Some(kind) = args.backend {
        config.backend.kind = kind;
    }
    let input = match &args.json {
        Some(json) => json.clone(),
        None => {
            let mut input = String::new();
            std::io::stdin()
                .read_to_string(&mut input)
                .context("reading request from stdin")?;
            input
        }
    };
    Ok((config, input))
}

fn setup_tracing(filter: &str) {
    let filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let args = Args::parse();
    let response = match prepare(&args) {
        Ok((config, input)) => {
            setup_tracing(&config.logging.filter);
            tracing::debug!(store = %config.store.path.display(), backend = %config.backend.kind, "configured");
            pinhub::answer(&config, &input).await
        }
        Err(err) => {
            setup_tracing("warn");
            tracing::error!("{err:#}");
            let response: Value = json!({
                "success": false,
                "error": format!("{err:#}"),
                "error_kind": "invalid_value",
            });
            response
        }
    };
    println!("{response}");
    if pinhub::succeeded(&response) {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
