//! Multi-port Broadcast Chat Server - Entry Point
//!
//! Loads the config, starts logging and the worker pool, then serves
//! every configured port until terminated.

use std::path::{Path, PathBuf};
use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use portchat::config::{ServerConfig, DEFAULT_CONFIG_PATH};
use portchat::dispatcher;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(version, about = "Multi-port broadcast chat server")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level filter, overrides the config file
    #[arg(long, env = "PORTCHAT_LOG")]
    log_level: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let mut config = match ServerConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            process::exit(1);
        }
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    // Held until exit so buffered log lines are flushed
    let _guard = init_logging(&config.log_level, &config.log_file);

    let runtime = match dispatcher::build_runtime(config.workers) {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start worker pool: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(dispatcher::serve(&config)) {
        error!("Server error: {}", e);
        process::exit(1);
    }
    info!("Server stopped");
}

/// Initialize console and file logging
///
/// Use RUST_LOG env var to override the level,
/// e.g. RUST_LOG=debug or RUST_LOG=portchat=trace
fn init_logging(level: &str, log_file: &Path) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_dir = log_file
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let (file_layer, guard) = match log_file.file_name() {
        Some(file_name) => {
            let appender = tracing_appender::rolling::never(log_dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}
