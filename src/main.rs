//! Expense server entry point.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use expense_server::config::load_or_default;
use expense_server::lifecycle::serve;
use expense_server::observability::logging::init_tracing;

#[derive(Debug, Parser)]
#[command(name = "expense-server", version, about = "Expense sharing HTTP server")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "EXPENSE_SERVER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("expense-server: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_tracing(&config.observability) {
        eprintln!("expense-server: tracing init failed: {err}");
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        "expense-server starting"
    );

    match serve(config).await {
        Ok(code) => {
            tracing::info!("Shutdown complete");
            code
        }
        Err(err) => {
            tracing::error!(error = %err, "Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
