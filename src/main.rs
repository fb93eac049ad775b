//! remoclip command-line entry point
//!
//! Runs the server (`remoclip serve`) or talks to one as a client.

use clap::Parser;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use remoclip::cli::{Cli, CliHandler, EXIT_FAILURE};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so pasted content on stdout stays untouched
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("remoclip={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!("remoclip v{}", remoclip::VERSION);

    let handler = CliHandler::new(cli.config);
    if let Err(e) = handler.handle_command(cli.command).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(EXIT_FAILURE);
    }
}
