//! The `brawlcore-server` binary: CLI, logging, serve.

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use brawlcore::{BrawlcoreError, BrawlcoreServer};

/// Server-authoritative session core for two-player battles.
#[derive(Debug, Parser)]
#[command(name = "brawlcore-server", version, about)]
struct Cli {
    /// Address to bind (e.g. 127.0.0.1:8080).
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Log level when RUST_LOG is unset (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Output logs in JSON format.
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() -> Result<(), BrawlcoreError> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    let server = BrawlcoreServer::builder().bind(&cli.bind).build().await?;
    server.run().await
}
