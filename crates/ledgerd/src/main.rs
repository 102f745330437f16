//! ledgerd - gossip-ledger replication daemon
//!
//! Holds a replica of the hash-linked ledger, gossips new tips to its peers
//! and adopts the longest valid chain it hears about.

use clap::Parser;
use ledgerd::config::Config;
use ledgerd::server::Server;
use std::process::ExitCode;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn init_logging(config: &Config) -> anyhow::Result<()> {
    let level = if config.verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("ledgerd={level}").parse()?)
        .add_directive(format!("gossip_ledger_net={level}").parse()?);

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse configuration
    let config = Config::parse();

    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        return ExitCode::FAILURE;
    }

    if let Err(e) = init_logging(&config) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    info!(
        "ledgerd v{} - gossip-ledger replication daemon",
        env!("CARGO_PKG_VERSION")
    );

    let server = match Server::bind(config).await {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to initialize server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    // Log every entry the ledger adopts
    let mut entries = server.node().subscribe();
    tokio::spawn(async move {
        loop {
            match entries.recv().await {
                Ok(entry) => {
                    info!(index = entry.index, data = %entry.payload.as_value(), "new entry")
                }
                Err(RecvError::Lagged(missed)) => warn!(missed, "entry log fell behind"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            let _ = shutdown.send(());
        }
    });

    if let Err(e) = server.run().await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!(stats = ?server.stats(), "stopped");
    ExitCode::SUCCESS
}
