//! ferryd — Ferry file receiver daemon.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use ferry_core::config::FerryConfig;
use ferry_services::{bind_socket, FileStorage, Receiver, ReceiverSettings};

/// Receive a file sent as numbered UDP chunks and write it to disk.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Port to listen on [config default: 12001].
    #[arg(long)]
    port: Option<u16>,

    /// File path to save data [config default: received_file.jpg].
    #[arg(long)]
    output: Option<PathBuf>,

    /// Address to bind [config default: 0.0.0.0].
    #[arg(long)]
    bind: Option<IpAddr>,

    /// Config file (overrides $FERRY_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Refuse to buffer chunks this far ahead of the next expected one. 0 = unbounded.
    #[arg(long)]
    reorder_window: Option<u32>,
}

impl Cli {
    fn apply(&self, config: &mut FerryConfig) {
        if let Some(port) = self.port {
            config.network.port = port;
        }
        if let Some(output) = &self.output {
            config.output.path = output.clone();
        }
        if let Some(bind) = self.bind {
            config.network.bind_addr = bind;
        }
        if let Some(window) = self.reorder_window {
            config.reassembly.reorder_window = window;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load config
    let config_path = cli.config.clone().unwrap_or_else(FerryConfig::file_path);
    let mut config = FerryConfig::load_from(&config_path).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        FerryConfig::defaults_with_env()
    });
    cli.apply(&mut config);

    let addr = SocketAddr::new(config.network.bind_addr, config.network.port);
    let socket = bind_socket(addr, config.network.recv_buffer_bytes)?;
    tracing::info!(
        %addr,
        reorder_window = config.reassembly.reorder_window,
        "ferryd starting"
    );

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
                return;
            }
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let receiver = Receiver::new(
        socket,
        FileStorage,
        ReceiverSettings::from_config(&config),
        shutdown_rx,
    );

    // ── Wait for exit ────────────────────────────────────────────────────────
    let summary = receiver.run().await?;
    if let Some(bytes) = summary.partial_bytes {
        tracing::warn!(bytes, "transfer was interrupted before end of file");
    }

    drop(shutdown_tx);
    Ok(())
}
