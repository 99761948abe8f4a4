//! BeamStore Server Binary
//!
//! Main entry point for the BeamStore TCP server

use beamstore::config::parse_delimiter;
use beamstore::{BeamStoreServer, Result, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::{fmt, EnvFilter};

/// BeamStore Server
#[derive(Parser, Debug)]
#[command(name = "beamstore-server")]
#[command(about = "In-memory keyed byte store over TCP")]
#[command(version)]
struct Args {
    /// JSON config file; command-line flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (host:port)
    #[arg(short, long)]
    addr: Option<String>,

    /// Inbound queue length shared by all connections
    #[arg(long = "in-q")]
    inbound_capacity: Option<usize>,

    /// Reply channel length per connection
    #[arg(long)]
    reply_capacity: Option<usize>,

    /// Longest accepted frame in bytes
    #[arg(long)]
    max_frame_len: Option<usize>,

    /// Field delimiter, e.g. '\t' or '|'
    #[arg(long, value_parser = delimiter)]
    field_delim: Option<u8>,

    /// Message delimiter, e.g. '\n'
    #[arg(long, value_parser = delimiter)]
    message_delim: Option<u8>,

    /// Start with per-command diagnostic logging enabled
    #[arg(long)]
    diagnostics: bool,
}

fn delimiter(raw: &str) -> std::result::Result<u8, String> {
    parse_delimiter(raw).map_err(|e| e.to_string())
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_json_file(path)?,
            None => ServerConfig::default(),
        };

        if let Some(addr) = self.addr {
            config.bind_addr = addr;
        }
        if let Some(capacity) = self.inbound_capacity {
            config.inbound_capacity = capacity;
        }
        if let Some(capacity) = self.reply_capacity {
            config.reply_capacity = capacity;
        }
        if let Some(len) = self.max_frame_len {
            config.max_frame_len = len;
        }
        if let Some(field) = self.field_delim {
            config.delimiters.field = field;
        }
        if let Some(message) = self.message_delim {
            config.delimiters.message = message;
        }
        config.diagnostics |= self.diagnostics;

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_target(true).init();

    let config = Args::parse().into_config()?;

    let server = Arc::new(BeamStoreServer::bind(config).await?);

    // Setup graceful shutdown on SIGINT (Ctrl+C)
    let server_clone = Arc::clone(&server);
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }

        tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        if let Err(e) = server_clone.shutdown() {
            tracing::error!("Failed to initiate shutdown: {}", e);
        }
    });

    server.run().await?;

    Ok(())
}
