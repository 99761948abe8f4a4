//! BeamStore TCP server
//!
//! Accepts connections and spawns one `Connection` per client. All
//! connections feed the same bounded inbound queue in front of a single
//! store actor.

use crate::{
    actor::{self, OPERATOR_TARGET},
    config::{escape_delimiter, ServerConfig},
    connection::Connection,
    error::{BeamStoreError, Result},
    store::MemoryStore,
    VERSION,
};
use std::net::SocketAddr;
use tokio::{net::TcpListener, sync::broadcast};
use tracing::{debug, info, warn};

/// BeamStore TCP server
pub struct BeamStoreServer {
    config: ServerConfig,
    listener: TcpListener,
    shutdown_tx: broadcast::Sender<()>,
}

impl BeamStoreServer {
    /// Validate the configuration and bind the listening socket
    pub async fn bind(config: ServerConfig) -> Result<Self> {
        config.validate()?;
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            listener,
            shutdown_tx,
        })
    }

    /// Address actually bound, useful when the configured port is 0
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Start the store actor and accept connections until shutdown
    pub async fn run(&self) -> Result<()> {
        let addr = self.local_addr()?;
        info!(
            target: OPERATOR_TARGET,
            version = VERSION,
            addr = %addr,
            message_delimiter = %escape_delimiter(self.config.delimiters.message),
            field_delimiter = %escape_delimiter(self.config.delimiters.field),
            inbound_capacity = self.config.inbound_capacity,
            "beamstore listening"
        );

        let (inbound, _actor) = actor::spawn(
            MemoryStore::new(),
            self.config.delimiters,
            self.config.inbound_capacity,
            self.config.diagnostics,
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!(peer = %peer, "client connected");
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
                            }

                            let connection = Connection::new(
                                stream,
                                peer.to_string(),
                                inbound.clone(),
                                &self.config,
                                self.shutdown_tx.subscribe(),
                            );
                            tokio::spawn(async move {
                                let state = connection.serve().await;
                                debug!(peer = %peer, state = ?state, "client disconnected");
                            });
                        }
                        Err(e) => {
                            warn!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    info!("shutdown signal received, stopping server");
                    break;
                }
            }
        }

        info!("server stopped");
        Ok(())
    }

    /// Stop accepting connections and close every open one
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).map_err(|_| {
            BeamStoreError::Server("server is not running".to_string())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn local_config() -> ServerConfig {
        ServerConfig::default().bind_addr("127.0.0.1:0")
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let result = BeamStoreServer::bind(local_config().inbound_capacity(0)).await;
        assert!(matches!(result, Err(BeamStoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_bind_reports_ephemeral_port() {
        let server = BeamStoreServer::bind(local_config()).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_before_run_fails() {
        let server = BeamStoreServer::bind(local_config()).await.unwrap();
        assert!(server.shutdown().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_stops_run() {
        let server = Arc::new(BeamStoreServer::bind(local_config()).await.unwrap());
        let running = Arc::clone(&server);
        let handle = tokio::spawn(async move { running.run().await });

        // run() subscribes to the shutdown channel once it starts
        let mut stopped = false;
        for _ in 0..50 {
            if server.shutdown().is_ok() {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(stopped);

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("server did not stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
