//! ledgerd server - main service loop

use crate::config::Config;
use crate::node::{Node, NodeError, NodeStats};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bind failed on {addr}: {source}")]
    BindFailed {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("Node error: {0}")]
    Node(#[from] NodeError),
}

/// Server state
pub struct Server {
    config: Config,
    node_name: String,
    node: Arc<Node>,
    listener: TcpListener,
    /// Shutdown signal
    shutdown_tx: broadcast::Sender<()>,
}

impl Server {
    /// Bind the peer listener and create the node
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.listen)
            .await
            .map_err(|source| ServerError::BindFailed {
                addr: config.listen,
                source,
            })?;
        let node = Arc::new(Node::new(config.outbound_queue));
        let node_name = config.resolve_node_name();
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            node_name,
            node,
            listener,
            shutdown_tx,
        })
    }

    /// The replicated node served by this server
    pub fn node(&self) -> Arc<Node> {
        Arc::clone(&self.node)
    }

    /// Name used in logs and heartbeat payloads
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Address the peer listener is bound to
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Sender that stops [`Server::run`] when signalled
    pub fn shutdown_handle(&self) -> broadcast::Sender<()> {
        self.shutdown_tx.clone()
    }

    /// Run the server
    pub async fn run(&self) -> Result<(), ServerError> {
        info!(
            node = %self.node_name,
            "Listening for peers on {}",
            self.local_addr()?
        );

        let peers = self.config.initial_peers();
        if !peers.is_empty() {
            info!("Connecting to {} initial peers", peers.len());
            self.node.connect_to_peers(peers)?;
        }

        let tick_handle = (self.config.tick_secs > 0).then(|| self.spawn_tick_task());

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!("Accepted connection from {}", addr);
                            if let Err(e) = stream.set_nodelay(true) {
                                debug!("set_nodelay failed for {}: {}", addr, e);
                            }
                            tokio::spawn(self.node().accept(stream));
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutting down...");
                    break;
                }
            }
        }

        if let Some(handle) = tick_handle {
            handle.abort();
        }

        Ok(())
    }

    /// Spawn the heartbeat append task
    fn spawn_tick_task(&self) -> tokio::task::JoinHandle<()> {
        let node = self.node();
        let name = self.node_name.clone();
        let period = Duration::from_secs(self.config.tick_secs);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            let mut tick: u64 = 0;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tick += 1;
                        if let Err(e) = node.append_local(&json!({"node": name, "tick": tick})) {
                            error!("Heartbeat append failed: {}", e);
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        })
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get server statistics
    pub fn stats(&self) -> NodeStats {
        self.node.stats()
    }
}
