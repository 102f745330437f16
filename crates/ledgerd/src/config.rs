//! Configuration for ledgerd

use clap::Parser;
use std::net::SocketAddr;

/// ledgerd - gossip-ledger replication daemon
#[derive(Parser, Debug, Clone)]
#[command(name = "ledgerd")]
#[command(about = "Hash-linked ledger replicated over peer-to-peer gossip")]
pub struct Config {
    /// Listen address for peer connections
    #[arg(short, long, env = "LEDGER_LISTEN", default_value = "0.0.0.0:6001")]
    pub listen: SocketAddr,

    /// Peers to connect to at startup (comma-separated host:port)
    #[arg(long, env = "PEERS", value_delimiter = ',')]
    pub peers: Vec<String>,

    /// Name used in logs and heartbeat payloads (random if unset)
    #[arg(long, env = "NODE_NAME")]
    pub node_name: Option<String>,

    /// Append a heartbeat entry every N seconds (0 disables)
    #[arg(long, env = "TICK_SECS", default_value = "0")]
    pub tick_secs: u64,

    /// Per-peer outbound message queue depth
    #[arg(long, default_value = "256")]
    pub outbound_queue: usize,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Log format (json or pretty)
    #[arg(long, default_value = "pretty")]
    pub log_format: String,
}

impl Config {
    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(name) = &self.node_name {
            if name.trim().is_empty() {
                anyhow::bail!("Node name cannot be empty");
            }
        }
        if self.outbound_queue == 0 {
            anyhow::bail!("Outbound queue depth must be at least 1");
        }
        if !matches!(self.log_format.as_str(), "pretty" | "json") {
            anyhow::bail!("Unknown log format: {}", self.log_format);
        }
        Ok(())
    }

    /// Configured node name, or a random one
    pub fn resolve_node_name(&self) -> String {
        self.node_name
            .clone()
            .unwrap_or_else(|| format!("node-{:08x}", rand::random::<u32>()))
    }

    /// Initial peers with blank items removed
    pub fn initial_peers(&self) -> Vec<String> {
        self.peers
            .iter()
            .map(|peer| peer.trim())
            .filter(|peer| !peer.is_empty())
            .map(str::to_owned)
            .collect()
    }
}
