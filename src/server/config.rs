//! Server configuration.

use crate::error::Error;
use crate::{Result, DEFAULT_PEER_PORT, DEFAULT_PORT};

/// Server configuration.
///
/// A server listens on two ports: clients connect to `port` and their
/// mutating commands are replicated to every address in `peers`; other
/// servers connect to `peer_port`, where commands are applied locally and
/// not forwarded any further.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address for both listeners
    pub bind: String,
    /// Port for client connections
    pub port: u16,
    /// Port for peer connections
    pub peer_port: u16,
    /// Peer-listener addresses of the other servers in the replica set
    pub peers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            peer_port: DEFAULT_PEER_PORT,
            peers: Vec::new(),
        }
    }
}

impl Config {
    /// Address of the client listener.
    pub fn client_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    /// Address of the peer listener.
    pub fn peer_addr(&self) -> String {
        format!("{}:{}", self.bind, self.peer_port)
    }

    /// Check the configuration for contradictions before binding anything.
    pub fn validate(&self) -> Result<()> {
        if self.port == self.peer_port {
            return Err(Error::Config(format!(
                "client and peer listeners cannot share port {}",
                self.port
            )));
        }

        if self.peers.iter().any(|peer| peer.is_empty()) {
            return Err(Error::Config("empty peer address".to_string()));
        }

        Ok(())
    }
}
