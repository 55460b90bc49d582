//! TCP server and connection management.

mod config;
mod connection;
mod coordinator;

pub use config::Config;
pub use connection::Connection;
pub use coordinator::{Coordinator, COMMAND_TIMEOUT};

use crate::store::Store;
use crate::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// The replikv server: a client listener and a peer listener sharing one
/// store actor.
///
/// The store handle is shared across every connection the server accepts,
/// so a close command issued by any client stops the store for all of them.
#[derive(Debug)]
pub struct Server {
    /// Server configuration
    config: Config,
    /// Store handle shared by all connections
    store: Store,
    /// Shutdown notification
    shutdown: Arc<Notify>,
}

impl Server {
    /// Create a new server with the given configuration, spawning its
    /// store actor.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: Store::new(),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run the server: accept client and peer connections until a shutdown
    /// signal arrives.
    pub async fn run(self: Arc<Self>) -> Result<()> {
        self.config.validate()?;

        let client_listener = TcpListener::bind(self.config.client_addr()).await?;
        info!("listening for clients on {}", self.config.client_addr());

        let peer_listener = TcpListener::bind(self.config.peer_addr()).await?;
        info!("listening for peers on {}", self.config.peer_addr());

        loop {
            tokio::select! {
                result = client_listener.accept() => match result {
                    Ok((socket, addr)) => self.clone().spawn_client(socket, addr),
                    Err(e) => error!("failed to accept client connection: {e}"),
                },

                result = peer_listener.accept() => match result {
                    Ok((socket, addr)) => self.clone().spawn_peer(socket, addr),
                    Err(e) => error!("failed to accept peer connection: {e}"),
                },

                _ = self.shutdown.notified() => {
                    info!("shutdown signal received");
                    return Ok(());
                }
            }
        }
    }

    /// Handle an accepted client connection: open one fresh link per
    /// configured peer, then run the connection handler. Client commands
    /// are replicated to every peer.
    fn spawn_client(self: Arc<Self>, socket: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            info!("new client connection from {addr}");

            if let Err(e) = socket.set_nodelay(true) {
                warn!("failed to set TCP_NODELAY: {e}");
            }

            let links = match open_peer_links(&self.config.peers).await {
                Ok(links) => links,
                Err(e) => {
                    // a connection without its full replica set is not served
                    error!("dropping connection from {addr}: {e}");
                    return;
                }
            };

            let mut connection = Connection::new(socket, self.store.clone(), links);
            if let Err(e) = connection.run().await {
                error!("connection error from {addr}: {e}");
            }
        });
    }

    /// Handle an accepted peer connection. Commands arriving from a peer
    /// were already replicated by the originating server, so they are
    /// applied locally and forwarded no further.
    fn spawn_peer(self: Arc<Self>, socket: TcpStream, addr: SocketAddr) {
        tokio::spawn(async move {
            info!("new peer connection from {addr}");

            if let Err(e) = socket.set_nodelay(true) {
                warn!("failed to set TCP_NODELAY: {e}");
            }

            let mut connection =
                Connection::new(socket, self.store.clone(), Vec::<TcpStream>::new());
            if let Err(e) = connection.run().await {
                error!("peer connection error from {addr}: {e}");
            }
        });
    }

    /// Signal the server to shut down.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }

    /// Get the shared store handle.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// Open one link per configured peer address. Any dial failure abandons the
/// links opened so far; they close on drop.
async fn open_peer_links(peers: &[String]) -> Result<Vec<TcpStream>> {
    let mut links = Vec::with_capacity(peers.len());

    for peer in peers {
        debug!("opening peer link to {peer}");
        let link = TcpStream::connect(peer).await?;

        if let Err(e) = link.set_nodelay(true) {
            warn!("failed to set TCP_NODELAY on peer link: {e}");
        }

        links.push(link);
    }

    Ok(links)
}
