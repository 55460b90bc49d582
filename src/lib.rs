//! # replikv
//!
//! A small replicated key-value store served over TCP.
//!
//! Each server accepts client connections on one port and peer connections
//! on another. Commands that change data (`put`, `del`) are forwarded
//! verbatim to every configured peer; replies and peer acknowledgements are
//! collected under a fixed deadline, so a slow replica degrades replication
//! instead of stalling the client.
//!
//! The key-value map itself is owned by a single store actor and reached
//! only through message passing, which serializes every operation without
//! any shared-memory locking.
//!
//! ## Example
//!
//! ```no_run
//! use replikv::{Config, Result, Server};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let server = Arc::new(Server::new(Config::default()));
//!     server.run().await
//! }
//! ```

#![warn(
    clippy::all,
    rust_2018_idioms,
    trivial_casts,
    trivial_numeric_casts,
    unused_lifetimes,
    unused_qualifications
)]
#![allow(clippy::module_name_repetitions)]

/// Error types and result aliases.
pub mod error;
/// Wire protocol parsing and reply serialization.
pub mod protocol;
/// TCP server and connection management.
pub mod server;
/// In-memory key-value storage.
pub mod store;

pub use error::{Error, Result};
pub use protocol::{Command, Reply, Request};
pub use server::{Config, Connection, Server};
pub use store::Store;

/// Crate version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port for client connections.
pub const DEFAULT_PORT: u16 = 8000;

/// Default port for peer connections.
pub const DEFAULT_PEER_PORT: u16 = 8001;
