//! Connection handling for individual clients.

use super::Coordinator;
use crate::protocol::{self, Reply};
use crate::store::Store;
use crate::Result;
use bytes::{BufMut, BytesMut};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, trace};

/// Initial capacity of the accumulation and write buffers.
const BUFFER_CAPACITY: usize = 4096;

/// A connection to a single client.
///
/// Generic over the stream type so tests can drive in-memory duplex pipes;
/// the server hands it TCP streams.
#[derive(Debug)]
pub struct Connection<C> {
    /// Client stream; buffered on the read side because the handler reads
    /// one byte at a time
    stream: BufReader<C>,
    /// Accumulated bytes of the request currently being framed
    buffer: BytesMut,
    /// Reply serialization scratch space
    write_buffer: BytesMut,
    /// Fan-out/fan-in coordinator owning this connection's workers
    coordinator: Coordinator,
}

impl<C> Connection<C>
where
    C: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a connection handler, spawning its dispatch and relay workers.
    /// Each peer link is handed off to a relay for the connection's lifetime.
    pub fn new<P>(stream: C, store: Store, peers: Vec<P>) -> Self
    where
        P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        Self {
            stream: BufReader::new(stream),
            buffer: BytesMut::with_capacity(BUFFER_CAPACITY),
            write_buffer: BytesMut::with_capacity(BUFFER_CAPACITY),
            coordinator: Coordinator::new(store, peers),
        }
    }

    /// Run the connection handler until the client sends a close command,
    /// disconnects, or a write fails.
    ///
    /// The loop reads a single byte at a time: the parser re-examines the
    /// whole buffer after every byte, so a complete verdict always consumes
    /// exactly one command and the buffer reset can never swallow bytes of
    /// the next one.
    pub async fn run(&mut self) -> Result<()> {
        debug!("opened new client connection");

        loop {
            let byte = match self.stream.read_u8().await {
                Ok(byte) => byte,
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("connection closed by client");
                    return Ok(());
                }
                Err(e) => {
                    debug!("read error: {e}");
                    return Err(e.into());
                }
            };
            self.buffer.put_u8(byte);

            match protocol::parse(&self.buffer) {
                Ok(Some(request)) => {
                    debug!(command = ?request.command, "found command");

                    let reply = self.coordinator.dispatch(request).await;
                    if matches!(reply, Reply::Closed) {
                        info!("closing connection");
                        return Ok(());
                    }

                    self.write_reply(&reply).await?;
                    self.buffer.clear();
                }
                Ok(None) => {}
                Err(e) => {
                    debug!("discarding buffer: {e}");
                    self.write_reply(&Reply::Error).await?;
                    self.buffer.clear();
                }
            }
        }
    }

    async fn write_reply(&mut self, reply: &Reply) -> Result<()> {
        self.write_buffer.clear();
        reply.serialize(&mut self.write_buffer);

        if !self.write_buffer.is_empty() {
            trace!(bytes = self.write_buffer.len(), "writing reply");
            self.stream.write_all(&self.write_buffer).await?;
            self.stream.flush().await?;
        }

        Ok(())
    }
}
