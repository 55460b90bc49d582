//! Per-connection replication coordinator.
//!
//! Every parsed command is fanned out to a local dispatch task bound to the
//! store and to one relay task per peer link, then the results are fanned
//! back in under a single deadline. The client always gets exactly one reply
//! per command: the local store's authoritative reply when it arrives in
//! time, an error otherwise. Peer acknowledgements are collected best-effort;
//! a slow or dead peer degrades replication instead of stalling the client.

use crate::protocol::{Command, Reply, Request};
use crate::store::Store;
use bytes::Bytes;
use futures::future::join_all;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// How long a command may wait for the local reply and all peer
/// acknowledgements before the coordinator stops waiting.
pub const COMMAND_TIMEOUT: Duration = Duration::from_millis(500);

/// Coordinates one connection's workers: a local dispatch task wrapping the
/// store and one relay task per peer link.
///
/// All channels are bounded to one slot, so a worker that stops draining its
/// channel exerts backpressure instead of accumulating commands. Dropping
/// the coordinator closes the channels, which ends the workers and with them
/// their exclusively-owned peer links.
#[derive(Debug)]
pub struct Coordinator {
    local: mpsc::Sender<Request>,
    replies: mpsc::Receiver<Reply>,
    relays: Vec<mpsc::Sender<Request>>,
    acks: mpsc::Receiver<()>,
}

impl Coordinator {
    /// Spawn the local dispatch task and one relay task per peer link.
    /// Each relay takes exclusive ownership of its link.
    pub fn new<P>(store: Store, peers: Vec<P>) -> Self
    where
        P: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (local, local_commands) = mpsc::channel(1);
        let (reply_tx, replies) = mpsc::channel(1);
        tokio::spawn(dispatch_local(store, local_commands, reply_tx));

        let (ack_tx, acks) = mpsc::channel(1);
        let mut relays = Vec::with_capacity(peers.len());
        for (peer, link) in peers.into_iter().enumerate() {
            let (commands_tx, commands) = mpsc::channel(1);
            relays.push(commands_tx);
            tokio::spawn(relay(peer, link, commands, ack_tx.clone()));
        }

        Self {
            local,
            replies,
            relays,
            acks,
        }
    }

    /// Run one command to completion: broadcast it, then wait for the
    /// authoritative local reply plus one acknowledgement per relay, or for
    /// the deadline, whichever comes first.
    pub async fn dispatch(&mut self, request: Request) -> Reply {
        let deadline = tokio::time::sleep(COMMAND_TIMEOUT);
        tokio::pin!(deadline);

        // Broadcast with the sends joined concurrently, so a relay that has
        // stopped draining its channel cannot delay delivery to the store or
        // to the other relays.
        let expected_acks = self.relays.len();
        let local = self.local.clone();
        let relays = self.relays.clone();
        let fan_out = async move {
            let mut sends = Vec::with_capacity(relays.len() + 1);
            sends.push(local.send(request.clone()));
            for relay in &relays {
                sends.push(relay.send(request.clone()));
            }
            if join_all(sends).await.iter().any(|sent| sent.is_err()) {
                warn!("command dropped by a stopped worker");
            }
        };
        tokio::pin!(fan_out);
        let mut sending = true;

        let mut reply: Option<Reply> = None;
        let mut acks = 0;
        let mut local_gone = false;
        let mut relays_gone = false;

        loop {
            if acks == expected_acks {
                if let Some(reply) = reply.take() {
                    debug!(acks, "received reply and all peer acks");
                    return reply;
                }
            }

            tokio::select! {
                _ = &mut fan_out, if sending => sending = false,

                ack = self.acks.recv(), if acks < expected_acks && !relays_gone => match ack {
                    Some(()) => acks += 1,
                    None => relays_gone = true,
                },

                r = self.replies.recv(), if reply.is_none() && !local_gone => match r {
                    Some(r) => reply = Some(r),
                    None => local_gone = true,
                },

                _ = &mut deadline => {
                    warn!(
                        got_reply = reply.is_some(),
                        acks,
                        "command timed out"
                    );
                    return reply.unwrap_or(Reply::Error);
                }
            }
        }
    }
}

/// Translates commands into store operations and formats the authoritative
/// reply. Exits after answering a close, or when the command channel closes.
async fn dispatch_local(
    store: Store,
    mut commands: mpsc::Receiver<Request>,
    replies: mpsc::Sender<Reply>,
) {
    while let Some(request) = commands.recv().await {
        debug!(command = ?request.command, "dispatching to local store");

        let reply = match request.command {
            Command::Put { key, value } => match store.write(key, value).await {
                Ok(()) => Reply::Ack,
                Err(e) => {
                    warn!("put failed: {e}");
                    Reply::Error
                }
            },
            Command::Get { key, max_len } => match store.read(key).await {
                Ok(Some(value)) => Reply::Value(truncate(value, max_len)),
                Ok(None) => Reply::Nil,
                Err(e) => {
                    warn!("get failed: {e}");
                    Reply::Error
                }
            },
            Command::Delete { key } => match store.delete(key).await {
                Ok(()) => Reply::Ack,
                Err(e) => {
                    warn!("delete failed: {e}");
                    Reply::Error
                }
            },
            Command::Close => {
                if let Err(e) = store.close().await {
                    debug!("store already closed: {e}");
                }
                Reply::Closed
            }
        };

        let closing = reply.is_empty();
        if replies.send(reply).await.is_err() {
            return;
        }
        if closing {
            return;
        }
    }
}

/// Apply a get's max-length field: `0` means the whole value, anything not
/// shorter than the value returns it unchanged.
fn truncate(value: Bytes, max_len: usize) -> Bytes {
    if max_len == 0 || max_len >= value.len() {
        value
    } else {
        value.slice(..max_len)
    }
}

/// Forwards mutating commands verbatim over the exclusively-owned peer link
/// and waits for the peer's three-byte acknowledgement. Every command is
/// acknowledged on the shared channel whether or not any network I/O
/// happened or succeeded. Exits after acknowledging a close, or when the
/// command channel closes.
async fn relay<P>(peer: usize, mut link: P, mut commands: mpsc::Receiver<Request>, acks: mpsc::Sender<()>)
where
    P: AsyncRead + AsyncWrite + Unpin,
{
    while let Some(request) = commands.recv().await {
        if request.command.is_mutation() {
            debug!(peer, "replicating command to peer");

            if let Err(e) = link.write_all(&request.raw).await {
                warn!(peer, "peer write failed: {e}");
            } else {
                // No timeout on this read: a peer that never answers parks
                // this task, and only the coordinator's deadline keeps the
                // client moving.
                let mut ack = [0u8; 3];
                match link.read_exact(&mut ack).await {
                    Ok(_) => trace!(peer, reply = ?ack, "peer acknowledged"),
                    Err(e) => warn!(peer, "peer read failed: {e}"),
                }
            }
        }

        if acks.send(()).await.is_err() {
            return;
        }

        if matches!(request.command, Command::Close) {
            return;
        }
    }
}
