//! Single-writer store actor.

use crate::error::StoreError;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

/// Handle to the store actor.
///
/// Cloning the handle shares the same underlying map. The actor processes
/// requests one at a time in arrival order, which makes single-key
/// operations linearizable; there is no cross-key atomicity.
///
/// `close` is a global, irreversible shutdown: when the handle is shared by
/// several connections, a close issued through any of them stops the actor
/// for all of them, and every later request fails with
/// [`StoreError::Closed`].
#[derive(Debug, Clone)]
pub struct Store {
    requests: mpsc::Sender<Operation>,
}

enum Operation {
    Read {
        key: Bytes,
        reply: oneshot::Sender<Option<Bytes>>,
    },
    Write {
        key: Bytes,
        value: Bytes,
        reply: oneshot::Sender<()>,
    },
    Delete {
        key: Bytes,
        reply: oneshot::Sender<()>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
}

impl Store {
    /// Spawn the actor task and return a handle to it.
    pub fn new() -> Self {
        let (requests, receiver) = mpsc::channel(1);
        tokio::spawn(run(receiver));
        Self { requests }
    }

    /// Returns the value of the key, or `None` when absent.
    pub async fn read(&self, key: Bytes) -> Result<Option<Bytes>, StoreError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Operation::Read { key, reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)
    }

    /// Sets or updates the key.
    pub async fn write(&self, key: Bytes, value: Bytes) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Operation::Write { key, value, reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)
    }

    /// Removes the key. Not an error when the key is absent.
    pub async fn delete(&self, key: Bytes) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Operation::Delete { key, reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)
    }

    /// Stops the actor. Acknowledged, then no further requests are serviced.
    pub async fn close(&self) -> Result<(), StoreError> {
        let (reply, response) = oneshot::channel();
        self.requests
            .send(Operation::Close { reply })
            .await
            .map_err(|_| StoreError::Closed)?;
        response.await.map_err(|_| StoreError::Closed)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializes map access by performing operations one at a time, with input
/// arriving only through the request channel.
async fn run(mut requests: mpsc::Receiver<Operation>) {
    let mut data: HashMap<Bytes, Bytes> = HashMap::new();

    while let Some(operation) = requests.recv().await {
        match operation {
            Operation::Read { key, reply } => {
                let _ = reply.send(data.get(&key).cloned());
            }
            Operation::Write { key, value, reply } => {
                data.insert(key, value);
                let _ = reply.send(());
            }
            Operation::Delete { key, reply } => {
                data.remove(&key);
                let _ = reply.send(());
            }
            Operation::Close { reply } => {
                let _ = reply.send(());
                break;
            }
        }
    }

    debug!("store actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"key1";
    const VALUE1: &[u8] = b"ABC";
    const VALUE2: &[u8] = b"DEF";

    fn key() -> Bytes {
        Bytes::from_static(KEY)
    }

    #[tokio::test]
    async fn test_empty_store_read() {
        let store = Store::new();

        assert_eq!(store.read(key()).await, Ok(None));

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_simple_read_and_write() {
        let store = Store::new();

        store.write(key(), Bytes::from_static(VALUE1)).await.unwrap();
        assert_eq!(
            store.read(key()).await,
            Ok(Some(Bytes::from_static(VALUE1)))
        );

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_update() {
        let store = Store::new();

        store.write(key(), Bytes::from_static(VALUE1)).await.unwrap();
        store.write(key(), Bytes::from_static(VALUE2)).await.unwrap();
        assert_eq!(
            store.read(key()).await,
            Ok(Some(Bytes::from_static(VALUE2)))
        );

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_store_delete() {
        let store = Store::new();

        // deleting an absent key is a no-op, not an error
        assert_eq!(store.delete(key()).await, Ok(()));

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete() {
        let store = Store::new();

        store.write(key(), Bytes::from_static(VALUE1)).await.unwrap();
        store.delete(key()).await.unwrap();
        assert_eq!(store.read(key()).await, Ok(None));

        store.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_store_rejects_requests() {
        let store = Store::new();

        store.close().await.unwrap();

        assert_eq!(store.read(key()).await, Err(StoreError::Closed));
        assert_eq!(
            store.write(key(), Bytes::from_static(VALUE1)).await,
            Err(StoreError::Closed)
        );
        assert_eq!(store.delete(key()).await, Err(StoreError::Closed));
        assert_eq!(store.close().await, Err(StoreError::Closed));
    }

    #[tokio::test]
    async fn test_shared_handle_sees_writes() {
        let store = Store::new();
        let other = store.clone();

        store.write(key(), Bytes::from_static(VALUE1)).await.unwrap();
        assert_eq!(
            other.read(key()).await,
            Ok(Some(Bytes::from_static(VALUE1)))
        );

        store.close().await.unwrap();
    }
}
