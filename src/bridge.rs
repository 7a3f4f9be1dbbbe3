//! Request channel between the state manager and the persistent store.
//!
//! One worker thread owns the [`Store`] and drains a FIFO queue, so saves reach disk in
//! the order they were issued and a later snapshot is never overwritten by an earlier one.

use std::thread;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::migrate::{migrate, MigrateError};
use crate::models::DataFile;
use crate::state::{AppState, SubscriptionId};
use crate::storage::{StorageError, Store};

pub const DEFAULT_DATA_KEY: &str = "data";

#[derive(Debug)]
pub enum BridgeError {
    Storage(StorageError),
    Migrate(MigrateError),
    Spawn(std::io::Error),
    /// The worker has stopped and no longer accepts requests.
    Closed,
}

impl std::fmt::Display for BridgeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BridgeError::Storage(err) => write!(f, "storage error: {err}"),
            BridgeError::Migrate(err) => write!(f, "migration error: {err}"),
            BridgeError::Spawn(err) => write!(f, "failed to start store worker: {err}"),
            BridgeError::Closed => write!(f, "store worker is not running"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<StorageError> for BridgeError {
    fn from(value: StorageError) -> Self {
        BridgeError::Storage(value)
    }
}

impl From<MigrateError> for BridgeError {
    fn from(value: MigrateError) -> Self {
        BridgeError::Migrate(value)
    }
}

enum Request {
    Load {
        reply: oneshot::Sender<Result<DataFile, BridgeError>>,
    },
    Save {
        data: DataFile,
    },
    Flush {
        reply: oneshot::Sender<()>,
    },
}

#[derive(Clone)]
pub struct Bridge {
    tx: mpsc::UnboundedSender<Request>,
}

impl Bridge {
    /// Starts the worker. It exits once every `Bridge` handle has been dropped.
    pub fn spawn<S: Store>(store: S, key: impl Into<String>) -> Result<Self, BridgeError> {
        let key = key.into();
        let (tx, rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("store-bridge".to_string())
            .spawn(move || run_worker(store, key, rx))
            .map_err(BridgeError::Spawn)?;
        Ok(Self { tx })
    }

    /// Reads the stored collection, upgrading older layouts. A missing key yields an
    /// empty collection.
    pub async fn load(&self) -> Result<DataFile, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Load { reply })
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)?
    }

    /// Queues a full overwrite of the stored collection without waiting for it.
    pub fn save(&self, data: DataFile) {
        if self.tx.send(Request::Save { data }).is_err() {
            log::error!("save dropped: store worker is not running");
        }
    }

    /// Resolves once every request issued before it has been applied.
    pub async fn flush(&self) -> Result<(), BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Request::Flush { reply })
            .map_err(|_| BridgeError::Closed)?;
        rx.await.map_err(|_| BridgeError::Closed)
    }
}

/// Saves every committed snapshot of `state` through `bridge`.
pub fn persist_through(state: &AppState, bridge: &Bridge) -> SubscriptionId {
    let bridge = bridge.clone();
    state.subscribe(move |data| bridge.save(data.clone()))
}

fn run_worker<S: Store>(mut store: S, key: String, mut rx: mpsc::UnboundedReceiver<Request>) {
    log::debug!("store worker started key={key}");
    while let Some(request) = rx.blocking_recv() {
        match request {
            Request::Load { reply } => {
                let _ = reply.send(load_from(&store, &key));
            }
            Request::Save { data } => {
                if let Err(error) = save_to(&mut store, &key, &data) {
                    log::error!("save failed key={key}: {error}");
                }
            }
            Request::Flush { reply } => {
                let _ = reply.send(());
            }
        }
    }
    log::debug!("store worker stopped key={key}");
}

fn load_from<S: Store>(store: &S, key: &str) -> Result<DataFile, BridgeError> {
    let default = serde_json::to_value(DataFile::default()).map_err(StorageError::from)?;
    let value = store.get(key, default)?;
    Ok(migrate(value)?)
}

fn save_to<S: Store>(store: &mut S, key: &str, data: &DataFile) -> Result<(), BridgeError> {
    let value: Value = serde_json::to_value(data).map_err(StorageError::from)?;
    store.set(key, value)?;
    Ok(())
}
