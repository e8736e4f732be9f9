//! Background writer that saves browser state without blocking the engine
//!
//! The browser updates its state synchronously; saves are queued to a
//! [`PersistActor`] running on the tokio runtime.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::store::{PersistedState, StateStore};

pub enum PersistMessage {
    Save(PersistedState),
    /// Reply once every earlier save has been written
    Flush(oneshot::Sender<()>),
    Shutdown,
}

pub struct PersistActor {
    store: Arc<dyn StateStore>,
    storage_key: String,
    receiver: mpsc::UnboundedReceiver<PersistMessage>,
    /// Raised when a write fails, so the handle stops deduplicating
    write_failed: Arc<AtomicBool>,
}

impl PersistActor {
    pub fn new(
        store: Arc<dyn StateStore>,
        storage_key: String,
        receiver: mpsc::UnboundedReceiver<PersistMessage>,
        write_failed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            store,
            storage_key,
            receiver,
            write_failed,
        }
    }

    pub async fn run(mut self) {
        while let Some(msg) = self.receiver.recv().await {
            match msg {
                PersistMessage::Save(state) => {
                    if let Err(e) = self.store.save(&self.storage_key, &state).await {
                        warn!(key = %self.storage_key, "failed to save browser state: {e:#}");
                        self.write_failed.store(true, Ordering::Release);
                    }
                }
                PersistMessage::Flush(done) => {
                    let _ = done.send(());
                }
                PersistMessage::Shutdown => {
                    break;
                }
            }
        }
        debug!(key = %self.storage_key, "persist actor stopped");
    }
}

/// Handle the browser holds when persistence is configured
pub struct Persistence {
    storage_key: String,
    store: Arc<dyn StateStore>,
    sender: mpsc::UnboundedSender<PersistMessage>,
    last_saved: Option<PersistedState>,
    write_failed: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Persistence {
    /// Spawn the writer task. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn StateStore>, storage_key: impl Into<String>) -> Self {
        let storage_key = storage_key.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let write_failed = Arc::new(AtomicBool::new(false));
        let actor = PersistActor::new(
            store.clone(),
            storage_key.clone(),
            receiver,
            write_failed.clone(),
        );
        let handle = tokio::spawn(actor.run());

        Self {
            storage_key,
            store,
            sender,
            last_saved: None,
            write_failed,
            handle: Some(handle),
        }
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    /// Best-effort read: missing or corrupt state yields `None`
    pub async fn load(&mut self) -> Option<PersistedState> {
        match self.store.load(&self.storage_key).await {
            Ok(state) => {
                self.last_saved = state.clone();
                state
            }
            Err(e) => {
                warn!(key = %self.storage_key, "ignoring unreadable browser state: {e:#}");
                None
            }
        }
    }

    /// Queue a save unless the state matches what was last written.
    /// After a failed write the next save always goes through.
    pub fn save(&mut self, state: PersistedState) {
        if self.write_failed.swap(false, Ordering::AcqRel) {
            self.last_saved = None;
        }
        if self.last_saved.as_ref() == Some(&state) {
            return;
        }
        if self.sender.send(PersistMessage::Save(state.clone())).is_err() {
            warn!(key = %self.storage_key, "persist actor is gone, state not saved");
            return;
        }
        self.last_saved = Some(state);
    }

    /// Wait until every queued save has reached the store
    pub async fn flush(&self) -> Result<()> {
        let (done, wait) = oneshot::channel();
        self.sender
            .send(PersistMessage::Flush(done))
            .map_err(|_| anyhow::anyhow!("persist actor is gone"))?;
        wait.await?;
        Ok(())
    }

    /// Flush pending saves and stop the writer task
    pub async fn shutdown(mut self) -> Result<()> {
        let _ = self.sender.send(PersistMessage::Shutdown);
        if let Some(handle) = self.handle.take() {
            handle.await?;
        }
        Ok(())
    }
}
