use std::path::PathBuf;

use anyhow::{anyhow, Result};
use cardvault_core::{PersistenceSink, Snapshot, StorageManager};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

/// Outcome of one queued snapshot write.
#[derive(Debug)]
pub enum PersistEvent {
    Saved { path: PathBuf, cards: usize },
    Failed(String),
}

/// Hands snapshots to the writer task; writes happen in submission order.
pub struct ChannelSink {
    sender: mpsc::UnboundedSender<Snapshot>,
}

impl PersistenceSink for ChannelSink {
    fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        self.sender
            .send(snapshot.clone())
            .map_err(|_| anyhow!("persistence writer has stopped"))
    }
}

/// Spawn the single writer. Returns the sink for the store, the event
/// stream for the UI loop and the task handle, which finishes once every
/// sink is dropped and the queue is drained.
pub fn spawn_writer(
    storage: StorageManager,
) -> (ChannelSink, mpsc::Receiver<PersistEvent>, JoinHandle<()>) {
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<Snapshot>();
    let (event_tx, event_rx) = mpsc::channel(16);

    let handle = tokio::spawn(async move {
        while let Some(mut snapshot) = snapshot_rx.recv().await {
            // Only the newest queued snapshot matters.
            while let Ok(newer) = snapshot_rx.try_recv() {
                snapshot = newer;
            }
            let cards = snapshot.cards.len();
            let storage = storage.clone();
            let result = tokio::task::spawn_blocking(move || {
                storage.write_snapshot(&snapshot).map(|_| storage)
            })
            .await;
            let event = match result {
                Ok(Ok(storage)) => {
                    debug!(cards, "snapshot written");
                    PersistEvent::Saved {
                        path: storage.collection_path(),
                        cards,
                    }
                }
                Ok(Err(err)) => {
                    error!(?err, "snapshot write failed");
                    PersistEvent::Failed(format!("{err:#}"))
                }
                Err(err) => {
                    error!(?err, "snapshot writer panicked");
                    PersistEvent::Failed(err.to_string())
                }
            };
            // The UI may already be gone while the queue drains.
            let _ = event_tx.send(event).await;
        }
    });

    (ChannelSink { sender: snapshot_tx }, event_rx, handle)
}
