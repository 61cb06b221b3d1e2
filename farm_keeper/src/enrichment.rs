//! Hand-off of newly seen players to asynchronous enrichment.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use shared::orm::players::PlayerDb;
use shared::player::PlayerAddress;
use tokio::sync::mpsc;

use crate::db;
use crate::store::{now, PlayerStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrichmentTask {
    pub player_id: i32,
    pub address: PlayerAddress,
}

impl From<&PlayerDb> for EnrichmentTask {
    fn from(player: &PlayerDb) -> Self {
        Self {
            player_id: player.id,
            address: PlayerAddress::from(player),
        }
    }
}

pub trait EnrichmentSink {
    /// Schedules `task`. Returns `false` when a task for the same address is
    /// already queued or running.
    fn enqueue(&self, task: EnrichmentTask) -> anyhow::Result<bool>;
}

/// Addresses with an enrichment task queued or running.
#[derive(Debug)]
pub struct InFlight {
    inner: Arc<Mutex<HashSet<PlayerAddress>>>,
}

impl Clone for InFlight {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl InFlight {
    fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    fn insert(&self, address: &PlayerAddress) -> anyhow::Result<bool> {
        let mut in_flight = self
            .inner
            .lock()
            .map_err(|_| anyhow!("In-flight enrichment set is poisoned"))?;
        Ok(in_flight.insert(address.clone()))
    }

    fn remove(&self, address: &PlayerAddress) -> anyhow::Result<()> {
        let mut in_flight = self
            .inner
            .lock()
            .map_err(|_| anyhow!("In-flight enrichment set is poisoned"))?;
        in_flight.remove(address);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|set| set.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone)]
pub struct EnrichmentQueue {
    sender: mpsc::UnboundedSender<EnrichmentTask>,
    in_flight: InFlight,
}

pub struct EnrichmentReceiver {
    receiver: mpsc::UnboundedReceiver<EnrichmentTask>,
    in_flight: InFlight,
}

pub fn channel() -> (EnrichmentQueue, EnrichmentReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let in_flight = InFlight::new();
    (
        EnrichmentQueue {
            sender,
            in_flight: in_flight.clone(),
        },
        EnrichmentReceiver {
            receiver,
            in_flight,
        },
    )
}

impl EnrichmentQueue {
    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }
}

impl EnrichmentSink for EnrichmentQueue {
    fn enqueue(&self, task: EnrichmentTask) -> anyhow::Result<bool> {
        if !self.in_flight.insert(&task.address)? {
            tracing::debug!(address = %task.address, "Enrichment already in flight");
            return Ok(false);
        }
        let address = task.address.clone();
        if self.sender.send(task).is_err() {
            self.in_flight.remove(&address)?;
            return Err(anyhow!("Enrichment worker has stopped"));
        }
        Ok(true)
    }
}

impl EnrichmentReceiver {
    pub async fn next(&mut self) -> Option<EnrichmentTask> {
        self.receiver.recv().await
    }

    /// Releases the address of a task that has run to completion or failed.
    pub fn finish(&self, task: &EnrichmentTask) -> anyhow::Result<()> {
        self.in_flight.remove(&task.address)
    }
}

/// Enqueues every task, returning how many were actually scheduled.
pub fn dispatch<Q: EnrichmentSink + ?Sized>(
    queue: &Q,
    tasks: Vec<EnrichmentTask>,
) -> anyhow::Result<usize> {
    let mut enqueued = 0;
    for task in tasks {
        let address = task.address.clone();
        if queue.enqueue(task)? {
            tracing::info!(%address, "Enqueued player enrichment");
            enqueued += 1;
        }
    }
    Ok(enqueued)
}

/// Completes enrichment of one player by stamping its processing time.
pub fn enrich_player<S: PlayerStore + ?Sized>(
    store: &mut S,
    task: &EnrichmentTask,
) -> anyhow::Result<()> {
    store.mark_processed(task.player_id, now())?;
    tracing::info!(address = %task.address, "Player enrichment completed");
    Ok(())
}

/// Consumes enrichment tasks until every queue handle is dropped.
pub async fn run_worker(mut receiver: EnrichmentReceiver, pool: db::Pool) {
    while let Some(task) = receiver.next().await {
        let job = task.clone();
        let result = pool
            .with(move |conn| enrich_player(conn, &job))
            .await
            .and_then(|result| result);
        if let Err(err) = result {
            tracing::error!(address = %task.address, reason = ?err, "Failed to enrich player");
        }
        if let Err(err) = receiver.finish(&task) {
            tracing::error!(reason = ?err, "Failed to release enrichment task");
        }
    }
    tracing::info!("Enrichment worker stopped");
}
