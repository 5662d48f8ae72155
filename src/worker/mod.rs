//! Storage worker: single owner of the in-memory datastore mirror.
//!
//! All requests arrive over an mpsc channel and are applied strictly in
//! arrival order, so no two mutations ever race on the store. Persistence
//! runs off the request path: a write marks its collection dirty and a
//! detached save task flushes it after a debounce quiet period, with a
//! periodic forced flush bounding how stale the store may get. Mutations
//! succeed against memory regardless of persistence health; a failed flush
//! leaves the collection dirty for the next cycle.

mod coalesce;
mod messages;

pub use messages::{DeleteOutcome, StorageRequest, StorageResponse};

use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use coalesce::FlushTracker;

use crate::errors::AppError;
use crate::policy;
use crate::store::{Collection, Mirror, Record, RecordStore};

/// Flush timing knobs.
#[derive(Debug, Clone, Copy)]
pub struct FlushPolicy {
    /// Quiet period after a write before its collection is persisted.
    pub debounce: Duration,
    /// Upper bound on how long a dirty collection may wait for a flush.
    pub max_interval: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
            max_interval: Duration::from_secs(30),
        }
    }
}

struct Envelope {
    request: StorageRequest,
    reply: oneshot::Sender<StorageResponse>,
}

/// Cloneable handle for sending requests to the worker.
#[derive(Clone)]
pub struct WorkerHandle {
    tx: mpsc::Sender<Envelope>,
}

impl WorkerHandle {
    /// Send a request and wait for the response.
    pub async fn send(&self, request: StorageRequest) -> Result<StorageResponse, AppError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| AppError::WorkerUnavailable("Storage worker is not running".to_string()))?;
        rx.await.map_err(|_| {
            AppError::WorkerUnavailable("Storage worker dropped the request".to_string())
        })
    }

    /// A handle whose worker is gone, for exercising degraded paths.
    #[cfg(test)]
    pub(crate) fn disconnected() -> WorkerHandle {
        let (tx, _) = mpsc::channel(1);
        WorkerHandle { tx }
    }
}

/// Load the mirror from the store and spawn the worker task.
pub async fn spawn(store: RecordStore, policy: FlushPolicy) -> Result<WorkerHandle, AppError> {
    let mirror = store.load_all().await?;
    let revision = store.load_revision().await?;

    tracing::info!(
        "Storage worker starting at revision {} ({} staff, {} themes, {} evaluations, {} users)",
        revision,
        mirror.staff.len(),
        mirror.themes.len(),
        mirror.evaluations.len(),
        mirror.users.len()
    );

    let (tx, rx) = mpsc::channel(64);
    let worker = StorageWorker {
        store,
        mirror,
        revision,
        tracker: FlushTracker::new(policy.debounce),
        policy,
        rx,
        flushes: JoinSet::new(),
    };
    tokio::spawn(worker.run());

    Ok(WorkerHandle { tx })
}

struct StorageWorker {
    store: RecordStore,
    mirror: Mirror,
    /// Monotonic, bumped once per state-changing request. Resumes from the
    /// persisted value at startup and never decreases.
    revision: i64,
    tracker: FlushTracker,
    policy: FlushPolicy,
    rx: mpsc::Receiver<Envelope>,
    flushes: JoinSet<(Collection, u64, bool)>,
}

impl StorageWorker {
    async fn run(mut self) {
        let mut forced = interval_at(
            Instant::now() + self.policy.max_interval,
            self.policy.max_interval,
        );
        forced.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let deadline = self.tracker.next_deadline();
            // Placeholder keeps the branch type-checked while disabled
            let debounce_at =
                deadline.unwrap_or_else(|| Instant::now() + Duration::from_secs(86_400));

            tokio::select! {
                envelope = self.rx.recv() => match envelope {
                    Some(Envelope { request, reply }) => {
                        let response = self.handle(request).await;
                        let _ = reply.send(response);
                    }
                    None => break,
                },
                Some(result) = self.flushes.join_next(), if !self.flushes.is_empty() => {
                    self.on_flush_done(result);
                }
                _ = tokio::time::sleep_until(debounce_at), if deadline.is_some() => {
                    let due = self.tracker.take_due(Instant::now());
                    self.start_flushes(due);
                }
                _ = forced.tick() => {
                    let due = self.tracker.take_forced();
                    if !due.is_empty() {
                        tracing::debug!("Forced flush of {} dirty collections", due.len());
                    }
                    self.start_flushes(due);
                }
            }
        }

        self.shutdown().await;
    }

    async fn handle(&mut self, request: StorageRequest) -> StorageResponse {
        match request {
            StorageRequest::Get { data_type } => self.get(data_type),
            StorageRequest::Create { data_type, data } => self.create(data_type, data),
            StorageRequest::Update { data_type, id, data } => self.update(data_type, id, data),
            StorageRequest::Delete { data_type, id } => self.delete(data_type, id),
            StorageRequest::BulkUpdate { data_type, data } => self.bulk_update(data_type, data),
            StorageRequest::Clear { data_type } => self.clear(data_type),
            StorageRequest::Reload => self.reload().await,
        }
    }

    fn get(&self, data_type: String) -> StorageResponse {
        // Unknown collection names read as empty rather than failing
        let data = match Collection::parse(&data_type) {
            Some(collection) => self.mirror.collection(collection).clone(),
            None => Vec::new(),
        };
        StorageResponse::GetResult {
            data_type,
            data,
            success: true,
            revision: self.revision,
        }
    }

    fn create(&mut self, data_type: String, mut data: Record) -> StorageResponse {
        let Some(collection) = Collection::parse(&data_type) else {
            return unknown_collection(&data_type);
        };

        let records = self.mirror.collection_mut(collection);
        let id = allocate_id(records);
        // id and createdAt are assigned here, never trusted from the caller
        data.insert("id".to_string(), serde_json::Value::from(id));
        data.insert(
            "createdAt".to_string(),
            serde_json::Value::from(Utc::now().to_rfc3339()),
        );
        records.push(data.clone());

        self.mark_written(collection);
        StorageResponse::CreateResult {
            data_type,
            data,
            success: true,
            revision: self.revision,
        }
    }

    fn update(&mut self, data_type: String, id: i64, data: Record) -> StorageResponse {
        let Some(collection) = Collection::parse(&data_type) else {
            return unknown_collection(&data_type);
        };

        let revision = self.revision;
        let records = self.mirror.collection_mut(collection);
        let Some(index) = records.iter().position(|r| policy::record_id(r) == Some(id)) else {
            let error = format!("No record with id {} in {}", id, data_type);
            return StorageResponse::UpdateResult {
                data_type,
                data: None,
                success: false,
                error: Some(error),
                revision,
            };
        };

        // Shallow merge: fields absent from the partial keep their exact value
        for (key, value) in data {
            records[index].insert(key, value);
        }
        let merged = records[index].clone();

        self.mark_written(collection);
        StorageResponse::UpdateResult {
            data_type,
            data: Some(merged),
            success: true,
            error: None,
            revision: self.revision,
        }
    }

    fn delete(&mut self, data_type: String, id: i64) -> StorageResponse {
        let Some(collection) = Collection::parse(&data_type) else {
            return unknown_collection(&data_type);
        };

        let records = self.mirror.collection_mut(collection);
        let mut removed = Vec::new();
        // All matching records go: duplicate ids are purged, not kept
        records.retain(|record| {
            if policy::record_id(record) == Some(id) {
                removed.push(record.clone());
                false
            } else {
                true
            }
        });

        let changes = removed.len() as u64;
        if changes > 0 {
            self.mark_written(collection);
            if collection == Collection::Staff {
                self.cascade_staff_delete(&removed);
            }
        }

        StorageResponse::DeleteResult {
            data_type,
            data: DeleteOutcome {
                success: changes > 0,
                changes,
            },
            success: true,
            revision: self.revision,
        }
    }

    /// Evaluations referencing deleted staff go with them, matched by
    /// staffId or by the legacy firstName/lastName pair.
    fn cascade_staff_delete(&mut self, removed_staff: &[Record]) {
        let evaluations = &mut self.mirror.evaluations;
        let before = evaluations.len();
        evaluations.retain(|evaluation| {
            !removed_staff
                .iter()
                .any(|staff| policy::cascade_matches(staff, evaluation))
        });

        let removed = before - evaluations.len();
        if removed > 0 {
            tracing::info!(
                "Cascade removed {} evaluations for {} deleted staff records",
                removed,
                removed_staff.len()
            );
            self.tracker.note_write(Collection::Evaluations, Instant::now());
        }
    }

    fn bulk_update(&mut self, data_type: String, data: Vec<Record>) -> StorageResponse {
        let Some(collection) = Collection::parse(&data_type) else {
            return unknown_collection(&data_type);
        };

        *self.mirror.collection_mut(collection) = data.clone();
        self.mark_written(collection);
        StorageResponse::BulkUpdateResult {
            data_type,
            data,
            success: true,
            revision: self.revision,
        }
    }

    fn clear(&mut self, data_type: String) -> StorageResponse {
        let Some(collection) = Collection::parse(&data_type) else {
            return unknown_collection(&data_type);
        };

        let records = self.mirror.collection_mut(collection);
        if !records.is_empty() {
            records.clear();
            self.mark_written(collection);
        }

        StorageResponse::ClearResult {
            data_type,
            data: Vec::new(),
            success: true,
            revision: self.revision,
        }
    }

    async fn reload(&mut self) -> StorageResponse {
        // Drain in-flight saves so a stale flight cannot clobber the store
        // right after we re-read it
        while let Some(result) = self.flushes.join_next().await {
            self.on_flush_done(result);
        }

        match self.store.load_all().await {
            Ok(mirror) => {
                // Unflushed edits are discarded in favor of persisted truth
                self.mirror = mirror;
                self.tracker = FlushTracker::new(self.policy.debounce);
                let persisted = self.store.load_revision().await.unwrap_or(self.revision);
                self.revision = self.revision.max(persisted);
                tracing::info!("Reloaded mirror from store at revision {}", self.revision);
                StorageResponse::ReloadResult {
                    data: self.mirror.clone(),
                    success: true,
                    revision: self.revision,
                }
            }
            Err(e) => {
                tracing::error!("Reload failed, keeping current mirror: {}", e);
                StorageResponse::error(format!("Reload failed: {}", e))
            }
        }
    }

    fn mark_written(&mut self, collection: Collection) {
        self.revision += 1;
        self.tracker.note_write(collection, Instant::now());
    }

    fn start_flushes(&mut self, due: Vec<(Collection, u64)>) {
        for (collection, epoch) in due {
            let store = self.store.clone();
            let records = self.mirror.collection(collection).clone();
            let revision = self.revision;
            self.flushes.spawn(async move {
                let ok = match store.save_collection(collection, &records, revision).await {
                    Ok(()) => true,
                    Err(e) => {
                        tracing::error!("Failed to flush collection {}: {}", collection, e);
                        false
                    }
                };
                (collection, epoch, ok)
            });
        }
    }

    fn on_flush_done(&mut self, result: Result<(Collection, u64, bool), tokio::task::JoinError>) {
        match result {
            Ok((collection, epoch, ok)) => {
                if ok {
                    tracing::debug!("Flushed collection {}", collection);
                }
                self.tracker.complete(collection, epoch, ok, Instant::now());
            }
            Err(e) => {
                tracing::error!("Flush task failed: {}", e);
            }
        }
    }

    /// Last chance for dirty state once all handles are gone.
    async fn shutdown(mut self) {
        while let Some(result) = self.flushes.join_next().await {
            self.on_flush_done(result);
        }

        for collection in self.tracker.dirty_collections() {
            let records = self.mirror.collection(collection).clone();
            if let Err(e) = self
                .store
                .save_collection(collection, &records, self.revision)
                .await
            {
                tracing::error!("Final flush of {} failed: {}", collection, e);
            }
        }

        tracing::info!("Storage worker stopped at revision {}", self.revision);
    }
}

fn unknown_collection(data_type: &str) -> StorageResponse {
    StorageResponse::error(format!("Unknown collection: {}", data_type))
}

/// Timestamp-derived id with random jitter, probed upward until unused in
/// the collection. Same-millisecond creations stay distinct.
fn allocate_id(records: &[Record]) -> i64 {
    let mut candidate = Utc::now().timestamp_millis() + rand::thread_rng().gen_range(0..1_000i64);
    while records
        .iter()
        .any(|record| policy::record_id(record) == Some(candidate))
    {
        candidate += 1;
    }
    candidate
}
