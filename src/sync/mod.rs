//! Reactive snapshot cache of the typed collections.
//!
//! Consumers watch one shared snapshot of staff, evaluations and themes
//! that always swaps atomically. Change events published by the facade
//! trigger refreshes, and a revision guard keeps an in-flight refresh from
//! publishing a snapshot older than one already published.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, watch};

use crate::facade::DatabaseFacade;
use crate::models::{Evaluation, StaffMember, Theme};
use crate::policy;
use crate::store::{Collection, RecordStore};

/// A single collection changed at the given revision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub revision: i64,
}

/// Broadcast channel for change events. Events carry the collection they
/// concern, so subscribers uninterested in a collection can skip it without
/// re-fetching.
pub struct ChangeHub {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(128);
        Self { tx }
    }

    pub fn publisher(&self) -> ChangePublisher {
        ChangePublisher {
            tx: self.tx.clone(),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Sending half handed to the facade. Publishing never blocks; without
/// subscribers the event is simply dropped.
#[derive(Clone)]
pub struct ChangePublisher {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangePublisher {
    pub fn publish(&self, collection: Collection, revision: i64) {
        let _ = self.tx.send(ChangeEvent { collection, revision });
    }
}

/// Immutable snapshot shared with every consumer. Cloning is cheap; the
/// collections themselves are behind `Arc`.
#[derive(Debug, Clone, Default)]
pub struct SyncSnapshot {
    pub staff: Arc<Vec<StaffMember>>,
    pub evaluations: Arc<Vec<Evaluation>>,
    pub themes: Arc<Vec<Theme>>,
    /// Revision the snapshot was built from.
    pub revision: i64,
    pub refreshed_at: Option<String>,
}

/// Application-wide cache of the last-fetched collections.
pub struct DataSyncStore {
    facade: DatabaseFacade,
    store: RecordStore,
    snapshot_tx: watch::Sender<SyncSnapshot>,
    loading_tx: watch::Sender<bool>,
    sync_version: AtomicI64,
    /// Pause between a forced resynchronize and the follow-up refresh.
    settle: Duration,
}

impl DataSyncStore {
    /// Create the store and start the listener task that refreshes the
    /// snapshot whenever a change event arrives.
    pub fn start(
        facade: DatabaseFacade,
        store: RecordStore,
        hub: &ChangeHub,
        settle: Duration,
    ) -> Arc<Self> {
        let (snapshot_tx, _) = watch::channel(SyncSnapshot::default());
        let (loading_tx, _) = watch::channel(false);
        let sync = Arc::new(Self {
            facade,
            store,
            snapshot_tx,
            loading_tx,
            sync_version: AtomicI64::new(0),
            settle,
        });

        let listener = Arc::clone(&sync);
        let mut events = hub.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => {
                        // The snapshot does not carry users
                        if event.collection == Collection::Users {
                            continue;
                        }
                        listener.refresh().await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(
                            "Sync listener lagged by {} change events, refreshing",
                            skipped
                        );
                        listener.refresh().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        sync
    }

    /// Re-fetch all three collections and publish them as one snapshot.
    /// Never fails: a fetch error degrades to direct store reads.
    pub async fn refresh(&self) {
        let _ = self.loading_tx.send(true);

        let fetched = tokio::try_join!(
            self.facade.get_staff(),
            self.facade.get_evaluations(),
            self.facade.get_themes(),
        );

        match fetched {
            Ok((staff, evaluations, themes)) => {
                let revision = self.facade.current_revision();
                self.publish(staff, evaluations, themes, Some(revision));
            }
            Err(e) => {
                tracing::warn!(
                    "Refresh through the facade failed ({}), falling back to the store",
                    e
                );
                self.refresh_from_store().await;
            }
        }

        let _ = self.loading_tx.send(false);
    }

    /// Degraded path: read raw records straight from the store and repair
    /// them locally. Keeps the last snapshot if even that fails.
    async fn refresh_from_store(&self) {
        let loaded = tokio::try_join!(
            self.store.load_collection(Collection::Staff),
            self.store.load_collection(Collection::Evaluations),
            self.store.load_collection(Collection::Themes),
        );

        match loaded {
            Ok((staff, evaluations, themes)) => {
                let published = self.publish(
                    policy::repair_staff(&staff),
                    policy::repair_evaluations(&evaluations),
                    policy::repair_themes(&themes),
                    None,
                );
                if published {
                    tracing::info!("Published snapshot from direct store reads");
                }
            }
            Err(e) => {
                tracing::error!("Store fallback failed, keeping last snapshot: {}", e);
            }
        }
    }

    /// Swap in a new snapshot unless that would move the published revision
    /// backwards. `revision: None` keeps the currently published revision.
    fn publish(
        &self,
        staff: Vec<StaffMember>,
        evaluations: Vec<Evaluation>,
        themes: Vec<Theme>,
        revision: Option<i64>,
    ) -> bool {
        self.snapshot_tx.send_if_modified(|current| {
            let resolved = revision.unwrap_or(current.revision);
            if resolved < current.revision {
                tracing::debug!(
                    "Skipping stale snapshot at revision {} (published is at {})",
                    resolved,
                    current.revision
                );
                return false;
            }
            *current = SyncSnapshot {
                staff: Arc::new(staff),
                evaluations: Arc::new(evaluations),
                themes: Arc::new(themes),
                revision: resolved,
                refreshed_at: Some(chrono::Utc::now().to_rfc3339()),
            };
            true
        })
    }

    /// Visible invalidation: empty the published snapshot immediately, ask
    /// the worker to resynchronize from the store, then refresh after the
    /// settle delay.
    pub async fn force_refresh(&self) {
        self.snapshot_tx.send_modify(|current| {
            *current = SyncSnapshot {
                revision: current.revision,
                ..SyncSnapshot::default()
            };
        });
        self.sync_version.fetch_add(1, Ordering::SeqCst);

        if let Err(e) = self.facade.force_sync_all().await {
            tracing::warn!("Resynchronize failed, refreshing from current state: {}", e);
        }

        tokio::time::sleep(self.settle).await;
        self.refresh().await;
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> SyncSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Watch handle for consumers that react to snapshot swaps.
    pub fn watch(&self) -> watch::Receiver<SyncSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        *self.loading_tx.borrow()
    }

    /// How many forced refreshes have run since startup.
    pub fn sync_version(&self) -> i64 {
        self.sync_version.load(Ordering::SeqCst)
    }
}
