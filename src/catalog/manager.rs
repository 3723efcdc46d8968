//! Catalog store and event fan-out.

use crate::error::CatalogError;
use crate::types::SubscriptionId;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use tracing::{debug, info, warn};

use super::types::{CatalogConfig, CatalogEvent, CatalogRecord, WatchId};

/// Internal watcher state.
struct Watcher {
    id: WatchId,
    /// Feeds this watcher's delivery thread.
    queue: Sender<CatalogEvent>,
    /// Events lost because `queue` was full.
    dropped: Arc<AtomicU64>,
}

/// Copy-on-write list of registered watchers.
///
/// Writers clone the current `Arc` and deliver without holding the lock.
#[derive(Default)]
struct WatcherList {
    watchers: RwLock<Arc<Vec<Arc<Watcher>>>>,
}

impl WatcherList {
    fn snapshot(&self) -> Arc<Vec<Arc<Watcher>>> {
        Arc::clone(&self.watchers.read())
    }

    fn insert(&self, watcher: Watcher) {
        let mut watchers = self.watchers.write();
        let mut next = Vec::with_capacity(watchers.len() + 1);
        next.extend(watchers.iter().cloned());
        next.push(Arc::new(watcher));
        *watchers = Arc::new(next);
    }

    /// Keep only watchers matching `keep`. Returns how many were removed.
    fn retain<F>(&self, keep: F) -> usize
    where
        F: Fn(&Watcher) -> bool,
    {
        let mut watchers = self.watchers.write();
        let next: Vec<_> = watchers.iter().filter(|w| keep(w)).cloned().collect();
        let removed = watchers.len() - next.len();
        if removed > 0 {
            *watchers = Arc::new(next);
        }
        removed
    }

    fn clear(&self) {
        *self.watchers.write() = Arc::new(Vec::new());
    }

    fn len(&self) -> usize {
        self.watchers.read().len()
    }
}

/// Registry of active subscriptions with change notification.
pub struct Catalog {
    /// Records by subscription ID.
    records: RwLock<HashMap<SubscriptionId, CatalogRecord>>,
    /// Registered watchers. Handles hold a weak reference for `unwatch`.
    watchers: Arc<WatcherList>,
    /// Counter for generating watch IDs.
    next_watch_id: AtomicU64,
    /// Events dropped across all watchers.
    dropped: AtomicU64,
    /// Set by `close`, read under the records lock.
    closed: AtomicBool,
    config: CatalogConfig,
}

impl Catalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::with_config(CatalogConfig::default())
    }

    pub fn with_config(config: CatalogConfig) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            watchers: Arc::new(WatcherList::default()),
            next_watch_id: AtomicU64::new(1),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            config,
        }
    }

    /// Insert `record` under `id` unless `id` is already present.
    ///
    /// Returns `Ok(true)` and emits an `Added` event when inserted,
    /// `Ok(false)` without an event when the identifier already exists.
    pub fn add(&self, id: SubscriptionId, record: CatalogRecord) -> Result<bool, CatalogError> {
        let mut records = self.records.write();
        if self.closed.load(Ordering::Acquire) {
            return Err(CatalogError::Closed);
        }

        match records.entry(id) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                info!(
                    subscription = %slot.key(),
                    request_id = %record.request_id,
                    "Added catalog record"
                );
                slot.insert(record.clone());
                // Published under the write lock so event order is mutation order.
                self.publish(CatalogEvent::added(record));
                Ok(true)
            }
        }
    }

    /// Remove the record for `id`.
    ///
    /// Returns the removed record and emits a `Removed` event, or `Ok(None)`
    /// if `id` was not present.
    pub fn remove(&self, id: &SubscriptionId) -> Result<Option<CatalogRecord>, CatalogError> {
        let mut records = self.records.write();
        if self.closed.load(Ordering::Acquire) {
            return Err(CatalogError::Closed);
        }

        let Some(record) = records.remove(id) else {
            return Ok(None);
        };
        info!(
            subscription = %id,
            request_id = %record.request_id,
            "Removed catalog record"
        );
        self.publish(CatalogEvent::removed(record.clone()));
        Ok(Some(record))
    }

    /// Record for `id`, or the default record if absent.
    pub fn get(&self, id: &SubscriptionId) -> CatalogRecord {
        self.lookup(id).unwrap_or_default()
    }

    pub fn lookup(&self, id: &SubscriptionId) -> Option<CatalogRecord> {
        self.records.read().get(id).cloned()
    }

    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.records.read().contains_key(id)
    }

    /// Snapshot of every record, in no particular order.
    pub fn records(&self) -> Vec<(SubscriptionId, CatalogRecord)> {
        self.records
            .read()
            .iter()
            .map(|(id, record)| (id.clone(), record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Register `tx` to receive every future catalog event.
    ///
    /// Past events are not replayed. Events are forwarded by a dedicated
    /// thread; if `tx`'s receiver stops draining, this watcher's queue fills
    /// and later events are dropped for it alone. The watcher is pruned once
    /// its receiver is dropped. On a closed catalog nothing is registered
    /// and `tx` is dropped at once.
    pub fn watch(&self, tx: Sender<CatalogEvent>) -> CatalogWatch {
        let id = WatchId(self.next_watch_id.fetch_add(1, Ordering::SeqCst));
        let dropped = Arc::new(AtomicU64::new(0));
        let handle = CatalogWatch {
            id,
            dropped: Arc::clone(&dropped),
            watchers: Arc::downgrade(&self.watchers),
        };

        // Held until registered so `close` cannot slip in between.
        let _records = self.records.read();
        if self.closed.load(Ordering::Acquire) {
            debug!(watch = id.0, "Catalog closed, watcher not registered");
            return handle;
        }

        let (queue, queue_rx) = bounded(self.config.queue_capacity.max(1));
        thread::spawn(move || deliver(id, queue_rx, tx));

        self.watchers.insert(Watcher {
            id,
            queue,
            dropped,
        });
        debug!(watch = id.0, "Registered catalog watcher");
        handle
    }

    /// Number of registered watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.len()
    }

    /// Events dropped for slow watchers since creation.
    pub fn dropped_events(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Stop accepting mutations and release all watchers.
    ///
    /// Events already queued are still delivered. Idempotent.
    pub fn close(&self) {
        let _records = self.records.write();
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.watchers.clear();
        info!("Closed catalog");
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Queue `event` for every watcher. Never blocks.
    fn publish(&self, event: CatalogEvent) {
        let mut disconnected = Vec::new();

        for watcher in self.watchers.snapshot().iter() {
            match watcher.queue.try_send(event.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    watcher.dropped.fetch_add(1, Ordering::Relaxed);
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        watch = watcher.id.0,
                        kind = ?event.kind,
                        request_id = %event.record.request_id,
                        "Catalog watcher queue full, dropping event"
                    );
                }
                Err(TrySendError::Disconnected(_)) => disconnected.push(watcher.id),
            }
        }

        if !disconnected.is_empty() {
            let removed = self.watchers.retain(|w| !disconnected.contains(&w.id));
            debug!(removed, "Pruned disconnected catalog watchers");
        }
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

/// Delivery loop for one watcher. Exits when the queue is released or the
/// receiver is gone.
fn deliver(id: WatchId, queue: Receiver<CatalogEvent>, tx: Sender<CatalogEvent>) {
    for event in queue.iter() {
        if tx.send(event).is_err() {
            debug!(watch = id.0, "Catalog watcher receiver dropped");
            return;
        }
    }
}

/// Registration handle returned by [`Catalog::watch`].
///
/// Dropping the handle leaves the watcher registered; call
/// [`unwatch`](CatalogWatch::unwatch) to stop delivery.
pub struct CatalogWatch {
    id: WatchId,
    dropped: Arc<AtomicU64>,
    watchers: Weak<WatcherList>,
}

impl CatalogWatch {
    pub fn id(&self) -> WatchId {
        self.id
    }

    /// Events dropped for this watcher because its queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Remove this watcher. Events queued before the call are still delivered.
    pub fn unwatch(self) {
        if let Some(watchers) = self.watchers.upgrade() {
            watchers.retain(|w| w.id != self.id);
            debug!(watch = self.id.0, "Unregistered catalog watcher");
        }
    }
}
