//! Catalog record and event types.

use crate::types::{RequestId, Subscription};
use serde::{Deserialize, Serialize};

/// Configuration for a catalog.
#[derive(Clone, Debug)]
pub struct CatalogConfig {
    /// Max events queued per watcher before new events are dropped for it.
    /// Default: 1000
    pub queue_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1000,
        }
    }
}

/// One tracked subscription.
///
/// The default value stands for "no record" and is what
/// [`Catalog::get`](super::Catalog::get) returns for unknown identifiers.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    pub request_id: RequestId,
    pub subscription: Subscription,
}

impl CatalogRecord {
    pub fn new(request_id: RequestId, subscription: Subscription) -> Self {
        Self {
            request_id,
            subscription,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogEventKind {
    Added,
    Removed,
}

/// A catalog mutation, broadcast to every registered watcher.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEvent {
    pub kind: CatalogEventKind,
    pub record: CatalogRecord,
}

impl CatalogEvent {
    pub fn added(record: CatalogRecord) -> Self {
        Self {
            kind: CatalogEventKind::Added,
            record,
        }
    }

    pub fn removed(record: CatalogRecord) -> Self {
        Self {
            kind: CatalogEventKind::Removed,
            record,
        }
    }
}

/// Identifier of a catalog watcher registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct WatchId(pub u64);
