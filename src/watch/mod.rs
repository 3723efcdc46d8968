//! Watchers that turn external change streams into work items.
//!
//! Two sources feed the reconciliation runtime:
//! - [`TaskWatcher`]: the task service's change stream, filtered by endpoint
//! - [`ChannelWatcher`]: connection lifecycle events, cross-referenced
//!   against the current task listing and each task's subscription
//!
//! Both share the same lifecycle. `start` spawns one consumption thread and
//! is a no-op while running; `stop` cancels it without waiting. When the
//! thread exits it drops its output sender, so a runtime holding no other
//! sender sees the channel disconnect.
//!
//! Identifiers may be emitted more than once or out of order across
//! watchers; consumers must reconcile idempotently.

mod channel;
mod lifecycle;
mod task;

pub use channel::ChannelWatcher;
pub use task::TaskWatcher;

use crate::error::Result;
use crate::types::{EndpointId, WorkItemId};
use crossbeam_channel::Sender;

/// Capacity of the queue between a channel source and a [`ChannelWatcher`].
pub const DEFAULT_CHANNEL_QUEUE_SIZE: usize = 100;

/// Configuration shared by the watchers.
#[derive(Clone, Debug)]
pub struct WatcherConfig {
    /// Termination endpoint whose tasks this watcher reports.
    pub endpoint_id: EndpointId,

    /// Queue capacity between the channel source and the channel watcher.
    /// Default: 100
    pub channel_queue_size: usize,
}

impl WatcherConfig {
    pub fn new(endpoint_id: impl Into<EndpointId>) -> Self {
        Self {
            endpoint_id: endpoint_id.into(),
            ..Default::default()
        }
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            endpoint_id: EndpointId::default(),
            channel_queue_size: DEFAULT_CHANNEL_QUEUE_SIZE,
        }
    }
}

/// A source of work items for the reconciliation runtime.
pub trait Watcher: Send + Sync {
    /// Begin pushing work items onto `tx`.
    ///
    /// Returns `Ok(())` without side effects if already running. Setup
    /// failures are returned and leave the watcher stopped.
    fn start(&self, tx: Sender<WorkItemId>) -> Result<()>;

    /// Cancel the running consumption, if any. Does not wait for it.
    fn stop(&self);

    fn is_running(&self) -> bool;
}
