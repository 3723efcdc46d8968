//! # Subscription tracking core
//!
//! The subscription-tracking core of a RAN element controller. It sits
//! between the connection manager (live channels to network nodes) and the
//! subscription task service (desired subscription state).
//!
//! ## Core Concepts
//!
//! - **Catalog**: concurrent registry of active subscriptions with per-watcher
//!   change notification
//! - **TaskWatcher**: turns the task service's change stream into work items
//!   for one termination endpoint
//! - **ChannelWatcher**: turns connection lifecycle events into work items for
//!   the tasks targeting the affected node
//! - **Context**: cancellation shared by watchers and external calls
//!
//! ## Example
//!
//! ```ignore
//! use subtrack::{TaskWatcher, Watcher, WatcherConfig};
//!
//! let watcher = TaskWatcher::new(WatcherConfig::new("e2t-1"), task_client);
//! let (tx, rx) = crossbeam_channel::unbounded();
//! watcher.start(tx)?;
//!
//! for item in rx {
//!     reconcile(item);
//! }
//! ```

pub mod catalog;
pub mod channels;
pub mod client;
pub mod context;
pub mod error;
pub mod types;
pub mod watch;

// Re-exports
pub use catalog::{
    Catalog, CatalogConfig, CatalogEvent, CatalogEventKind, CatalogRecord, CatalogWatch, WatchId,
};
pub use channels::{ChannelManager, NodeChannel};
pub use client::{Channel, ChannelSource, SubscriptionService, TaskEventStream, TaskService};
pub use context::{CancelHandle, Context};
pub use error::{CatalogError, ControllerError, Result};
pub use types::*;
pub use watch::{ChannelWatcher, TaskWatcher, Watcher, WatcherConfig, DEFAULT_CHANNEL_QUEUE_SIZE};
