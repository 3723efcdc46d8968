//! Contracts for the external services the watchers consume.
//!
//! Implementations are expected to observe the [`Context`] they are given
//! and return [`ControllerError::Cancelled`](crate::ControllerError::Cancelled)
//! once it is cancelled.

use crate::context::Context;
use crate::error::Result;
use crate::types::{NodeId, Subscription, SubscriptionId, SubscriptionTask, TaskEvent};
use crossbeam_channel::Sender;
use std::sync::Arc;

/// Server-pushed stream of task changes.
pub trait TaskEventStream: Send {
    /// Block for the next event.
    ///
    /// `Ok(None)` marks the end of the stream. `Err(Cancelled)` means the
    /// stream's context was cancelled; any other error is transient.
    fn recv(&mut self) -> Result<Option<TaskEvent>>;
}

/// Subscription task service.
pub trait TaskService: Send + Sync {
    /// Open a change stream over all tasks.
    fn watch_tasks(&self, ctx: &Context) -> Result<Box<dyn TaskEventStream>>;

    /// Current full set of tasks.
    fn list_tasks(&self, ctx: &Context) -> Result<Vec<SubscriptionTask>>;
}

/// Subscription lookup service.
pub trait SubscriptionService: Send + Sync {
    fn get_subscription(&self, ctx: &Context, id: &SubscriptionId) -> Result<Subscription>;
}

/// A live connection to a network node.
pub trait Channel: Send + Sync {
    /// Identity of the node on the far side of the connection.
    fn node_id(&self) -> NodeId;
}

/// Source of connection lifecycle events.
pub trait ChannelSource: Send + Sync {
    /// Register `tx` for lifecycle events until `ctx` is cancelled.
    ///
    /// The source drops `tx` once it observes the cancellation, which
    /// disconnects the receiving side.
    fn watch(&self, ctx: Context, tx: Sender<Arc<dyn Channel>>) -> Result<()>;
}
