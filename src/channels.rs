//! In-memory registry of open node channels.
//!
//! [`ChannelManager`] is a [`ChannelSource`]: watchers registered through
//! [`ChannelSource::watch`] first receive every channel already open, then
//! each channel as it is opened or closed.

use crate::client::{Channel, ChannelSource};
use crate::context::Context;
use crate::error::{ControllerError, Result};
use crate::types::NodeId;
use crossbeam_channel::{select, Sender};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use tracing::{debug, info};

/// A channel identified only by its node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeChannel {
    node_id: NodeId,
}

impl NodeChannel {
    pub fn new(node_id: impl Into<NodeId>) -> Self {
        Self {
            node_id: node_id.into(),
        }
    }
}

impl Channel for NodeChannel {
    fn node_id(&self) -> NodeId {
        self.node_id.clone()
    }
}

#[derive(Clone)]
struct Registration {
    id: u64,
    ctx: Context,
    tx: Sender<Arc<dyn Channel>>,
}

impl Registration {
    /// Blocking send that gives up once the registration is cancelled.
    fn send(&self, channel: Arc<dyn Channel>) -> bool {
        if self.ctx.is_cancelled() {
            return false;
        }
        select! {
            send(self.tx, channel) -> res => res.is_ok(),
            recv(self.ctx.done()) -> _ => false,
        }
    }
}

/// Tracks open channels by node and notifies watchers of changes.
pub struct ChannelManager {
    channels: RwLock<HashMap<NodeId, Arc<dyn Channel>>>,
    watchers: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl ChannelManager {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            watchers: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Record `channel` as open, replacing any channel for the same node.
    pub fn open(&self, channel: Arc<dyn Channel>) {
        let node = channel.node_id();
        self.channels.write().insert(node.clone(), Arc::clone(&channel));
        info!(node = %node, "Opened channel");
        self.notify(&channel);
    }

    /// Forget the channel for `node`. Watchers receive the closed channel.
    pub fn close(&self, node: &NodeId) -> Option<Arc<dyn Channel>> {
        let channel = self.channels.write().remove(node)?;
        info!(node = %node, "Closed channel");
        self.notify(&channel);
        Some(channel)
    }

    pub fn get(&self, node: &NodeId) -> Option<Arc<dyn Channel>> {
        self.channels.read().get(node).cloned()
    }

    pub fn list(&self) -> Vec<Arc<dyn Channel>> {
        self.channels.read().values().cloned().collect()
    }

    /// Number of live watch registrations.
    pub fn watcher_count(&self) -> usize {
        self.watchers.read().len()
    }

    /// Deliver `channel` to every registration, dropping the cancelled or
    /// disconnected ones.
    fn notify(&self, channel: &Arc<dyn Channel>) {
        let registrations = self.watchers.read().clone();
        let mut stale = Vec::new();

        for registration in &registrations {
            if !registration.send(Arc::clone(channel)) {
                stale.push(registration.id);
            }
        }

        if !stale.is_empty() {
            self.watchers.write().retain(|r| !stale.contains(&r.id));
            debug!(removed = stale.len(), "Pruned channel watchers");
        }
    }
}

impl Default for ChannelManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelSource for ChannelManager {
    fn watch(&self, ctx: Context, tx: Sender<Arc<dyn Channel>>) -> Result<()> {
        if ctx.is_cancelled() {
            return Err(ControllerError::Cancelled);
        }

        let registration = Registration {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            ctx,
            tx,
        };

        // Register and snapshot together so no open is missed in between.
        let existing = {
            let channels = self.channels.read();
            let mut watchers = self.watchers.write();
            let before = watchers.len();
            watchers.retain(|r| !r.ctx.is_cancelled());
            if watchers.len() < before {
                debug!(removed = before - watchers.len(), "Pruned channel watchers");
            }
            watchers.push(registration.clone());
            channels.values().cloned().collect::<Vec<_>>()
        };

        // Replay off-thread: the receiver may not be draining yet.
        if !existing.is_empty() {
            thread::spawn(move || {
                for channel in existing {
                    if !registration.send(channel) {
                        break;
                    }
                }
            });
        }
        Ok(())
    }
}
