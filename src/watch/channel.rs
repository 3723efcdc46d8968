//! Watcher over connection lifecycle events.
//!
//! Each event triggers a full task listing; tasks owned by this endpoint
//! whose subscription targets the event's node are emitted. The listing and
//! the lookups are not a consistent snapshot of the two services, so a task
//! changing concurrently may be missed or emitted twice.

use crate::client::{Channel, ChannelSource, SubscriptionService, TaskService};
use crate::context::Context;
use crate::error::Result;
use crate::types::{EndpointId, NodeId, WorkItemId};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

use super::lifecycle::{forward, Lifecycle};
use super::{Watcher, WatcherConfig};

/// Emits tasks affected by connections to the nodes they target.
pub struct ChannelWatcher {
    config: WatcherConfig,
    resolver: Arc<Resolver>,
    channels: Arc<dyn ChannelSource>,
    lifecycle: Arc<Lifecycle>,
}

impl ChannelWatcher {
    pub fn new(
        config: WatcherConfig,
        tasks: Arc<dyn TaskService>,
        subs: Arc<dyn SubscriptionService>,
        channels: Arc<dyn ChannelSource>,
    ) -> Self {
        let resolver = Arc::new(Resolver {
            endpoint_id: config.endpoint_id.clone(),
            tasks,
            subs,
        });
        Self {
            config,
            resolver,
            channels,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn endpoint_id(&self) -> &EndpointId {
        &self.config.endpoint_id
    }
}

impl Watcher for ChannelWatcher {
    fn start(&self, tx: Sender<WorkItemId>) -> Result<()> {
        let channels = &self.channels;
        let queue_size = self.config.channel_queue_size;
        let resolver = Arc::clone(&self.resolver);

        let started = self.lifecycle.start(
            |ctx| {
                let (channel_tx, channel_rx) = bounded(queue_size);
                channels.watch(ctx.clone(), channel_tx)?;
                Ok(channel_rx)
            },
            move |events, ctx, guard| {
                thread::spawn(move || {
                    consume(&resolver, &events, &ctx, &tx);
                    // Back to Stopped before the output closes.
                    drop(guard);
                    drop(tx);
                });
            },
        )?;

        if started {
            info!(endpoint = %self.config.endpoint_id, "Started channel watcher");
        }
        Ok(())
    }

    fn stop(&self) {
        if self.lifecycle.stop() {
            info!(endpoint = %self.config.endpoint_id, "Stopped channel watcher");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl Drop for ChannelWatcher {
    fn drop(&mut self) {
        self.lifecycle.stop();
    }
}

/// Read lifecycle events until the source disconnects or `ctx` is cancelled.
fn consume(
    resolver: &Resolver,
    events: &Receiver<Arc<dyn Channel>>,
    ctx: &Context,
    tx: &Sender<WorkItemId>,
) {
    let endpoint = &resolver.endpoint_id;
    loop {
        let channel = select! {
            recv(events) -> msg => match msg {
                Ok(channel) => channel,
                Err(_) => {
                    debug!(endpoint = %endpoint, "Channel watch closed");
                    return;
                }
            },
            recv(ctx.done()) -> _ => {
                debug!(endpoint = %endpoint, "Channel watch cancelled");
                return;
            }
        };

        let node = channel.node_id();
        debug!(endpoint = %endpoint, node = %node, "Received channel event");
        if !resolver.emit_affected(ctx, &node, tx) {
            debug!(endpoint = %endpoint, "Channel watch output closed");
            return;
        }
    }
}

/// Cross-references tasks and subscriptions for one endpoint.
struct Resolver {
    endpoint_id: EndpointId,
    tasks: Arc<dyn TaskService>,
    subs: Arc<dyn SubscriptionService>,
}

impl Resolver {
    /// Emit every task owned by this endpoint whose subscription targets
    /// `node`. Listing and lookup failures are logged and skipped.
    ///
    /// Returns false if the output can no longer accept items.
    fn emit_affected(&self, ctx: &Context, node: &NodeId, tx: &Sender<WorkItemId>) -> bool {
        let tasks = match self.tasks.list_tasks(ctx) {
            Ok(tasks) => tasks,
            Err(e) if e.is_cancelled() => return true,
            Err(e) => {
                error!(endpoint = %self.endpoint_id, error = %e, "Failed to list tasks");
                return true;
            }
        };

        for task in tasks.into_iter().filter(|t| t.is_owned_by(&self.endpoint_id)) {
            let sub = match self.subs.get_subscription(ctx, &task.subscription_id) {
                Ok(sub) => sub,
                Err(e) if e.is_cancelled() => return true,
                Err(e) => {
                    error!(
                        endpoint = %self.endpoint_id,
                        task = %task.id,
                        subscription = %task.subscription_id,
                        error = %e,
                        "Failed to get subscription"
                    );
                    continue;
                }
            };

            if sub.node_id != *node {
                continue;
            }
            debug!(task = %task.id, node = %node, "Forwarding task for channel");
            if !forward(ctx, tx, WorkItemId::from(task.id)) {
                return false;
            }
        }
        true
    }
}
