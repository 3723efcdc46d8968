//! Watcher over the task service's change stream.

use crate::client::{TaskEventStream, TaskService};
use crate::context::Context;
use crate::error::Result;
use crate::types::{EndpointId, WorkItemId};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

use super::lifecycle::{forward, Lifecycle};
use super::{Watcher, WatcherConfig};

/// Forwards task changes owned by one termination endpoint.
pub struct TaskWatcher {
    endpoint_id: EndpointId,
    tasks: Arc<dyn TaskService>,
    lifecycle: Arc<Lifecycle>,
}

impl TaskWatcher {
    pub fn new(config: WatcherConfig, tasks: Arc<dyn TaskService>) -> Self {
        Self {
            endpoint_id: config.endpoint_id,
            tasks,
            lifecycle: Lifecycle::new(),
        }
    }

    pub fn endpoint_id(&self) -> &EndpointId {
        &self.endpoint_id
    }
}

impl Watcher for TaskWatcher {
    fn start(&self, tx: Sender<WorkItemId>) -> Result<()> {
        let endpoint = self.endpoint_id.clone();
        let tasks = &self.tasks;

        let started = self.lifecycle.start(
            |ctx| tasks.watch_tasks(ctx),
            move |stream, ctx, guard| {
                thread::spawn(move || {
                    consume(stream, &endpoint, &ctx, &tx);
                    // Back to Stopped before the output closes.
                    drop(guard);
                    drop(tx);
                });
            },
        )?;

        if started {
            info!(endpoint = %self.endpoint_id, "Started task watcher");
        }
        Ok(())
    }

    fn stop(&self) {
        if self.lifecycle.stop() {
            info!(endpoint = %self.endpoint_id, "Stopped task watcher");
        }
    }

    fn is_running(&self) -> bool {
        self.lifecycle.is_running()
    }
}

impl Drop for TaskWatcher {
    fn drop(&mut self) {
        self.lifecycle.stop();
    }
}

/// Drain `stream` until it ends or `ctx` is cancelled.
fn consume(
    mut stream: Box<dyn TaskEventStream>,
    endpoint: &EndpointId,
    ctx: &Context,
    tx: &Sender<WorkItemId>,
) {
    loop {
        if ctx.is_cancelled() {
            debug!(endpoint = %endpoint, "Task watch cancelled");
            return;
        }

        match stream.recv() {
            Ok(Some(event)) => {
                if !event.task.is_owned_by(endpoint) {
                    continue;
                }
                debug!(
                    endpoint = %endpoint,
                    task = %event.task.id,
                    kind = ?event.kind,
                    "Forwarding task event"
                );
                if !forward(ctx, tx, WorkItemId::from(event.task.id)) {
                    debug!(endpoint = %endpoint, "Task watch output closed");
                    return;
                }
            }
            Ok(None) => {
                debug!(endpoint = %endpoint, "Task stream ended");
                return;
            }
            Err(e) if e.is_cancelled() => {
                debug!(endpoint = %endpoint, "Task watch cancelled");
                return;
            }
            Err(e) => {
                error!(endpoint = %endpoint, error = %e, "Failed to receive task event");
            }
        }
    }
}
