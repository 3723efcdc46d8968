//! In-memory stand-ins for the task and subscription services.

#![allow(dead_code)]

use crossbeam_channel::{select, unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use subtrack::{
    Context, ControllerError, EndpointId, NodeId, Result, Subscription, SubscriptionId,
    SubscriptionService, SubscriptionTask, TaskEvent, TaskEventKind, TaskEventStream, TaskId,
    TaskService, WorkItemId,
};

pub const ENDPOINT: &str = "e2t-1";
pub const TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET: Duration = Duration::from_millis(100);

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn task(id: &str, subscription: &str, endpoint: &str) -> SubscriptionTask {
    SubscriptionTask {
        id: TaskId::from(id),
        subscription_id: SubscriptionId::from(subscription),
        endpoint_id: EndpointId::from(endpoint),
        ..Default::default()
    }
}

pub fn subscription(id: &str, node: &str) -> Subscription {
    Subscription {
        id: SubscriptionId::from(id),
        app_id: "kpimon".to_string(),
        node_id: NodeId::from(node),
        service_model: "kpm".to_string(),
        details: serde_json::json!({ "period_ms": 1000 }),
    }
}

pub fn created(task: SubscriptionTask) -> TaskEvent {
    TaskEvent {
        kind: TaskEventKind::Created,
        task,
    }
}

pub fn work_item(id: &str) -> WorkItemId {
    WorkItemId::from(TaskId::from(id))
}

/// Collect items until the channel stays quiet for `QUIET` or disconnects.
pub fn drain(rx: &Receiver<WorkItemId>) -> Vec<WorkItemId> {
    let mut items = Vec::new();
    while let Ok(item) = rx.recv_timeout(QUIET) {
        items.push(item);
    }
    items
}

/// Task service whose change streams are fed by the test.
#[derive(Default)]
pub struct FakeTaskService {
    tasks: Mutex<Vec<SubscriptionTask>>,
    feeds: Mutex<Vec<Sender<Result<TaskEvent>>>>,
    watch_error: Mutex<Option<ControllerError>>,
    list_error: Mutex<Option<ControllerError>>,
    pub watch_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
}

impl FakeTaskService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_tasks(&self, tasks: Vec<SubscriptionTask>) {
        *self.tasks.lock() = tasks;
    }

    pub fn fail_watch(&self, error: Option<ControllerError>) {
        *self.watch_error.lock() = error;
    }

    pub fn fail_list(&self, error: Option<ControllerError>) {
        *self.list_error.lock() = error;
    }

    /// Push an event to every open stream.
    pub fn push(&self, event: TaskEvent) {
        self.feeds.lock().retain(|feed| feed.send(Ok(event.clone())).is_ok());
    }

    /// Make every open stream's next `recv` fail with `error`.
    pub fn push_error(&self, error: ControllerError) {
        self.feeds.lock().retain(|feed| feed.send(Err(error.clone())).is_ok());
    }

    /// End every open stream.
    pub fn end_streams(&self) {
        self.feeds.lock().clear();
    }

    pub fn watch_calls(&self) -> usize {
        self.watch_calls.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

impl TaskService for FakeTaskService {
    fn watch_tasks(&self, ctx: &Context) -> Result<Box<dyn TaskEventStream>> {
        self.watch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.watch_error.lock().clone() {
            return Err(error);
        }
        let (tx, rx) = unbounded();
        self.feeds.lock().push(tx);
        Ok(Box::new(FakeStream {
            ctx: ctx.clone(),
            events: rx,
        }))
    }

    fn list_tasks(&self, ctx: &Context) -> Result<Vec<SubscriptionTask>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        ctx.check()?;
        if let Some(error) = self.list_error.lock().clone() {
            return Err(error);
        }
        Ok(self.tasks.lock().clone())
    }
}

struct FakeStream {
    ctx: Context,
    events: Receiver<Result<TaskEvent>>,
}

impl TaskEventStream for FakeStream {
    fn recv(&mut self) -> Result<Option<TaskEvent>> {
        select! {
            recv(self.events) -> msg => match msg {
                Ok(Ok(event)) => Ok(Some(event)),
                Ok(Err(e)) => Err(e),
                Err(_) => Ok(None),
            },
            recv(self.ctx.done()) -> _ => Err(ControllerError::Cancelled),
        }
    }
}

/// Subscription service backed by a map.
#[derive(Default)]
pub struct FakeSubscriptionService {
    subscriptions: Mutex<HashMap<SubscriptionId, Subscription>>,
    failing: Mutex<HashSet<SubscriptionId>>,
}

impl FakeSubscriptionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, subscription: Subscription) {
        self.subscriptions
            .lock()
            .insert(subscription.id.clone(), subscription);
    }

    /// Make lookups of `id` fail with an RPC error.
    pub fn fail(&self, id: &str) {
        self.failing.lock().insert(SubscriptionId::from(id));
    }
}

impl SubscriptionService for FakeSubscriptionService {
    fn get_subscription(&self, ctx: &Context, id: &SubscriptionId) -> Result<Subscription> {
        ctx.check()?;
        if self.failing.lock().contains(id) {
            return Err(ControllerError::Rpc(format!("lookup of {} failed", id)));
        }
        self.subscriptions
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))
    }
}
