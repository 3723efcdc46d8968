//! Core types shared by the catalog and the watchers.
//!
//! These mirror the value types carried by the subscription and task
//! services. They are plain data: cheap to clone, serde-serializable, and
//! compared by value.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                $name(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({:?})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                $name(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                $name(id)
            }
        }
    };
}

string_id!(
    /// Identifier of a subscription in the subscription service.
    SubscriptionId
);

string_id!(
    /// Identifier of a subscription task in the task service.
    TaskId
);

string_id!(
    /// Identity of a termination endpoint. Tasks are owned by exactly one.
    EndpointId
);

string_id!(
    /// Identity of a radio-network node.
    NodeId
);

/// Caller-assigned request identifier, unique within one catalog.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub i32);

impl fmt::Debug for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestId({})", self.0)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Reconciliation key pushed to the controller runtime.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkItemId(pub TaskId);

impl WorkItemId {
    pub fn task_id(&self) -> &TaskId {
        &self.0
    }
}

impl From<TaskId> for WorkItemId {
    fn from(id: TaskId) -> Self {
        WorkItemId(id)
    }
}

impl fmt::Debug for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WorkItemId({:?})", self.0.as_str())
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A desired-state subscription linking an application to a node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    /// Application that requested the subscription.
    pub app_id: String,
    /// Target node the subscription is installed on.
    pub node_id: NodeId,
    /// Service model name, e.g. "kpm".
    pub service_model: String,
    /// Service-model specific payload. Opaque to this crate.
    #[serde(default)]
    pub details: serde_json::Value,
}

/// Lifecycle phase requested for a task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPhase {
    #[default]
    Open,
    Close,
}

/// Progress of a task toward its phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    #[default]
    Pending,
    Complete,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskLifecycle {
    pub phase: TaskPhase,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

/// A unit of work derived from a subscription, owned by one endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionTask {
    pub id: TaskId,
    pub subscription_id: SubscriptionId,
    /// Termination endpoint that owns this task.
    pub endpoint_id: EndpointId,
    #[serde(default)]
    pub lifecycle: TaskLifecycle,
}

impl SubscriptionTask {
    pub fn is_owned_by(&self, endpoint: &EndpointId) -> bool {
        &self.endpoint_id == endpoint
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    /// Replay of an existing task when a watch starts.
    #[default]
    None,
    Created,
    Updated,
    Removed,
}

/// One entry of the task service's change stream.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task: SubscriptionTask,
}
