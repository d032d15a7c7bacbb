//! Port traits implemented by infrastructure crates.
//!
//! The ingestion handler depends only on these traits; concrete backends
//! (SQLite, Docker, the `metrics` facade) are injected at construction so
//! tests can substitute doubles.

use async_trait::async_trait;

use crate::dispatch::{LaunchReceipt, LaunchRequest, QueueMessage, QueueReceipt};
use crate::errors::{QueueError, StoreError, TaskLaunchError};
use crate::{IngestedIssue, IssueId, IssueKey, ProjectKey};

/// Partition values an [`IssueStore`] can be queried by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueQuery {
    /// All issues in a project.
    Project(ProjectKey),
    /// Issues with the given human key.
    Key(IssueKey),
}

/// Durable storage for ingested issues, keyed by [`IssueId`].
#[async_trait]
pub trait IssueStore: Send + Sync {
    /// Inserts or replaces the issue. Last write wins.
    async fn put(&self, issue: &IngestedIssue) -> Result<(), StoreError>;

    async fn get(&self, issue_id: &IssueId) -> Result<Option<IngestedIssue>, StoreError>;

    async fn query(&self, query: &IssueQuery) -> Result<Vec<IngestedIssue>, StoreError>;

    /// Returns `true` if an issue was removed.
    async fn delete(&self, issue_id: &IssueId) -> Result<bool, StoreError>;
}

/// Short-lived work queue with group ordering and deduplication.
#[async_trait]
pub trait DispatchQueue: Send + Sync {
    async fn send(&self, message: QueueMessage) -> Result<QueueReceipt, QueueError>;
}

/// Starts long-running container tasks.
#[async_trait]
pub trait TaskLauncher: Send + Sync {
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchReceipt, TaskLaunchError>;
}

/// Named counters incremented by the ingestion handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    StoriesProcessed,
    ValidationFailed,
    SqsMessagesSent,
    EcsTasksStarted,
    EcsTaskErrors,
    /// Every other failure caught at the handler boundary.
    RequestErrors,
}

impl Counter {
    /// The exported metric name.
    pub fn as_str(self) -> &'static str {
        match self {
            Counter::StoriesProcessed => "StoriesProcessed",
            Counter::ValidationFailed => "ValidationFailed",
            Counter::SqsMessagesSent => "SQSMessagesSent",
            Counter::EcsTasksStarted => "ECSTasksStarted",
            Counter::EcsTaskErrors => "ECSTaskErrors",
            Counter::RequestErrors => "RequestErrors",
        }
    }
}

/// Receives counter increments.
pub trait MetricsSink: Send + Sync {
    fn increment(&self, counter: Counter);
}
