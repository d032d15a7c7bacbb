//! In-memory port doubles for tests.
//!
//! Each double records what it was asked to do and can be switched into a
//! failing mode.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use intake::{
    Counter, DispatchQueue, IngestedIssue, IssueId, IssueQuery, IssueStore, LaunchReceipt,
    LaunchRequest, MetricsSink, QueueError, QueueMessage, QueueReceipt, StoreError,
    TaskLaunchError, TaskLauncher,
};

/// [`IssueStore`] backed by a map.
#[derive(Default)]
pub struct MemoryStore {
    issues: Mutex<BTreeMap<String, IngestedIssue>>,
    fail: AtomicBool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail.store(true, Ordering::SeqCst);
        store
    }

    pub fn len(&self) -> usize {
        self.issues.lock().expect("store lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::new("store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IssueStore for MemoryStore {
    async fn put(&self, issue: &IngestedIssue) -> Result<(), StoreError> {
        self.check()?;
        self.issues
            .lock()
            .expect("store lock")
            .insert(issue.issue_id().to_string(), issue.clone());
        Ok(())
    }

    async fn get(&self, issue_id: &IssueId) -> Result<Option<IngestedIssue>, StoreError> {
        self.check()?;
        Ok(self.issues.lock().expect("store lock").get(issue_id.as_str()).cloned())
    }

    async fn query(&self, query: &IssueQuery) -> Result<Vec<IngestedIssue>, StoreError> {
        self.check()?;
        let issues = self.issues.lock().expect("store lock");
        Ok(issues
            .values()
            .filter(|issue| match query {
                IssueQuery::Project(project) => &issue.record().project_key == project,
                IssueQuery::Key(key) => &issue.record().issue_key == key,
            })
            .cloned()
            .collect())
    }

    async fn delete(&self, issue_id: &IssueId) -> Result<bool, StoreError> {
        self.check()?;
        Ok(self
            .issues
            .lock()
            .expect("store lock")
            .remove(issue_id.as_str())
            .is_some())
    }
}

/// [`DispatchQueue`] that records sent messages.
#[derive(Default)]
pub struct RecordingQueue {
    sent: Mutex<Vec<QueueMessage>>,
    fail: AtomicBool,
}

impl RecordingQueue {
    pub fn failing() -> Self {
        let queue = Self::default();
        queue.fail.store(true, Ordering::SeqCst);
        queue
    }

    pub fn sent(&self) -> Vec<QueueMessage> {
        self.sent.lock().expect("queue lock").clone()
    }
}

#[async_trait]
impl DispatchQueue for RecordingQueue {
    async fn send(&self, message: QueueMessage) -> Result<QueueReceipt, QueueError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(QueueError::new("queue unavailable"));
        }
        let mut sent = self.sent.lock().expect("queue lock");
        let duplicate = sent.iter().any(|m| m.dedup_key == message.dedup_key);
        if !duplicate {
            sent.push(message);
        }
        Ok(QueueReceipt {
            message_id: format!("msg-{}", sent.len()),
            duplicate,
        })
    }
}

/// [`TaskLauncher`] that records launch requests.
#[derive(Default)]
pub struct RecordingLauncher {
    launched: Mutex<Vec<LaunchRequest>>,
    fail: AtomicBool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        let launcher = Self::default();
        launcher.fail.store(true, Ordering::SeqCst);
        launcher
    }

    pub fn launched(&self) -> Vec<LaunchRequest> {
        self.launched.lock().expect("launcher lock").clone()
    }
}

#[async_trait]
impl TaskLauncher for RecordingLauncher {
    async fn launch(&self, request: LaunchRequest) -> Result<LaunchReceipt, TaskLaunchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(TaskLaunchError::new(
                "Failed to start container task",
                "launcher unavailable",
            ));
        }
        let mut launched = self.launched.lock().expect("launcher lock");
        launched.push(request);
        Ok(LaunchReceipt {
            task_id: format!("task-{}", launched.len()),
        })
    }
}

/// [`MetricsSink`] that records every increment.
#[derive(Default)]
pub struct RecordingMetrics {
    increments: Mutex<Vec<Counter>>,
}

impl RecordingMetrics {
    pub fn count(&self, counter: Counter) -> usize {
        self.increments
            .lock()
            .expect("metrics lock")
            .iter()
            .filter(|c| **c == counter)
            .count()
    }

    pub fn total(&self) -> usize {
        self.increments.lock().expect("metrics lock").len()
    }
}

impl MetricsSink for RecordingMetrics {
    fn increment(&self, counter: Counter) {
        self.increments.lock().expect("metrics lock").push(counter);
    }
}
