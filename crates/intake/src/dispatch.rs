//! Messages handed to the downstream execution paths.
//!
//! A [`DispatchRequest`] is built once per ingestion that found a GitHub
//! link, converted into either a [`QueueMessage`] or a [`LaunchRequest`], and
//! dropped after the hand-off.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{GithubLink, IngestedIssue, IssueId};

/// Environment variable carrying the GitHub link into a launched task.
pub const ENV_GITHUB_LINK: &str = "GITHUB_LINK";
/// Environment variable carrying the issue description into a launched task.
pub const ENV_JIRA_STORY: &str = "JIRA_STORY";
/// Environment variable carrying the issue id into a launched task.
pub const ENV_JIRA_STORY_ID: &str = "JIRA_STORY_ID";
/// Environment variable carrying the [`TaskType`] into a launched task.
pub const ENV_TASK_TYPE: &str = "TASK_TYPE";

/// Tag key for the issue id on a launched task.
pub const TAG_JIRA_STORY_ID: &str = "JiraStoryId";
/// Tag key for the [`TaskType`] on a launched task.
pub const TAG_TASK_TYPE: &str = "TaskType";

/// Kind of work a launched container performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskType {
    LongRunningTask,
}

impl TaskType {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskType::LongRunningTask => "long_running_task",
        }
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Work derived from an ingested issue.
///
/// The serialised field names are the wire format queue consumers read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchRequest {
    pub github_link: GithubLink,
    #[serde(rename = "jira_story")]
    pub jira_story_description: String,
    pub jira_story_id: IssueId,
    pub is_data_analysis_task: bool,
}

impl DispatchRequest {
    /// Builds the request for `issue`, copying its derived classification.
    pub fn new(issue: &IngestedIssue, github_link: GithubLink) -> Self {
        Self {
            github_link,
            jira_story_description: issue.description().to_string(),
            jira_story_id: issue.issue_id().clone(),
            is_data_analysis_task: issue.is_data_analysis_task(),
        }
    }

    /// Serialises the request for the queue, grouped and deduplicated by story id.
    ///
    /// # Errors
    ///
    /// Returns the serialiser error if the request cannot be encoded.
    pub fn to_queue_message(&self) -> Result<QueueMessage, serde_json::Error> {
        Ok(QueueMessage {
            body: serde_json::to_string(self)?,
            group_key: self.jira_story_id.as_str().to_string(),
            dedup_key: self.jira_story_id.as_str().to_string(),
        })
    }

    /// Builds the container launch for a long-running task.
    pub fn to_launch_request(&self) -> LaunchRequest {
        let task_type = TaskType::LongRunningTask;
        let env = BTreeMap::from([
            (ENV_GITHUB_LINK.to_string(), self.github_link.as_str().to_string()),
            (ENV_JIRA_STORY.to_string(), self.jira_story_description.clone()),
            (ENV_JIRA_STORY_ID.to_string(), self.jira_story_id.as_str().to_string()),
            (ENV_TASK_TYPE.to_string(), task_type.as_str().to_string()),
        ]);
        let tags = BTreeMap::from([
            (TAG_JIRA_STORY_ID.to_string(), self.jira_story_id.as_str().to_string()),
            (TAG_TASK_TYPE.to_string(), task_type.as_str().to_string()),
        ]);
        LaunchRequest { env, tags }
    }
}

/// A serialised payload for the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub body: String,
    /// Messages sharing a group key are delivered in send order.
    pub group_key: String,
    /// A repeated key is acknowledged without enqueuing a second copy.
    pub dedup_key: String,
}

/// Acknowledgement from the dispatch queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueReceipt {
    pub message_id: String,
    /// `true` when the dedup key had already been sent.
    pub duplicate: bool,
}

/// Environment overrides and tags for a container task.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LaunchRequest {
    pub env: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

/// Acknowledgement from the container task launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchReceipt {
    /// Launcher-assigned task identifier.
    pub task_id: String,
}
