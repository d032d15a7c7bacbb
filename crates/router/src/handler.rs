//! The ingestion handler.
//!
//! [`IngestionHandler::ingest`] runs one webhook through
//! normalise → validate → persist → classify → dispatch and always returns a
//! [`HandlerResult`]. Each stage can end the call; every error is caught here
//! and mapped through the configured [`ErrorStatusPolicy`].
//!
//! Calls are independent: the handler holds only shared port handles, and
//! each external call is attempted exactly once.

use std::sync::Arc;

use intake::{
    extract_github_link, flatten, Counter, DispatchError, DispatchQueue, DispatchRequest,
    DispatchTarget, ErrorKind, ErrorStatusPolicy, HandlerResult, IngestOutcome, IngestedIssue,
    IngestionError, IssueStore, LaunchReceipt, MessageBody, MetricsSink, PayloadError,
    QueueReceipt, TaskLauncher, TaskMarker,
};
use serde_json::Value;
use tracing::{debug, error, info, warn};

/// Orchestrates one webhook ingestion against injected ports.
pub struct IngestionHandler {
    store: Arc<dyn IssueStore>,
    queue: Arc<dyn DispatchQueue>,
    launcher: Arc<dyn TaskLauncher>,
    metrics: Arc<dyn MetricsSink>,
    policy: ErrorStatusPolicy,
}

impl IngestionHandler {
    /// Creates a handler using the default [`ErrorStatusPolicy`].
    pub fn new(
        store: Arc<dyn IssueStore>,
        queue: Arc<dyn DispatchQueue>,
        launcher: Arc<dyn TaskLauncher>,
        metrics: Arc<dyn MetricsSink>,
    ) -> Self {
        Self {
            store,
            queue,
            launcher,
            metrics,
            policy: ErrorStatusPolicy::default(),
        }
    }

    pub fn with_status_policy(mut self, policy: ErrorStatusPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn status_policy(&self) -> ErrorStatusPolicy {
        self.policy
    }

    /// Parses a raw request body and ingests it.
    ///
    /// A body that is not JSON is reported as a malformed payload.
    pub async fn ingest_body(&self, body: &[u8]) -> HandlerResult {
        match serde_json::from_slice::<Value>(body) {
            Ok(payload) => self.ingest(&payload).await,
            Err(e) => self.fail(PayloadError::InvalidJson {
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Ingests one webhook payload.
    #[tracing::instrument(name = "ingest", skip_all, fields(issue_id = tracing::field::Empty))]
    pub async fn ingest(&self, payload: &Value) -> HandlerResult {
        debug!(payload = %payload, "Received webhook payload");
        match self.process(payload).await {
            Ok(result) => result,
            Err(e) => self.fail(e),
        }
    }

    async fn process(&self, payload: &Value) -> Result<HandlerResult, IngestionError> {
        let issue = IngestedIssue::from_fields(flatten(payload)?)?;
        let issue_id = issue.issue_id().clone();
        tracing::Span::current().record("issue_id", issue_id.as_str());

        self.store.put(&issue).await?;
        info!(issue_key = %issue.record().issue_key, "Stored Jira issue");

        let Some(github_link) = extract_github_link(issue.description()) else {
            info!("No GitHub URL found in description; nothing to dispatch");
            self.metrics.increment(Counter::StoriesProcessed);
            return Ok(HandlerResult::success(
                format!("Jira story {issue_id} stored; no GitHub URL found in description"),
                IngestOutcome::NoGithubLink,
            ));
        };

        let request = DispatchRequest::new(&issue, github_link);
        let (target, message) = if TaskMarker::LongRunning.is_set_in(issue.description()) {
            let receipt = self.launch(&request).await?;
            (
                DispatchTarget::ContainerTask,
                format!(
                    "Jira story {issue_id} processed; long running task {} started",
                    receipt.task_id
                ),
            )
        } else {
            let receipt = self.enqueue(&request).await?;
            let message = if receipt.duplicate {
                format!("Jira story {issue_id} processed; task was already queued")
            } else {
                format!("Jira story {issue_id} processed; task queued")
            };
            (DispatchTarget::Queue, message)
        };

        self.metrics.increment(Counter::StoriesProcessed);
        Ok(HandlerResult::success(
            message,
            IngestOutcome::Dispatched { target },
        ))
    }

    async fn launch(&self, request: &DispatchRequest) -> Result<LaunchReceipt, IngestionError> {
        match self.launcher.launch(request.to_launch_request()).await {
            Ok(receipt) => {
                self.metrics.increment(Counter::EcsTasksStarted);
                info!(
                    task_id = %receipt.task_id,
                    github_link = %request.github_link,
                    "Started long running container task"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.metrics.increment(Counter::EcsTaskErrors);
                error!(error = %e, details = %e.details, "Failed to start container task");
                Err(DispatchError::from(e).into())
            }
        }
    }

    async fn enqueue(&self, request: &DispatchRequest) -> Result<QueueReceipt, IngestionError> {
        let message = request
            .to_queue_message()
            .map_err(|e| IngestionError::Request {
                message: format!("could not serialise dispatch request: {e}"),
            })?;
        let receipt = self
            .queue
            .send(message)
            .await
            .map_err(DispatchError::from)?;
        self.metrics.increment(Counter::SqsMessagesSent);
        info!(
            message_id = %receipt.message_id,
            duplicate = receipt.duplicate,
            is_data_analysis_task = request.is_data_analysis_task,
            "Sent dispatch request to queue"
        );
        Ok(receipt)
    }

    fn fail(&self, error: IngestionError) -> HandlerResult {
        match error.kind() {
            ErrorKind::ValidationFailed => {
                self.metrics.increment(Counter::ValidationFailed);
                warn!(error = %error, "Rejected webhook payload");
            }
            // Counted as ECSTaskErrors at the launch site.
            ErrorKind::DispatchFailed {
                target: DispatchTarget::ContainerTask,
            } => {}
            _ => {
                self.metrics.increment(Counter::RequestErrors);
                error!(error = %error, "Webhook ingestion failed");
            }
        }
        HandlerResult::failure(&error, self.policy)
    }
}

/// Unauthenticated liveness response.
pub fn hello() -> MessageBody {
    MessageBody {
        message: "Hello, World!".to_string(),
    }
}
