//! Jira webhook intake domain.
//!
//! This crate holds the decision logic of the ingestion service: turning a
//! nested webhook payload into a validated [`IngestedIssue`], classifying its
//! description, and describing the downstream hand-off. Infrastructure crates
//! implement the port traits in [`ports`]; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`IssueId`, `IssueKey`, `ProjectKey`, `GithubLink`) |
//! | [`classifier`] | Markup stripping, GitHub link extraction, task markers |
//! | [`payload`] | Webhook payload flattening |
//! | [`record`] | Validation into `IngestedIssue` |
//! | [`dispatch`] | `DispatchRequest` and the queue/launcher messages |
//! | [`ports`] | Storage, queue, launcher, and metrics traits |
//! | [`response`] | `HandlerResult` and the status-code policy |
//! | [`errors`] | Error taxonomy |

pub mod classifier;
pub mod dispatch;
pub mod errors;
pub mod identifiers;
pub mod payload;
pub mod ports;
pub mod record;
pub mod response;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use classifier::{detect_boolean_marker, extract_github_link, strip_markup, TaskMarker};
pub use dispatch::{
    DispatchRequest, LaunchReceipt, LaunchRequest, QueueMessage, QueueReceipt, TaskType,
};
pub use errors::{
    DispatchError, DispatchTarget, ErrorKind, IngestionError, PayloadError, QueueError,
    StoreError, TaskLaunchError, ValidationError,
};
pub use identifiers::{GithubLink, IssueId, IssueKey, ProjectKey};
pub use payload::{flatten, FlattenedIssue};
pub use ports::{Counter, DispatchQueue, IssueQuery, IssueStore, MetricsSink, TaskLauncher};
pub use record::{IngestedIssue, IssueRecord};
pub use response::{ErrorStatusPolicy, HandlerResult, IngestOutcome, MessageBody};
