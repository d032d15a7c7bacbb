//! Error types for the intake domain.
//!
//! [`IngestionError`] is the taxonomy the ingestion handler maps to a
//! response. The narrower types below it are produced by individual stages
//! (normaliser, validator) or returned by port implementations.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// The webhook body could not be traversed at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    /// The body parsed as JSON but the top level is not an object.
    #[error("Webhook payload must be a JSON object, found {found}")]
    NotAnObject {
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// The body is not JSON.
    #[error("Webhook payload is not valid JSON: {message}")]
    InvalidJson {
        /// Parser error text.
        message: String,
    },
}

/// A required field is missing or has the wrong shape after normalisation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was absent (or `null`) in the payload.
    #[error("Missing required field '{field}'")]
    MissingField {
        /// Name of the field.
        field: &'static str,
    },

    /// A field was present but could not be read as the expected type.
    #[error("Field '{field}' must be {expected}, found {found}")]
    WrongType {
        /// Name of the field.
        field: &'static str,
        /// Description of the accepted shape.
        expected: &'static str,
        /// JSON type that was found instead.
        found: &'static str,
    },

    /// An identifier field was present but empty.
    #[error("Field '{field}' must not be empty")]
    EmptyField {
        /// Name of the field.
        field: &'static str,
    },
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// The issue store rejected or failed an operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Issue store operation failed: {message}")]
pub struct StoreError {
    /// Backend error text.
    pub message: String,
}

impl StoreError {
    /// Creates a [`StoreError`] from any displayable backend error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The dispatch queue rejected or failed a send.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Queue send failed: {message}")]
pub struct QueueError {
    /// Backend error text.
    pub message: String,
}

impl QueueError {
    /// Creates a [`QueueError`] from any displayable backend error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// The container task launcher could not start the task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} - {details}")]
pub struct TaskLaunchError {
    /// Summary of what failed.
    pub message: String,
    /// Launcher-side error text.
    pub details: String,
}

impl TaskLaunchError {
    /// Creates a [`TaskLaunchError`].
    pub fn new(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: details.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Handler taxonomy
// ---------------------------------------------------------------------------

/// Downstream execution path a dispatch was sent to (or failed on).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchTarget {
    /// Long-running work handed to the container task launcher.
    ContainerTask,
    /// Short-lived work sent to the dispatch queue.
    Queue,
}

/// A dispatch to one of the downstream paths failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The container task launcher failed.
    #[error("Container task dispatch failed: {0}")]
    ContainerTask(#[from] TaskLaunchError),

    /// The queue send failed.
    #[error("Queue dispatch failed: {0}")]
    Queue(#[from] QueueError),
}

impl DispatchError {
    /// Which downstream path failed.
    pub fn target(&self) -> DispatchTarget {
        match self {
            DispatchError::ContainerTask(_) => DispatchTarget::ContainerTask,
            DispatchError::Queue(_) => DispatchTarget::Queue,
        }
    }
}

/// Every failure the ingestion handler can encounter.
///
/// All variants are caught at the handler boundary and converted into a
/// response; none reaches the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestionError {
    /// The payload could not be traversed.
    #[error(transparent)]
    MalformedPayload(#[from] PayloadError),

    /// The normalised fields did not form a valid record.
    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),

    /// The record could not be persisted.
    #[error(transparent)]
    PersistenceFailed(#[from] StoreError),

    /// A downstream dispatch failed.
    #[error(transparent)]
    DispatchFailed(#[from] DispatchError),

    /// Anything unanticipated (e.g. a dispatch request that fails to serialise).
    #[error("Request failed: {message}")]
    Request {
        /// Description of the failure.
        message: String,
    },
}

impl IngestionError {
    /// The fieldless kind used for status mapping and counters.
    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestionError::MalformedPayload(_) => ErrorKind::MalformedPayload,
            IngestionError::ValidationFailed(_) => ErrorKind::ValidationFailed,
            IngestionError::PersistenceFailed(_) => ErrorKind::PersistenceFailed,
            IngestionError::DispatchFailed(e) => ErrorKind::DispatchFailed { target: e.target() },
            IngestionError::Request { .. } => ErrorKind::Request,
        }
    }
}

/// Fieldless classification of an [`IngestionError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ErrorKind {
    MalformedPayload,
    ValidationFailed,
    PersistenceFailed,
    DispatchFailed { target: DispatchTarget },
    Request,
}
