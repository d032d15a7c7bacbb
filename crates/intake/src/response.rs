//! Handler results and the status-code policy applied to failures.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{DispatchTarget, ErrorKind, IngestionError};

pub const STATUS_OK: u16 = 200;
pub const STATUS_BAD_REQUEST: u16 = 400;
pub const STATUS_INTERNAL_ERROR: u16 = 500;

/// How failures map to HTTP status codes.
///
/// Successful outcomes are always `200`. The body is a `{message}` object
/// under every policy, so callers must read the message to detect failure
/// unless [`ErrorStatusPolicy::Strict`] is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorStatusPolicy {
    /// Every outcome is `200`.
    AlwaysOk,
    /// Container task dispatch failures are `500`; everything else is `200`.
    #[default]
    ContainerTaskErrors,
    /// Malformed or invalid input is `400`; every other failure is `500`.
    Strict,
}

impl ErrorStatusPolicy {
    pub fn status_for(self, kind: ErrorKind) -> u16 {
        match (self, kind) {
            (ErrorStatusPolicy::AlwaysOk, _) => STATUS_OK,
            (
                ErrorStatusPolicy::ContainerTaskErrors,
                ErrorKind::DispatchFailed {
                    target: DispatchTarget::ContainerTask,
                },
            ) => STATUS_INTERNAL_ERROR,
            (ErrorStatusPolicy::ContainerTaskErrors, _) => STATUS_OK,
            (
                ErrorStatusPolicy::Strict,
                ErrorKind::MalformedPayload | ErrorKind::ValidationFailed,
            ) => STATUS_BAD_REQUEST,
            (ErrorStatusPolicy::Strict, _) => STATUS_INTERNAL_ERROR,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorStatusPolicy::AlwaysOk => "always_ok",
            ErrorStatusPolicy::ContainerTaskErrors => "container_task_errors",
            ErrorStatusPolicy::Strict => "strict",
        }
    }
}

impl FromStr for ErrorStatusPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always_ok" => Ok(ErrorStatusPolicy::AlwaysOk),
            "container_task_errors" => Ok(ErrorStatusPolicy::ContainerTaskErrors),
            "strict" => Ok(ErrorStatusPolicy::Strict),
            other => Err(format!(
                "unknown error status policy '{other}' (expected always_ok, container_task_errors, or strict)"
            )),
        }
    }
}

/// What an ingestion call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The issue was stored and work was handed to `target`.
    Dispatched { target: DispatchTarget },
    /// The issue was stored; its description had no GitHub link.
    NoGithubLink,
    /// The call stopped on an error.
    Failed { kind: ErrorKind },
}

/// Response body shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBody {
    pub message: String,
}

/// Structured result of one ingestion call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResult {
    pub status: u16,
    pub message: String,
    pub outcome: IngestOutcome,
}

impl HandlerResult {
    pub fn success(message: impl Into<String>, outcome: IngestOutcome) -> Self {
        Self {
            status: STATUS_OK,
            message: message.into(),
            outcome,
        }
    }

    /// Maps `error` through `policy`; the message is the error text.
    pub fn failure(error: &IngestionError, policy: ErrorStatusPolicy) -> Self {
        let kind = error.kind();
        Self {
            status: policy.status_for(kind),
            message: error.to_string(),
            outcome: IngestOutcome::Failed { kind },
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, IngestOutcome::Failed { .. })
    }

    pub fn body(&self) -> MessageBody {
        MessageBody {
            message: self.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTAINER: ErrorKind = ErrorKind::DispatchFailed {
        target: DispatchTarget::ContainerTask,
    };
    const QUEUE: ErrorKind = ErrorKind::DispatchFailed {
        target: DispatchTarget::Queue,
    };

    #[test]
    fn always_ok_never_fails_the_status() {
        for kind in [ErrorKind::ValidationFailed, CONTAINER, ErrorKind::Request] {
            assert_eq!(ErrorStatusPolicy::AlwaysOk.status_for(kind), 200);
        }
    }

    #[test]
    fn default_policy_only_surfaces_container_failures() {
        let policy = ErrorStatusPolicy::default();
        assert_eq!(policy.status_for(CONTAINER), 500);
        assert_eq!(policy.status_for(QUEUE), 200);
        assert_eq!(policy.status_for(ErrorKind::PersistenceFailed), 200);
        assert_eq!(policy.status_for(ErrorKind::MalformedPayload), 200);
    }

    #[test]
    fn strict_policy_splits_client_and_server_errors() {
        let policy = ErrorStatusPolicy::Strict;
        assert_eq!(policy.status_for(ErrorKind::MalformedPayload), 400);
        assert_eq!(policy.status_for(ErrorKind::ValidationFailed), 400);
        assert_eq!(policy.status_for(ErrorKind::PersistenceFailed), 500);
        assert_eq!(policy.status_for(QUEUE), 500);
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("Strict".parse::<ErrorStatusPolicy>(), Ok(ErrorStatusPolicy::Strict));
        assert_eq!(
            " always_ok ".parse::<ErrorStatusPolicy>(),
            Ok(ErrorStatusPolicy::AlwaysOk)
        );
        assert!("sometimes".parse::<ErrorStatusPolicy>().is_err());
    }
}
