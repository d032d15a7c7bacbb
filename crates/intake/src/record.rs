//! Construction of the validated [`IngestedIssue`].
//!
//! Construction is two pure steps:
//!
//! 1. [`IssueRecord::from_fields`] checks presence and shape of every field
//!    from a [`FlattenedIssue`] and produces the provisional record.
//! 2. [`IngestedIssue::derive`] computes `is_data_analysis_task` from the
//!    description.
//!
//! No path sets the derived flag from input. Deserialising an
//! [`IngestedIssue`] (e.g. reading it back from the store) goes through
//! [`IssueRecord`] and re-derives the flag.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classifier::TaskMarker;
use crate::errors::ValidationError;
use crate::payload::{json_kind, FlattenedIssue};
use crate::{IssueId, IssueKey, ProjectKey};

/// Validated issue fields, before derived values are computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub issue_id: IssueId,
    pub issue_key: IssueKey,
    pub summary: String,
    pub description: Option<String>,
    pub status: String,
    pub status_category: String,
    pub status_from: Option<String>,
    pub status_to: Option<String>,
    pub issue_type: String,
    pub project_key: ProjectKey,
    pub priority: Option<String>,
    pub labels: Vec<String>,
    pub sprint_name: Option<String>,
    pub assignee_name: Option<String>,
    pub reporter_name: Option<String>,
    /// ISO-8601 creation time as sent by Jira; not parsed.
    pub created: Option<String>,
    /// ISO-8601 update time as sent by Jira; not parsed.
    pub updated: Option<String>,
    /// Webhook event time, epoch milliseconds.
    pub timestamp: i64,
    #[serde(default)]
    pub additional_attributes: Map<String, Value>,
}

impl IssueRecord {
    /// Validates flattened payload fields into a record.
    ///
    /// # Errors
    ///
    /// Returns a [`ValidationError`] naming the first field that is missing,
    /// empty (identifiers only), or of the wrong shape.
    pub fn from_fields(fields: FlattenedIssue) -> Result<Self, ValidationError> {
        Ok(Self {
            issue_id: required_id(fields.issue_id, "issue_id", IssueId::new)?,
            issue_key: required_id(fields.issue_key, "issue_key", IssueKey::new)?,
            summary: required_string(fields.summary, "summary")?,
            description: optional_string(fields.description, "description")?,
            status: required_string(fields.status, "status")?,
            status_category: required_string(fields.status_category, "status_category")?,
            status_from: optional_string(fields.status_from, "status_from")?,
            status_to: optional_string(fields.status_to, "status_to")?,
            issue_type: required_string(fields.issue_type, "issue_type")?,
            project_key: required_id(fields.project_key, "project_key", ProjectKey::new)?,
            priority: optional_string(fields.priority, "priority")?,
            labels: string_list(fields.labels, "labels")?,
            sprint_name: optional_string(fields.sprint_name, "sprint_name")?,
            assignee_name: optional_string(fields.assignee_name, "assignee_name")?,
            reporter_name: optional_string(fields.reporter_name, "reporter_name")?,
            created: optional_string(fields.created, "created")?,
            updated: optional_string(fields.updated, "updated")?,
            timestamp: required_timestamp(fields.timestamp)?,
            additional_attributes: fields.additional_attributes,
        })
    }
}

/// A fully validated issue with its derived classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "IssueRecord")]
pub struct IngestedIssue {
    #[serde(flatten)]
    record: IssueRecord,
    is_data_analysis_task: bool,
}

impl IngestedIssue {
    /// Normalised fields → validated issue, including the derived flag.
    ///
    /// # Errors
    ///
    /// Propagates the [`ValidationError`] from [`IssueRecord::from_fields`].
    pub fn from_fields(fields: FlattenedIssue) -> Result<Self, ValidationError> {
        IssueRecord::from_fields(fields).map(Self::derive)
    }

    /// Computes derived values for a validated record.
    pub fn derive(record: IssueRecord) -> Self {
        let is_data_analysis_task = record
            .description
            .as_deref()
            .is_some_and(|text| TaskMarker::DataAnalysis.is_set_in(text));
        Self {
            record,
            is_data_analysis_task,
        }
    }

    /// The validated fields.
    pub fn record(&self) -> &IssueRecord {
        &self.record
    }

    pub fn issue_id(&self) -> &IssueId {
        &self.record.issue_id
    }

    /// The description, or `""` when Jira sent none.
    pub fn description(&self) -> &str {
        self.record.description.as_deref().unwrap_or_default()
    }

    /// `true` when the description carries `Data Analysis Task: True`.
    pub fn is_data_analysis_task(&self) -> bool {
        self.is_data_analysis_task
    }
}

impl From<IssueRecord> for IngestedIssue {
    fn from(record: IssueRecord) -> Self {
        Self::derive(record)
    }
}

// ---------------------------------------------------------------------------
// Field readers
// ---------------------------------------------------------------------------

fn required_string(value: Option<Value>, field: &'static str) -> Result<String, ValidationError> {
    optional_string(value, field)?.ok_or(ValidationError::MissingField { field })
}

fn optional_string(
    value: Option<Value>,
    field: &'static str,
) -> Result<Option<String>, ValidationError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(ValidationError::WrongType {
            field,
            expected: "a string",
            found: json_kind(&other),
        }),
    }
}

fn required_id<T>(
    value: Option<Value>,
    field: &'static str,
    make: fn(String) -> Option<T>,
) -> Result<T, ValidationError> {
    make(required_string(value, field)?).ok_or(ValidationError::EmptyField { field })
}

fn string_list(value: Value, field: &'static str) -> Result<Vec<String>, ValidationError> {
    let wrong_type = |found: &Value| ValidationError::WrongType {
        field,
        expected: "an array of strings",
        found: json_kind(found),
    };
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => items
            .into_iter()
            .map(|item| match item {
                Value::String(s) => Ok(s),
                other => Err(wrong_type(&other)),
            })
            .collect(),
        other => Err(wrong_type(&other)),
    }
}

/// Accepts an integral number, a float with no fractional part, or a numeric string.
fn required_timestamp(value: Option<Value>) -> Result<i64, ValidationError> {
    const FIELD: &str = "timestamp";
    let wrong_type = |found: &Value| ValidationError::WrongType {
        field: FIELD,
        expected: "an integer",
        found: json_kind(found),
    };
    let value = match value {
        None | Some(Value::Null) => return Err(ValidationError::MissingField { field: FIELD }),
        Some(value) => value,
    };
    match &value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64)
                    .map(|f| f as i64)
            })
            .ok_or_else(|| wrong_type(&value)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| wrong_type(&value)),
        _ => Err(wrong_type(&value)),
    }
}
