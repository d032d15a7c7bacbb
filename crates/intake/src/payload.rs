//! Flattening of the nested Jira webhook payload.
//!
//! The webhook body is an arbitrarily deep JSON tree. [`flatten`] walks a
//! fixed set of paths and returns a [`FlattenedIssue`] whose fields are
//! either the raw JSON value found at the path or `None`. Missing keys,
//! `null`, and non-object intermediates all collapse to `None`; shape
//! checking is left to [`crate::record`].

use serde_json::{Map, Value};

use crate::errors::PayloadError;

/// Custom field Jira uses for the sprint list on the installations we serve.
pub const SPRINT_FIELD: &str = "customfield_10020";

/// Key under [`FlattenedIssue::additional_attributes`] for the assignee's account id.
pub const ASSIGNEE_ID: &str = "assignee_id";

/// Key under [`FlattenedIssue::additional_attributes`] for the reporter's account id.
pub const REPORTER_ID: &str = "reporter_id";

/// The fixed field set extracted from a webhook payload, still untyped.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FlattenedIssue {
    pub issue_id: Option<Value>,
    pub issue_key: Option<Value>,
    pub summary: Option<Value>,
    pub description: Option<Value>,
    pub status: Option<Value>,
    pub status_category: Option<Value>,
    pub issue_type: Option<Value>,
    pub project_key: Option<Value>,
    pub assignee_name: Option<Value>,
    pub reporter_name: Option<Value>,
    pub created: Option<Value>,
    pub updated: Option<Value>,
    pub priority: Option<Value>,
    /// Defaults to an empty array when absent.
    pub labels: Value,
    /// `name` of the first sprint entry, if any.
    pub sprint_name: Option<Value>,
    pub timestamp: Option<Value>,
    /// `fromString` of the first changelog item.
    pub status_from: Option<Value>,
    /// `toString` of the first changelog item.
    pub status_to: Option<Value>,
    /// Assignee/reporter account ids; keys are only present when found.
    pub additional_attributes: Map<String, Value>,
}

/// Extracts the fixed field set from a webhook payload.
///
/// # Errors
///
/// Returns [`PayloadError::NotAnObject`] when `payload` is not a JSON object.
/// Missing nested structure never fails.
pub fn flatten(payload: &Value) -> Result<FlattenedIssue, PayloadError> {
    if !payload.is_object() {
        return Err(PayloadError::NotAnObject {
            found: json_kind(payload),
        });
    }

    let issue = lookup(payload, &["issue"]);
    let fields = issue.and_then(|issue| lookup(issue, &["fields"]));
    let field = |path: &[&str]| fields.and_then(|f| lookup(f, path)).cloned();

    let assignee = fields.and_then(|f| lookup(f, &["assignee"]));
    let reporter = fields.and_then(|f| lookup(f, &["reporter"]));

    let first_change = first_element(lookup(payload, &["changelog", "items"]));
    let first_sprint = first_element(fields.and_then(|f| lookup(f, &[SPRINT_FIELD])));

    let mut additional_attributes = Map::new();
    if let Some(id) = assignee.and_then(|a| lookup(a, &["accountId"])) {
        additional_attributes.insert(ASSIGNEE_ID.to_string(), id.clone());
    }
    if let Some(id) = reporter.and_then(|r| lookup(r, &["accountId"])) {
        additional_attributes.insert(REPORTER_ID.to_string(), id.clone());
    }

    Ok(FlattenedIssue {
        issue_id: issue.and_then(|i| lookup(i, &["id"])).cloned(),
        issue_key: issue.and_then(|i| lookup(i, &["key"])).cloned(),
        summary: field(&["summary"]),
        description: field(&["description"]),
        status: field(&["status", "name"]),
        status_category: field(&["status", "statusCategory", "name"]),
        issue_type: field(&["issuetype", "name"]),
        project_key: field(&["project", "key"]),
        assignee_name: assignee.and_then(|a| lookup(a, &["displayName"])).cloned(),
        reporter_name: reporter.and_then(|r| lookup(r, &["displayName"])).cloned(),
        created: field(&["created"]),
        updated: field(&["updated"]),
        priority: field(&["priority", "name"]),
        labels: field(&["labels"]).unwrap_or_else(|| Value::Array(Vec::new())),
        sprint_name: first_sprint.and_then(|s| lookup(s, &["name"])).cloned(),
        timestamp: lookup(payload, &["timestamp"]).cloned(),
        status_from: first_change.and_then(|c| lookup(c, &["fromString"])).cloned(),
        status_to: first_change.and_then(|c| lookup(c, &["toString"])).cloned(),
        additional_attributes,
    })
}

/// Descends through `path`, treating `null` and non-object intermediates as absent.
fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter()
        .try_fold(root, |node, key| node.as_object()?.get(*key))
        .filter(|value| !value.is_null())
}

fn first_element(value: Option<&Value>) -> Option<&Value> {
    value
        .and_then(Value::as_array)
        .and_then(|items| items.first())
        .filter(|item| !item.is_null())
}

/// Human-readable JSON type name used in error messages.
pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn full_payload() -> Value {
        json!({
            "timestamp": 1718000000000_i64,
            "issue": {
                "id": "10042",
                "key": "NEMO-7",
                "fields": {
                    "summary": "Add retries",
                    "description": "See https://github.com/org/repo/pull/1",
                    "status": { "name": "In Progress", "statusCategory": { "name": "In Progress" } },
                    "issuetype": { "name": "Story" },
                    "project": { "key": "NEMO" },
                    "assignee": { "displayName": "Ada", "accountId": "acc-1" },
                    "reporter": { "displayName": "Grace", "accountId": "acc-2" },
                    "created": "2024-06-01T10:00:00.000+0000",
                    "updated": "2024-06-02T10:00:00.000+0000",
                    "priority": { "name": "High" },
                    "labels": ["backend", "ai"],
                    "customfield_10020": [{ "name": "Sprint 12" }, { "name": "Sprint 13" }]
                }
            },
            "changelog": { "items": [{ "fromString": "To Do", "toString": "In Progress" }] }
        })
    }

    #[test]
    fn flattens_every_field() {
        let flat = flatten(&full_payload()).unwrap();
        assert_eq!(flat.issue_id, Some(json!("10042")));
        assert_eq!(flat.issue_key, Some(json!("NEMO-7")));
        assert_eq!(flat.status, Some(json!("In Progress")));
        assert_eq!(flat.status_category, Some(json!("In Progress")));
        assert_eq!(flat.issue_type, Some(json!("Story")));
        assert_eq!(flat.project_key, Some(json!("NEMO")));
        assert_eq!(flat.priority, Some(json!("High")));
        assert_eq!(flat.labels, json!(["backend", "ai"]));
        assert_eq!(flat.sprint_name, Some(json!("Sprint 12")));
        assert_eq!(flat.timestamp, Some(json!(1718000000000_i64)));
        assert_eq!(flat.status_from, Some(json!("To Do")));
        assert_eq!(flat.status_to, Some(json!("In Progress")));
        assert_eq!(flat.additional_attributes.get(ASSIGNEE_ID), Some(&json!("acc-1")));
        assert_eq!(flat.additional_attributes.get(REPORTER_ID), Some(&json!("acc-2")));
    }

    #[test]
    fn top_level_must_be_an_object() {
        let err = flatten(&json!([1, 2])).unwrap_err();
        assert_eq!(err, PayloadError::NotAnObject { found: "array" });
        assert!(flatten(&json!("text")).is_err());
    }

    #[test]
    fn empty_object_flattens_to_absent_fields() {
        let flat = flatten(&json!({})).unwrap();
        assert_eq!(flat.issue_id, None);
        assert_eq!(flat.status, None);
        assert_eq!(flat.labels, json!([]));
        assert!(flat.additional_attributes.is_empty());
    }

    #[test]
    fn missing_assignee_is_absent() {
        let mut payload = full_payload();
        payload["issue"]["fields"]
            .as_object_mut()
            .unwrap()
            .remove("assignee");
        let flat = flatten(&payload).unwrap();
        assert_eq!(flat.assignee_name, None);
        assert!(!flat.additional_attributes.contains_key(ASSIGNEE_ID));
        assert!(flat.additional_attributes.contains_key(REPORTER_ID));
    }

    #[test]
    fn null_assignee_is_absent() {
        let mut payload = full_payload();
        payload["issue"]["fields"]["assignee"] = Value::Null;
        let flat = flatten(&payload).unwrap();
        assert_eq!(flat.assignee_name, None);
        assert!(!flat.additional_attributes.contains_key(ASSIGNEE_ID));
    }

    #[test]
    fn missing_status_drops_status_and_category() {
        let mut payload = full_payload();
        payload["issue"]["fields"]
            .as_object_mut()
            .unwrap()
            .remove("status");
        let flat = flatten(&payload).unwrap();
        assert_eq!(flat.status, None);
        assert_eq!(flat.status_category, None);
    }

    #[test]
    fn empty_sprint_and_changelog_arrays_are_absent() {
        let mut payload = full_payload();
        payload["issue"]["fields"][SPRINT_FIELD] = json!([]);
        payload["changelog"]["items"] = json!([]);
        let flat = flatten(&payload).unwrap();
        assert_eq!(flat.sprint_name, None);
        assert_eq!(flat.status_from, None);
        assert_eq!(flat.status_to, None);
    }

    #[test]
    fn non_object_intermediate_is_absent() {
        let payload = json!({ "issue": { "id": "1", "fields": "not an object" } });
        let flat = flatten(&payload).unwrap();
        assert_eq!(flat.issue_id, Some(json!("1")));
        assert_eq!(flat.summary, None);
    }

    #[test]
    fn malformed_labels_are_carried_through() {
        let mut payload = full_payload();
        payload["issue"]["fields"]["labels"] = json!("backend");
        let flat = flatten(&payload).unwrap();
        assert_eq!(flat.labels, json!("backend"));
    }
}
