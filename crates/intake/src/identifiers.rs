//! Newtype domain identifiers.
//!
//! Every identity carried by a webhook is represented as a distinct newtype
//! wrapping a `String`. This prevents accidentally interchanging an
//! [`IssueId`] (Jira's numeric id, e.g. `"10042"`) with an [`IssueKey`]
//! (the human key, e.g. `"NEMO-7"`) even though both are strings on the wire.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id! {
    /// Jira's internal issue id (`issue.id`).
    ///
    /// Primary key of the stored record and the story id handed downstream.
    IssueId
}

string_id! {
    /// The human-facing issue key (`issue.key`), e.g. `"NEMO-7"`.
    IssueKey
}

string_id! {
    /// The owning project's key (`issue.fields.project.key`).
    ProjectKey
}

string_id! {
    /// A GitHub URL extracted from an issue description.
    ///
    /// Never empty: dispatch only happens when a link was found.
    GithubLink
}
