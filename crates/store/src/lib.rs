//! SQLite-backed persistence for the intake service.
//!
//! Implements the [`intake::IssueStore`] and [`intake::DispatchQueue`] ports.
//! Both share one [`Database`] handle so a single file holds stored issues
//! and queued work.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Depends on `intake` for port traits and domain types.
//! Contains no domain rules.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`db`] | `Database` handle, `DbError` |
//! | [`issues`] | `SqliteIssueStore` |
//! | [`queue`] | `SqliteDispatchQueue`, `QueuedMessage` |

pub mod db;
pub mod issues;
pub mod queue;

pub use db::{sql_identifier, Database, DbError};
pub use issues::{SqliteIssueStore, DEFAULT_ISSUE_TABLE};
pub use queue::{QueuedMessage, SqliteDispatchQueue, DEFAULT_DEDUP_WINDOW};
