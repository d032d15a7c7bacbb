//! SQLite implementation of [`IssueStore`].

use async_trait::async_trait;
use intake::{IngestedIssue, IssueId, IssueQuery, IssueStore, StoreError};
use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::db::{sql_identifier, Database, DbError};

/// Default table name for stored webhook events.
pub const DEFAULT_ISSUE_TABLE: &str = "jira_webhook_events";

/// Stores one row per issue, keyed by issue id.
///
/// The full [`IngestedIssue`] is kept as a JSON document next to the key
/// columns used for lookups. Writes are upserts, so the latest webhook for
/// an issue replaces the earlier one.
#[derive(Clone)]
pub struct SqliteIssueStore {
    db: Database,
    table: String,
}

impl SqliteIssueStore {
    /// Opens the store on `table`, creating the table and its indexes if needed.
    pub async fn open(db: Database, table: &str) -> Result<Self, DbError> {
        let table = sql_identifier(table)?;
        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                issue_id    TEXT PRIMARY KEY,
                issue_key   TEXT NOT NULL,
                project_key TEXT NOT NULL,
                record      TEXT NOT NULL,
                stored_at   TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_{table}_project ON {table}(project_key);
            CREATE INDEX IF NOT EXISTS idx_{table}_key ON {table}(issue_key);"
        );
        db.call(move |conn| Ok(conn.execute_batch(&ddl)?)).await?;
        Ok(Self { db, table })
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    async fn put_issue(&self, issue: &IngestedIssue) -> Result<(), DbError> {
        let record = serde_json::to_string(issue)?;
        let issue_id = issue.issue_id().to_string();
        let issue_key = issue.record().issue_key.to_string();
        let project_key = issue.record().project_key.to_string();
        let stored_at = chrono::Utc::now().to_rfc3339();
        let sql = format!(
            "INSERT INTO {} (issue_id, issue_key, project_key, record, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(issue_id) DO UPDATE SET
                issue_key = excluded.issue_key,
                project_key = excluded.project_key,
                record = excluded.record,
                stored_at = excluded.stored_at",
            self.table
        );
        self.db
            .call(move |conn| {
                conn.execute(
                    &sql,
                    params![issue_id, issue_key, project_key, record, stored_at],
                )?;
                Ok(())
            })
            .await
    }

    async fn get_issue(&self, issue_id: &IssueId) -> Result<Option<IngestedIssue>, DbError> {
        let issue_id = issue_id.to_string();
        let sql = format!("SELECT record FROM {} WHERE issue_id = ?1", self.table);
        let record: Option<String> = self
            .db
            .call(move |conn| {
                Ok(conn
                    .query_row(&sql, params![issue_id], |row| row.get(0))
                    .optional()?)
            })
            .await?;
        record
            .map(|json| serde_json::from_str(&json).map_err(DbError::from))
            .transpose()
    }

    async fn query_issues(&self, query: &IssueQuery) -> Result<Vec<IngestedIssue>, DbError> {
        let (column, value) = match query {
            IssueQuery::Project(project) => ("project_key", project.to_string()),
            IssueQuery::Key(key) => ("issue_key", key.to_string()),
        };
        let sql = format!(
            "SELECT record FROM {} WHERE {column} = ?1 ORDER BY issue_id",
            self.table
        );
        let records: Vec<String> = self
            .db
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt
                    .query_map(params![value], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(rows)
            })
            .await?;
        records
            .iter()
            .map(|json| serde_json::from_str(json).map_err(DbError::from))
            .collect()
    }

    async fn delete_issue(&self, issue_id: &IssueId) -> Result<bool, DbError> {
        let issue_id = issue_id.to_string();
        let sql = format!("DELETE FROM {} WHERE issue_id = ?1", self.table);
        self.db
            .call(move |conn| Ok(conn.execute(&sql, params![issue_id])? > 0))
            .await
    }
}

impl From<DbError> for StoreError {
    fn from(error: DbError) -> Self {
        StoreError::new(error.to_string())
    }
}

#[async_trait]
impl IssueStore for SqliteIssueStore {
    async fn put(&self, issue: &IngestedIssue) -> Result<(), StoreError> {
        self.put_issue(issue).await?;
        debug!(issue_id = %issue.issue_id(), table = %self.table, "Stored issue");
        Ok(())
    }

    async fn get(&self, issue_id: &IssueId) -> Result<Option<IngestedIssue>, StoreError> {
        Ok(self.get_issue(issue_id).await?)
    }

    async fn query(&self, query: &IssueQuery) -> Result<Vec<IngestedIssue>, StoreError> {
        Ok(self.query_issues(query).await?)
    }

    async fn delete(&self, issue_id: &IssueId) -> Result<bool, StoreError> {
        Ok(self.delete_issue(issue_id).await?)
    }
}
