//! Shared SQLite connection handle.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use thiserror::Error;

/// How long a statement waits on a locked database file before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors raised inside the SQLite backend before they are mapped to port errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Stored record could not be encoded or decoded: {0}")]
    Json(#[from] serde_json::Error),

    #[error("'{name}' is not a valid table or queue name")]
    InvalidIdentifier { name: String },

    #[error("Database lock poisoned")]
    Poisoned,

    #[error("Database task failed: {0}")]
    Task(String),
}

/// Async-safe handle to a SQLite database.
///
/// Wraps the connection behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so synchronous SQLite I/O never
/// ties up async worker threads. Clones share the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) a database file.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Runs `f` with the connection on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, DbError>
    where
        F: FnOnce(&Connection) -> Result<R, DbError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn.lock().map_err(|_| DbError::Poisoned)?;
            f(&guard)
        })
        .await
        .map_err(|e| DbError::Task(e.to_string()))?
    }
}

/// Checks that `name` can be interpolated into SQL as an identifier.
pub fn sql_identifier(name: &str) -> Result<String, DbError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(name.to_string())
    } else {
        Err(DbError::InvalidIdentifier {
            name: name.to_string(),
        })
    }
}
