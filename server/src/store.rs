//! SQLite-backed todo store.
//!
//! # Responsibility
//! - Open the database file (or an in-memory database) and create the
//!   `todos` table when missing.
//! - Run every todo query with bound parameters only.
//!
//! # Invariants
//! - One connection per process, serialized behind an async mutex.
//! - After `close`, every operation fails with `StoreError::Closed`.
//! - Each mutation is a single statement, so an update or delete can never
//!   act on a row that disappeared between a check and the write.
//! - `createdAt` is filled by the column default and never written again.

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tokio::sync::Mutex;

use crate::model::{iso8601, NewTodo, Todo, TodoPatch};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS todos (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    text TEXT NOT NULL,
    completed BOOLEAN DEFAULT 0,
    createdAt DATETIME DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
);";

const COLUMNS: &str = "id, text, completed, createdAt";

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("todo {id} has an unreadable createdAt value `{value}`")]
    CorruptTimestamp { id: i64, value: String },

    #[error("blocking store task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("store is closed")]
    Closed,
}

/// Handle to the todo table. Cloning is cheap and shares the connection.
#[derive(Clone)]
pub struct TodoStore {
    conn: Arc<Mutex<Option<Connection>>>,
}

impl TodoStore {
    /// Opens (or creates) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        tracing::info!(path = %path.display(), "database opened");
        Self::bootstrap(conn)
    }

    /// Opens a private in-memory database; contents vanish with the store.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::bootstrap(Connection::open_in_memory()?)
    }

    fn bootstrap(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(Some(conn))),
        })
    }

    /// Runs `op` against the connection on the blocking pool.
    async fn with_conn<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
    {
        let guard = Arc::clone(&self.conn).lock_owned().await;
        tokio::task::spawn_blocking(move || {
            let conn = guard.as_ref().ok_or(StoreError::Closed)?;
            op(conn)
        })
        .await?
    }

    /// All todos, newest first.
    ///
    /// Sorts on `julianday` so legacy `YYYY-MM-DD HH:MM:SS` rows and
    /// millisecond `...T...Z` rows compare by instant, not by text.
    pub async fn list(&self) -> StoreResult<Vec<Todo>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM todos ORDER BY julianday(createdAt) DESC, id DESC"
            ))?;
            let rows = stmt.query_map([], read_row)?;
            let mut todos = Vec::new();
            for row in rows {
                todos.push(row?.into_todo()?);
            }
            Ok(todos)
        })
        .await
    }

    pub async fn get(&self, id: i64) -> StoreResult<Option<Todo>> {
        self.with_conn(move |conn| {
            conn.query_row(
                &format!("SELECT {COLUMNS} FROM todos WHERE id = ?1"),
                params![id],
                read_row,
            )
            .optional()?
            .map(RawTodo::into_todo)
            .transpose()
        })
        .await
    }

    pub async fn create(&self, new: NewTodo) -> StoreResult<Todo> {
        let todo = self
            .with_conn(move |conn| {
                conn.query_row(
                    &format!("INSERT INTO todos (text) VALUES (?1) RETURNING {COLUMNS}"),
                    params![new.text],
                    read_row,
                )?
                .into_todo()
            })
            .await?;
        tracing::debug!(id = todo.id, "todo created");
        Ok(todo)
    }

    /// Applies `patch` and returns the updated row, or `None` if `id` is absent.
    ///
    /// An empty patch leaves the row untouched and behaves like [`get`](Self::get).
    pub async fn update(&self, id: i64, patch: TodoPatch) -> StoreResult<Option<Todo>> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        self.with_conn(move |conn| {
            conn.query_row(
                &format!(
                    "UPDATE todos
                     SET text = COALESCE(?1, text),
                         completed = COALESCE(?2, completed)
                     WHERE id = ?3
                     RETURNING {COLUMNS}"
                ),
                params![patch.text, patch.completed, id],
                read_row,
            )
            .optional()?
            .map(RawTodo::into_todo)
            .transpose()
        })
        .await
    }

    /// Removes the todo; `false` if it did not exist.
    pub async fn delete(&self, id: i64) -> StoreResult<bool> {
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM todos WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
    }

    /// Closes the connection for every clone of this store.
    ///
    /// Waits for the in-flight operation, if any. Closing twice is a no-op.
    pub async fn close(&self) -> StoreResult<()> {
        let Some(conn) = self.conn.lock().await.take() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || conn.close().map_err(|(_, err)| StoreError::from(err)))
            .await?
    }
}

/// Row as read from SQLite, before the timestamp is interpreted.
struct RawTodo {
    id: i64,
    text: String,
    completed: bool,
    created_at: String,
}

impl RawTodo {
    fn into_todo(self) -> StoreResult<Todo> {
        let created_at =
            iso8601::parse(&self.created_at).ok_or_else(|| StoreError::CorruptTimestamp {
                id: self.id,
                value: self.created_at.clone(),
            })?;
        Ok(Todo {
            id: self.id,
            text: self.text,
            completed: self.completed,
            created_at,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawTodo> {
    Ok(RawTodo {
        id: row.get("id")?,
        text: row.get("text")?,
        completed: row.get::<_, Option<bool>>("completed")?.unwrap_or(false),
        created_at: row.get("createdAt")?,
    })
}
