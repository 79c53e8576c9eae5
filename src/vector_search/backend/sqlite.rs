//! SQLite implementation of the vector backend
//!
//! Embeddings are stored as vector literals in a nullable text column.
//! Cosine distance is provided by a scalar function registered on the
//! connection, so ranking and limiting happen inside the store exactly as
//! they do with pgvector.

use async_trait::async_trait;
use ndarray::ArrayView1;
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection, InterruptHandle, ToSql};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::vector_search::backend::{Row, Value, VectorBackend};
use crate::vector_search::codec;
use crate::vector_search::dialect::{Dialect, SQLITE_DISTANCE_FUNCTION};
use crate::vector_search::error::StoreError;
use crate::vector_search::query::{SqlParam, Statement};

/// Ticket value while no call holds the connection
const IDLE: u64 = 0;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "MediaItems" (
    "Id" TEXT PRIMARY KEY,
    "Title" TEXT NOT NULL,
    "MediaType" TEXT NOT NULL,
    "Description" TEXT,
    "Thumbnail" TEXT,
    "Status" TEXT NOT NULL,
    "Rating" TEXT,
    "Embedding" TEXT
);

CREATE INDEX IF NOT EXISTS "IX_MediaItems_MediaType" ON "MediaItems" ("MediaType");

CREATE TABLE IF NOT EXISTS "Notes" (
    "Id" TEXT PRIMARY KEY,
    "Title" TEXT NOT NULL,
    "VaultName" TEXT NOT NULL,
    "Description" TEXT,
    "AiDescription" TEXT,
    "SourceUrl" TEXT,
    "Tags" TEXT NOT NULL DEFAULT '[]',
    "Embedding" TEXT
);

CREATE INDEX IF NOT EXISTS "IX_Notes_VaultName" ON "Notes" ("VaultName");
"#;

/// Whether the distance function is registered on the connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorSupport {
    Enabled,
    Disabled,
}

/// SQLite-backed vector store
///
/// One connection is shared by all callers; each call holds it through a
/// mutex guard inside a blocking task and releases it when the call ends.
pub struct SqliteBackend {
    conn: Arc<Mutex<Connection>>,
    interrupt: Arc<InterruptHandle>,
    /// Ticket of the call whose statement is running; interrupts are only
    /// issued while holding this lock and seeing the caller's own ticket.
    running: Arc<Mutex<u64>>,
    next_ticket: AtomicU64,
}

impl SqliteBackend {
    /// Open (or create) a database file with vector support
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::from_connection(Connection::open(path)?, VectorSupport::Enabled)
    }

    /// Open a private in-memory database with vector support
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?, VectorSupport::Enabled)
    }

    /// Wrap an existing connection
    pub fn from_connection(conn: Connection, support: VectorSupport) -> Result<Self, StoreError> {
        if support == VectorSupport::Enabled {
            register_vector_functions(&conn)?;
        }

        let interrupt = Arc::new(conn.get_interrupt_handle());
        tracing::debug!("Opened SQLite vector backend ({:?})", support);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            running: Arc::new(Mutex::new(IDLE)),
            next_ticket: AtomicU64::new(1),
        })
    }

    /// Create the catalog tables if they do not exist yet
    pub async fn create_schema(&self) -> Result<(), StoreError> {
        let cancel = CancellationToken::new();
        self.with_connection(&cancel, |conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
    }

    async fn with_connection<T, F>(
        &self,
        cancel: &CancellationToken,
        work: F,
    ) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(StoreError::Cancelled);
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let conn = Arc::clone(&self.conn);
        let running = Arc::clone(&self.running);
        let worker_cancel = cancel.clone();

        let mut task = tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Backend("SQLite connection mutex poisoned".to_string()))?;

            // Checked under the slot lock so a cancel either sees our ticket
            // or we see the cancel.
            {
                let mut slot = lock_slot(&running);
                if worker_cancel.is_cancelled() {
                    return Err(StoreError::Cancelled);
                }
                *slot = ticket;
            }

            let result = work(&guard);
            *lock_slot(&running) = IDLE;
            result
        });

        tokio::select! {
            biased;
            joined = &mut task => join_result(joined),
            _ = cancel.cancelled() => {
                let started = {
                    let slot = lock_slot(&self.running);
                    let started = *slot == ticket;
                    if started {
                        self.interrupt.interrupt();
                    }
                    started
                };

                if started {
                    // The interrupted statement stops at its next step; report
                    // whatever it actually did.
                    join_result(task.await)
                } else {
                    tracing::debug!(ticket, "SQLite call cancelled before it started");
                    Err(StoreError::Cancelled)
                }
            }
        }
    }
}

fn lock_slot(slot: &Mutex<u64>) -> MutexGuard<'_, u64> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join_result<T>(
    joined: Result<Result<T, StoreError>, tokio::task::JoinError>,
) -> Result<T, StoreError> {
    joined.map_err(|e| StoreError::Backend(format!("SQLite task failed: {e}")))?
}

#[async_trait]
impl VectorBackend for SqliteBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn query_rows(
        &self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>, StoreError> {
        let statement = statement.clone();
        self.with_connection(cancel, move |conn| run_query(conn, &statement)).await
    }

    async fn execute(
        &self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        let statement = statement.clone();
        self.with_connection(cancel, move |conn| {
            let changed = conn.execute(&statement.sql, params_from_iter(statement.params.iter()))?;
            Ok(changed as u64)
        })
        .await
    }
}

fn run_query(conn: &Connection, statement: &Statement) -> Result<Vec<Row>, StoreError> {
    let mut stmt = conn.prepare_cached(&statement.sql)?;
    let column_count = stmt.column_count();
    let mut rows = stmt.query(params_from_iter(statement.params.iter()))?;

    let mut collected = Vec::new();
    loop {
        let row = match rows.next() {
            Ok(Some(row)) => row,
            Ok(None) => break,
            Err(err) => return Err(StoreError::from(err).after_rows(collected.len())),
        };
        let values = (0..column_count)
            .map(|index| row.get_ref(index).map_err(StoreError::from).and_then(to_value))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| err.after_rows(collected.len()))?;
        collected.push(Row::new(values));
    }

    Ok(collected)
}

fn to_value(value: ValueRef<'_>) -> Result<Value, StoreError> {
    match value {
        ValueRef::Null => Ok(Value::Null),
        ValueRef::Integer(i) => Ok(Value::Integer(i)),
        ValueRef::Real(f) => Ok(Value::Real(f)),
        ValueRef::Text(bytes) => Ok(Value::Text(String::from_utf8_lossy(bytes).into_owned())),
        ValueRef::Blob(_) => Err(StoreError::Row("unexpected BLOB column".to_string())),
    }
}

impl ToSql for SqlParam {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlParam::Text(text) => ToSqlOutput::from(text.as_str()),
            SqlParam::Integer(value) => ToSqlOutput::from(*value),
            SqlParam::Uuid(id) => ToSqlOutput::from(id.to_string()),
        })
    }
}

/// Register `vec_cosine_distance(stored, query)` on a connection
///
/// Returns NULL when the stored value is not a readable vector literal or
/// has zero magnitude, and fails the statement when the two vectors differ
/// in length.
pub fn register_vector_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        SQLITE_DISTANCE_FUNCTION,
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let Some(stored) = vector_arg(ctx, 0) else {
                return Ok(None);
            };
            let query = vector_arg(ctx, 1).ok_or_else(|| {
                rusqlite::Error::UserFunctionError("query vector is not a valid literal".into())
            })?;

            if stored.len() != query.len() {
                return Err(rusqlite::Error::UserFunctionError(
                    format!("different vector dimensions {} and {}", stored.len(), query.len())
                        .into(),
                ));
            }

            Ok(cosine_distance(&stored, &query))
        },
    )
}

fn vector_arg(ctx: &Context<'_>, index: usize) -> Option<Vec<f32>> {
    match ctx.get_raw(index) {
        ValueRef::Text(bytes) => std::str::from_utf8(bytes).ok().and_then(codec::decode),
        _ => None,
    }
}

/// Cosine distance (`1 - cosine similarity`), `None` for zero-magnitude input
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Option<f64> {
    let a = ArrayView1::from(a).mapv(f64::from);
    let b = ArrayView1::from(b).mapv(f64::from);

    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return None;
    }

    Some(1.0 - a.dot(&b) / (norm_a * norm_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_distance() {
        assert!(cosine_distance(&[1.0, 0.0], &[2.0, 0.0]).unwrap().abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[0.0, 1.0]).unwrap() - 1.0).abs() < 1e-12);
        assert!((cosine_distance(&[1.0, 0.0], &[-1.0, 0.0]).unwrap() - 2.0).abs() < 1e-12);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), None);
    }

    #[test]
    fn test_distance_function_in_sql() {
        let conn = Connection::open_in_memory().unwrap();
        register_vector_functions(&conn).unwrap();

        let distance: f64 = conn
            .query_row("SELECT vec_cosine_distance('[1,0]', '[0,1]')", [], |row| row.get(0))
            .unwrap();
        assert!((distance - 1.0).abs() < 1e-12);

        let corrupt: Option<f64> = conn
            .query_row("SELECT vec_cosine_distance('[1,abc]', '[0,1]')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(corrupt, None);

        let mismatch = conn.query_row("SELECT vec_cosine_distance('[1,0,0]', '[0,1]')", [], |row| {
            row.get::<_, f64>(0)
        });
        assert!(mismatch.is_err());
    }

    #[test]
    fn test_distance_function_is_listed_in_metadata() {
        let conn = Connection::open_in_memory().unwrap();
        register_vector_functions(&conn).unwrap();

        let listed: bool = conn
            .query_row(&Dialect::Sqlite.capability_query(), [], |row| row.get(0))
            .unwrap();
        assert!(listed);
    }
}
