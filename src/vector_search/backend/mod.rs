//! Storage backends for similarity search
//!
//! A backend executes parameterized statements against a relational store
//! that provides a vector column type and a cosine distance operator. Rows
//! come back as positional [`Value`]s so the search layer can map them
//! without knowing the driver.

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(feature = "postgres")]
pub mod postgres;

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::config::{SearchConfig, StoreLocation};
use crate::vector_search::dialect::Dialect;
use crate::vector_search::error::StoreError;
use crate::vector_search::query::Statement;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

#[cfg(feature = "postgres")]
pub use postgres::PostgresBackend;

/// A single column value from a result row
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
    TextArray(Vec<String>),
}

/// One result row, indexed by projection position
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Result<&Value, StoreError> {
        self.values.get(index).ok_or_else(|| {
            StoreError::Row(format!(
                "column {index} out of range ({} columns)",
                self.values.len()
            ))
        })
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), None | Some(Value::Null))
    }

    /// Non-null text column
    pub fn text(&self, index: usize) -> Result<String, StoreError> {
        self.optional_text(index)?
            .ok_or_else(|| StoreError::Row(format!("column {index} is NULL")))
    }

    pub fn optional_text(&self, index: usize) -> Result<Option<String>, StoreError> {
        match self.value(index)? {
            Value::Null => Ok(None),
            Value::Text(text) => Ok(Some(text.clone())),
            other => Err(StoreError::Row(format!("column {index} is not text: {other:?}"))),
        }
    }

    pub fn optional_f64(&self, index: usize) -> Result<Option<f64>, StoreError> {
        match self.value(index)? {
            Value::Null => Ok(None),
            Value::Real(value) => Ok(Some(*value)),
            Value::Integer(value) => Ok(Some(*value as f64)),
            other => Err(StoreError::Row(format!("column {index} is not numeric: {other:?}"))),
        }
    }

    /// Boolean column; SQLite reports `EXISTS` as an integer
    pub fn bool(&self, index: usize) -> Result<bool, StoreError> {
        match self.value(index)? {
            Value::Bool(value) => Ok(*value),
            Value::Integer(value) => Ok(*value != 0),
            other => Err(StoreError::Row(format!("column {index} is not boolean: {other:?}"))),
        }
    }

    /// Text-set column: a native array, or a JSON array stored as text
    pub fn string_list(&self, index: usize) -> Result<Vec<String>, StoreError> {
        match self.value(index)? {
            Value::Null => Ok(Vec::new()),
            Value::TextArray(items) => Ok(items.clone()),
            Value::Text(text) if text.trim().is_empty() => Ok(Vec::new()),
            Value::Text(text) => serde_json::from_str(text).map_err(|e| {
                StoreError::Row(format!("column {index} is not a JSON string array: {e}"))
            }),
            other => Err(StoreError::Row(format!(
                "column {index} is not a string list: {other:?}"
            ))),
        }
    }
}

/// Trait implemented by stores that can rank rows by vector distance
///
/// Each call acquires whatever connection it needs for its own duration and
/// releases it before returning. The cancellation token is propagated into
/// the driver call; a fired token yields [`StoreError::Cancelled`].
#[async_trait]
pub trait VectorBackend: Send + Sync {
    /// SQL flavour used to build statements for this store
    fn dialect(&self) -> Dialect;

    /// Run a query and collect every row
    async fn query_rows(
        &self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>, StoreError>;

    /// Run a statement that returns no rows, yielding the affected row count
    async fn execute(
        &self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError>;
}

/// Open the backend described by the configuration
pub async fn connect(config: &SearchConfig) -> Result<Arc<dyn VectorBackend>, StoreError> {
    match config.store_location()? {
        #[cfg(feature = "sqlite")]
        StoreLocation::SqliteMemory => Ok(Arc::new(SqliteBackend::open_in_memory()?)),
        #[cfg(feature = "sqlite")]
        StoreLocation::SqliteFile(path) => Ok(Arc::new(SqliteBackend::open(&path)?)),
        #[cfg(feature = "postgres")]
        StoreLocation::Postgres(url) => Ok(Arc::new(
            PostgresBackend::connect(&url, config.max_connections).await?,
        )),
        #[allow(unreachable_patterns)]
        other => Err(StoreError::Unsupported(format!(
            "{other:?} requires a backend feature that is not enabled"
        ))),
    }
}
