//! Error types for vector search functionality
//!
//! Soft failures (`DecodeError`, probe failures) are absorbed close to where
//! they happen. `SearchError` is what callers of a similarity search see.

use thiserror::Error;

use crate::vector_search::types::CatalogKind;

/// A vector could not be rendered as a literal.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EncodingError {
    #[error("Non-finite embedding component {value} at index {index}")]
    NonFinite { index: usize, value: f32 },
}

/// A stored literal could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Vector literal is empty")]
    Empty,

    #[error("Invalid vector component {token:?} at index {index}")]
    InvalidComponent { index: usize, token: String },
}

/// Failures raised by a storage backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store rejected or failed to run a statement
    #[error("Database error: {0}")]
    Backend(String),

    /// A value in a result row had an unexpected shape
    #[error("Row error: {0}")]
    Row(String),

    /// The caller's cancellation signal fired before the call completed
    #[error("Operation cancelled")]
    Cancelled,

    /// The backend cannot perform the requested operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Connection string or location could not be used
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A query failed part way through its result set
    #[error("{source} (after {rows_read} rows)")]
    AfterRows {
        rows_read: usize,
        #[source]
        source: Box<StoreError>,
    },
}

impl StoreError {
    pub fn is_cancelled(&self) -> bool {
        match self {
            StoreError::Cancelled => true,
            StoreError::AfterRows { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Record how many rows were read before this error
    pub fn after_rows(self, rows_read: usize) -> Self {
        match self {
            StoreError::AfterRows { source, .. } => StoreError::AfterRows { rows_read, source },
            other => StoreError::AfterRows {
                rows_read,
                source: Box::new(other),
            },
        }
    }

    /// Rows read before the failure, 0 when the statement never produced any
    pub fn rows_read(&self) -> usize {
        match self {
            StoreError::AfterRows { rows_read, .. } => *rows_read,
            _ => 0,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                StoreError::Cancelled
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::ColumnNotFound(_) => {
                StoreError::Row(err.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

/// Errors returned by similarity search operations
#[derive(Error, Debug)]
pub enum SearchError {
    /// The ranked query could not be executed
    #[error("{operation} failed for {catalog} after {rows_read} rows: {source}")]
    Execution {
        operation: &'static str,
        catalog: CatalogKind,
        rows_read: usize,
        #[source]
        source: StoreError,
    },

    /// The query embedding could not be rendered
    #[error("Embedding error: {0}")]
    Encoding(#[from] EncodingError),

    /// The request itself is unusable
    #[error("Invalid search parameters: {0}")]
    InvalidQuery(String),

    /// The caller aborted the request
    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
}

impl SearchError {
    pub(crate) fn from_store(
        operation: &'static str,
        catalog: CatalogKind,
        source: StoreError,
    ) -> Self {
        if source.is_cancelled() {
            return SearchError::Cancelled { operation };
        }

        let (rows_read, source) = match source {
            StoreError::AfterRows { rows_read, source } => (rows_read, *source),
            other => (0, other),
        };
        SearchError::Execution {
            operation,
            catalog,
            rows_read,
            source,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchError::Cancelled { .. })
    }

    /// Whether the failure is in the infrastructure rather than the request
    pub fn is_unavailable(&self) -> bool {
        matches!(self, SearchError::Execution { .. })
    }

    /// Message suitable for an end user at an outer boundary
    pub fn user_message(&self) -> &'static str {
        match self {
            SearchError::Execution { .. } => "search temporarily unavailable",
            SearchError::Encoding(_) | SearchError::InvalidQuery(_) => "invalid search request",
            SearchError::Cancelled { .. } => "search cancelled",
        }
    }
}
