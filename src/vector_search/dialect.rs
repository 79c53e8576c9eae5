//! SQL flavour differences between supported stores
//!
//! Statements are assembled from the same fragments for every store; only
//! placeholder syntax, the distance expression, and the capability metadata
//! query differ.

use serde::{Deserialize, Serialize};

/// Name of the cosine distance function registered on SQLite connections
pub const SQLITE_DISTANCE_FUNCTION: &str = "vec_cosine_distance";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// PostgreSQL with the pgvector extension
    Postgres,
    /// SQLite with the crate's distance function registered
    Sqlite,
}

impl Dialect {
    /// Positional placeholder for the 1-based parameter `index`
    pub fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }

    /// A bound vector literal as an SQL value of the vector type
    pub fn vector_value(&self, placeholder: &str) -> String {
        match self {
            Dialect::Postgres => format!("{placeholder}::vector"),
            Dialect::Sqlite => placeholder.to_string(),
        }
    }

    /// Cosine distance between a stored column and a bound query vector
    pub fn cosine_distance(&self, column: &str, placeholder: &str) -> String {
        match self {
            Dialect::Postgres => {
                format!("{} <=> {}", quote(column), self.vector_value(placeholder))
            }
            Dialect::Sqlite => {
                format!("{SQLITE_DISTANCE_FUNCTION}({}, {placeholder})", quote(column))
            }
        }
    }

    /// `ORDER BY` clause for a distance expression
    ///
    /// SQLite yields NULL for stored vectors it cannot read; those sort after
    /// every real distance. pgvector never yields NULL here, and the bare
    /// expression keeps the ordering index-friendly.
    pub fn order_by_distance(&self, distance: &str) -> String {
        match self {
            Dialect::Postgres => format!("ORDER BY {distance}"),
            Dialect::Sqlite => format!("ORDER BY {distance} ASC NULLS LAST"),
        }
    }

    /// A vector column rendered in literal form
    pub fn vector_as_text(&self, column: &str) -> String {
        match self {
            Dialect::Postgres => format!("{}::text", quote(column)),
            Dialect::Sqlite => quote(column),
        }
    }

    /// Metadata query answering whether vector similarity is installed
    pub fn capability_query(&self) -> String {
        match self {
            Dialect::Postgres => {
                "SELECT EXISTS(SELECT 1 FROM pg_extension WHERE extname = 'vector')".to_string()
            }
            Dialect::Sqlite => format!(
                "SELECT EXISTS(SELECT 1 FROM pragma_function_list \
                 WHERE name = '{SQLITE_DISTANCE_FUNCTION}')"
            ),
        }
    }
}

/// Quote an identifier; every catalog table uses mixed-case names
pub fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}
