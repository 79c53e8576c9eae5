//! Core data types for vector search functionality
//!
//! Catalog descriptors, search requests, and the ranked records returned by
//! similarity queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Default number of results for a similarity query
pub const DEFAULT_LIMIT: usize = 10;

/// Column holding the embedding on every catalog table
pub const EMBEDDING_COLUMN: &str = "Embedding";

/// The entity family being searched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogKind {
    MediaItems,
    Notes,
}

impl CatalogKind {
    pub const ALL: [CatalogKind; 2] = [CatalogKind::MediaItems, CatalogKind::Notes];

    /// Table holding records of this family
    pub fn table(&self) -> &'static str {
        match self {
            CatalogKind::MediaItems => "MediaItems",
            CatalogKind::Notes => "Notes",
        }
    }

    /// Column used by the optional single-valued filter
    pub fn filter_column(&self) -> &'static str {
        match self {
            CatalogKind::MediaItems => "MediaType",
            CatalogKind::Notes => "VaultName",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CatalogKind::MediaItems => "media",
            CatalogKind::Notes => "notes",
        }
    }
}

impl fmt::Display for CatalogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogKind::MediaItems => write!(f, "media items"),
            CatalogKind::Notes => write!(f, "notes"),
        }
    }
}

impl FromStr for CatalogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "media" | "media_items" | "media-items" | "mediaitems" => Ok(CatalogKind::MediaItems),
            "notes" | "note" => Ok(CatalogKind::Notes),
            other => Err(format!("unknown catalog '{other}', expected 'media' or 'notes'")),
        }
    }
}

/// Parameters of a top-K similarity query
///
/// The filter applies to the catalog's grouping column: media type for media
/// items, vault name for notes. An empty filter is the same as no filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityQuery {
    pub embedding: Vec<f32>,
    pub exclude_id: Option<Uuid>,
    pub filter: Option<String>,
    pub limit: usize,
}

impl SimilarityQuery {
    pub fn new(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            exclude_id: None,
            filter: None,
            limit: DEFAULT_LIMIT,
        }
    }

    /// Leave the record with this id out of the results
    pub fn excluding(mut self, id: Uuid) -> Self {
        self.exclude_id = Some(id);
        self
    }

    /// Keep only records whose grouping column equals `value`
    pub fn filtered_by(mut self, value: impl Into<String>) -> Self {
        self.filter = Some(value.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// The filter value, if one should be applied
    pub fn active_filter(&self) -> Option<&str> {
        self.filter.as_deref().filter(|value| !value.is_empty())
    }
}

/// A media item ranked by similarity to a query vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMediaResult {
    pub id: Uuid,
    pub title: String,
    pub media_type: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub status: String,
    pub rating: Option<String>,

    /// `1 - cosine distance`; a relative ranking signal, not a probability
    pub similarity_score: f64,
}

/// A note ranked by similarity to a query vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedNoteResult {
    pub id: Uuid,
    pub title: String,
    pub vault_name: String,
    pub description: Option<String>,
    pub source_url: Option<String>,
    pub tags: Vec<String>,

    /// `1 - cosine distance`; a relative ranking signal, not a probability
    pub similarity_score: f64,
}

impl fmt::Display for RankedMediaResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (score: {:.3})",
            self.title, self.media_type, self.similarity_score
        )
    }
}

impl fmt::Display for RankedNoteResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] (score: {:.3})",
            self.title, self.vault_name, self.similarity_score
        )
    }
}
