//! Vector search module for catalog similarity search
//!
//! Embeddings live in a nullable vector column next to each catalog record.
//! This module encodes them for the store, composes ranked similarity
//! queries, probes whether the store supports vectors at all, and maps the
//! ranked rows back into result records.

pub mod backend;
pub mod codec;
pub mod dialect;
pub mod error;
pub mod probe;
pub mod query;
pub mod recommend;
pub mod service;

mod types;

pub use backend::{Row, Value, VectorBackend};
#[cfg(feature = "sqlite")]
pub use backend::SqliteBackend;
#[cfg(feature = "postgres")]
pub use backend::PostgresBackend;
pub use dialect::Dialect;
pub use error::{DecodeError, EncodingError, SearchError, StoreError};
pub use probe::CapabilityProbe;
pub use query::{SimilarityQueryBuilder, SqlParam, Statement};
pub use recommend::{average_embedding, Recommender};
pub use service::SimilaritySearchService;
pub use types::{
    CatalogKind, RankedMediaResult, RankedNoteResult, SimilarityQuery, DEFAULT_LIMIT,
    EMBEDDING_COLUMN,
};
