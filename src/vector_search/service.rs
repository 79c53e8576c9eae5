//! Similarity search façade
//!
//! `SimilaritySearchService` is the only entry point the rest of the
//! application uses. It builds statements, runs them on the backend, and
//! maps rows into ranked records; no raw SQL leaves this module.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::vector_search::backend::{Row, VectorBackend};
use crate::vector_search::codec;
use crate::vector_search::error::{SearchError, StoreError};
use crate::vector_search::probe::CapabilityProbe;
use crate::vector_search::query::{self, media_columns, note_columns, SimilarityQueryBuilder};
use crate::vector_search::types::{
    CatalogKind, RankedMediaResult, RankedNoteResult, SimilarityQuery,
};

/// Ranked similarity search over the media and note catalogs
///
/// The service keeps no state between calls. Cloning is cheap; use
/// [`with_cancellation`](Self::with_cancellation) to get a copy bound to one
/// request's cancellation signal.
#[derive(Clone)]
pub struct SimilaritySearchService {
    backend: Arc<dyn VectorBackend>,
    cancel: CancellationToken,
}

impl SimilaritySearchService {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            cancel: CancellationToken::new(),
        }
    }

    /// A copy of this service whose store calls observe `cancel`
    pub fn with_cancellation(&self, cancel: CancellationToken) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            cancel,
        }
    }

    pub fn backend(&self) -> &Arc<dyn VectorBackend> {
        &self.backend
    }

    pub fn probe(&self) -> CapabilityProbe {
        CapabilityProbe::new(Arc::clone(&self.backend)).with_cancellation(self.cancel.clone())
    }

    pub async fn is_vector_capability_available(&self) -> bool {
        self.probe().is_vector_capability_available().await
    }

    pub async fn has_any_embeddings(&self, catalog: CatalogKind) -> bool {
        self.probe().has_any_embeddings(catalog).await
    }

    /// Media items nearest to `query.embedding`, most similar first
    pub async fn find_similar_media_items(
        &self,
        query: &SimilarityQuery,
    ) -> Result<Vec<RankedMediaResult>, SearchError> {
        const OPERATION: &str = "find_similar_media_items";
        let catalog = CatalogKind::MediaItems;

        let rows = self.ranked_rows(OPERATION, catalog, query).await?;
        let results = collect_rows(
            OPERATION,
            catalog,
            &rows,
            media_columns::SCORE,
            media_from_row,
        );

        tracing::debug!(
            rows = rows.len(),
            results = results.len(),
            "Similarity search returned {} media items",
            results.len()
        );
        Ok(results)
    }

    /// Notes nearest to `query.embedding`, most similar first
    pub async fn find_similar_notes(
        &self,
        query: &SimilarityQuery,
    ) -> Result<Vec<RankedNoteResult>, SearchError> {
        const OPERATION: &str = "find_similar_notes";
        let catalog = CatalogKind::Notes;

        let rows = self.ranked_rows(OPERATION, catalog, query).await?;
        let results =
            collect_rows(OPERATION, catalog, &rows, note_columns::SCORE, note_from_row);

        tracing::debug!(
            rows = rows.len(),
            results = results.len(),
            "Similarity search returned {} notes",
            results.len()
        );
        Ok(results)
    }

    /// The stored embedding for one record
    ///
    /// Any failure (store error, missing row, no embedding, unreadable
    /// literal) yields `None`.
    pub async fn get_stored_embedding(
        &self,
        catalog: CatalogKind,
        id: Uuid,
    ) -> Option<Vec<f32>> {
        let statement = query::embedding_lookup(catalog, self.backend.dialect(), id);

        let rows = match self.backend.query_rows(&statement, &self.cancel).await {
            Ok(rows) => rows,
            Err(StoreError::Cancelled) => {
                tracing::debug!(catalog = %catalog, %id, "Embedding lookup cancelled");
                return None;
            }
            Err(err) => {
                tracing::error!(
                    catalog = %catalog,
                    %id,
                    error = %err,
                    "Error getting stored embedding"
                );
                return None;
            }
        };

        let literal = match rows.first().map(|row| row.optional_text(0)) {
            Some(Ok(Some(literal))) => literal,
            Some(Ok(None)) | None => {
                tracing::debug!(catalog = %catalog, %id, "Record not found or has no embedding");
                return None;
            }
            Some(Err(err)) => {
                tracing::warn!(
                    catalog = %catalog,
                    %id,
                    error = %err,
                    "Stored embedding has unexpected type"
                );
                return None;
            }
        };

        match codec::try_decode(&literal) {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                tracing::warn!(
                    catalog = %catalog,
                    %id,
                    error = %err,
                    "Stored embedding is unreadable"
                );
                None
            }
        }
    }

    /// Write one record's embedding; `Ok(false)` when no such record exists
    pub async fn store_embedding(
        &self,
        catalog: CatalogKind,
        id: Uuid,
        embedding: &[f32],
    ) -> Result<bool, SearchError> {
        const OPERATION: &str = "store_embedding";

        if embedding.is_empty() {
            return Err(SearchError::InvalidQuery("embedding is empty".to_string()));
        }

        let statement = query::embedding_update(catalog, self.backend.dialect(), id, embedding)?;
        let changed = self
            .backend
            .execute(&statement, &self.cancel)
            .await
            .map_err(|err| log_failure(OPERATION, catalog, err))?;

        tracing::debug!(
            catalog = %catalog,
            %id,
            dimensions = embedding.len(),
            "Stored embedding"
        );
        Ok(changed > 0)
    }

    /// Remove one record's embedding; `Ok(false)` when no such record exists
    pub async fn clear_embedding(
        &self,
        catalog: CatalogKind,
        id: Uuid,
    ) -> Result<bool, SearchError> {
        const OPERATION: &str = "clear_embedding";

        let statement = query::embedding_clear(catalog, self.backend.dialect(), id);
        let changed = self
            .backend
            .execute(&statement, &self.cancel)
            .await
            .map_err(|err| log_failure(OPERATION, catalog, err))?;

        Ok(changed > 0)
    }

    async fn ranked_rows(
        &self,
        operation: &'static str,
        catalog: CatalogKind,
        query: &SimilarityQuery,
    ) -> Result<Vec<Row>, SearchError> {
        if query.embedding.is_empty() {
            return Err(SearchError::InvalidQuery("query embedding is empty".to_string()));
        }

        let statement =
            SimilarityQueryBuilder::new(catalog, self.backend.dialect(), &query.embedding)
                .exclude_id(query.exclude_id)
                .filter(query.active_filter())
                .limit(query.limit)
                .build()?;

        self.backend
            .query_rows(&statement, &self.cancel)
            .await
            .map_err(|err| log_failure(operation, catalog, err))
    }
}

fn log_failure(operation: &'static str, catalog: CatalogKind, err: StoreError) -> SearchError {
    let rows_read = err.rows_read();
    let err = SearchError::from_store(operation, catalog, err);
    if err.is_cancelled() {
        tracing::debug!(operation, catalog = %catalog, "Request cancelled");
    } else {
        tracing::error!(
            operation,
            catalog = %catalog,
            rows_read,
            error = %err,
            "Error executing similarity search"
        );
    }
    err
}

/// Map rows, skipping any row that cannot be turned into a result
///
/// A NULL score means the store could not read that row's embedding.
fn collect_rows<T>(
    operation: &'static str,
    catalog: CatalogKind,
    rows: &[Row],
    score_index: usize,
    map: fn(&Row) -> Result<T, StoreError>,
) -> Vec<T> {
    let mut results = Vec::with_capacity(rows.len());

    for (position, row) in rows.iter().enumerate() {
        let id = row.optional_text(0).ok().flatten().unwrap_or_default();

        if row.is_null(score_index) {
            tracing::warn!(
                operation,
                catalog = %catalog,
                position,
                id = %id,
                "Skipping row with unreadable stored embedding"
            );
            continue;
        }

        match map(row) {
            Ok(result) => results.push(result),
            Err(err) => {
                tracing::warn!(
                    operation,
                    catalog = %catalog,
                    position,
                    id = %id,
                    error = %err,
                    "Skipping malformed row"
                );
            }
        }
    }

    results
}

fn parse_id(row: &Row, index: usize) -> Result<Uuid, StoreError> {
    let text = row.text(index)?;
    Uuid::parse_str(&text).map_err(|e| StoreError::Row(format!("invalid id '{text}': {e}")))
}

fn score(row: &Row, index: usize) -> Result<f64, StoreError> {
    row.optional_f64(index)?
        .ok_or_else(|| StoreError::Row("similarity score is NULL".to_string()))
}

fn media_from_row(row: &Row) -> Result<RankedMediaResult, StoreError> {
    Ok(RankedMediaResult {
        id: parse_id(row, media_columns::ID)?,
        title: row.text(media_columns::TITLE)?,
        media_type: row.text(media_columns::MEDIA_TYPE)?,
        description: row.optional_text(media_columns::DESCRIPTION)?,
        thumbnail: row.optional_text(media_columns::THUMBNAIL)?,
        status: row.text(media_columns::STATUS)?,
        rating: row.optional_text(media_columns::RATING)?,
        similarity_score: score(row, media_columns::SCORE)?,
    })
}

fn note_from_row(row: &Row) -> Result<RankedNoteResult, StoreError> {
    Ok(RankedNoteResult {
        id: parse_id(row, note_columns::ID)?,
        title: row.text(note_columns::TITLE)?,
        vault_name: row.text(note_columns::VAULT_NAME)?,
        description: row.optional_text(note_columns::DESCRIPTION)?,
        source_url: row.optional_text(note_columns::SOURCE_URL)?,
        tags: row.string_list(note_columns::TAGS)?,
        similarity_score: score(row, note_columns::SCORE)?,
    })
}
