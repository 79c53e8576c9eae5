//! Seeded recommendation flows
//!
//! Builds "more like this" queries from embeddings already in the store:
//! similar items for one record, cross-catalog relations between notes and
//! media, and recommendations from a set of liked records.

use ndarray::{Array1, ArrayView1};
use std::collections::HashSet;
use uuid::Uuid;

use crate::vector_search::error::SearchError;
use crate::vector_search::service::SimilaritySearchService;
use crate::vector_search::types::{
    CatalogKind, RankedMediaResult, RankedNoteResult, SimilarityQuery,
};

/// Recommendation helpers layered on a [`SimilaritySearchService`]
///
/// A seed with no stored embedding produces an empty list. Search failures
/// are returned as-is.
#[derive(Clone)]
pub struct Recommender {
    search: SimilaritySearchService,
}

impl Recommender {
    pub fn new(search: SimilaritySearchService) -> Self {
        Self { search }
    }

    pub fn search(&self) -> &SimilaritySearchService {
        &self.search
    }

    /// Media items similar to an existing media item, excluding the item
    pub async fn similar_to_media_item(
        &self,
        media_item_id: Uuid,
        limit: usize,
        media_type_filter: Option<&str>,
    ) -> Result<Vec<RankedMediaResult>, SearchError> {
        let Some(embedding) = self.seed(CatalogKind::MediaItems, media_item_id).await else {
            return Ok(Vec::new());
        };

        let mut query = SimilarityQuery::new(embedding).excluding(media_item_id).with_limit(limit);
        if let Some(filter) = media_type_filter {
            query = query.filtered_by(filter);
        }

        let results = self.search.find_similar_media_items(&query).await?;
        tracing::debug!(id = %media_item_id, "Found {} similar media items", results.len());
        Ok(results)
    }

    /// Notes similar to an existing note, excluding the note
    pub async fn similar_to_note(
        &self,
        note_id: Uuid,
        limit: usize,
        vault_filter: Option<&str>,
    ) -> Result<Vec<RankedNoteResult>, SearchError> {
        let Some(embedding) = self.seed(CatalogKind::Notes, note_id).await else {
            return Ok(Vec::new());
        };

        let mut query = SimilarityQuery::new(embedding).excluding(note_id).with_limit(limit);
        if let Some(filter) = vault_filter {
            query = query.filtered_by(filter);
        }

        let results = self.search.find_similar_notes(&query).await?;
        tracing::debug!(id = %note_id, "Found {} similar notes", results.len());
        Ok(results)
    }

    /// Media items near a note's embedding
    pub async fn media_related_to_note(
        &self,
        note_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RankedMediaResult>, SearchError> {
        let Some(embedding) = self.seed(CatalogKind::Notes, note_id).await else {
            return Ok(Vec::new());
        };

        let query = SimilarityQuery::new(embedding).with_limit(limit);
        self.search.find_similar_media_items(&query).await
    }

    /// Notes near a media item's embedding
    pub async fn notes_related_to_media(
        &self,
        media_item_id: Uuid,
        limit: usize,
    ) -> Result<Vec<RankedNoteResult>, SearchError> {
        let Some(embedding) = self.seed(CatalogKind::MediaItems, media_item_id).await else {
            return Ok(Vec::new());
        };

        let query = SimilarityQuery::new(embedding).with_limit(limit);
        self.search.find_similar_notes(&query).await
    }

    /// Media items near the centroid of several liked media items
    ///
    /// The seeds themselves never appear in the output. When `only_status` is
    /// given, results with a different lifecycle status are dropped.
    pub async fn recommend_from_seeds(
        &self,
        seed_ids: &[Uuid],
        limit: usize,
        only_status: Option<&str>,
    ) -> Result<Vec<RankedMediaResult>, SearchError> {
        let mut embeddings = Vec::with_capacity(seed_ids.len());
        for id in seed_ids {
            if let Some(embedding) = self
                .search
                .get_stored_embedding(CatalogKind::MediaItems, *id)
                .await
            {
                embeddings.push(embedding);
            }
        }

        let Some(centroid) = average_embedding(&embeddings) else {
            tracing::debug!(
                seeds = seed_ids.len(),
                "No usable seed embeddings for recommendations"
            );
            return Ok(Vec::new());
        };

        let seeds: HashSet<Uuid> = seed_ids.iter().copied().collect();
        let query = SimilarityQuery::new(centroid).with_limit(limit + seeds.len());
        let candidates = self.search.find_similar_media_items(&query).await?;

        let results: Vec<RankedMediaResult> = candidates
            .into_iter()
            .filter(|item| !seeds.contains(&item.id))
            .filter(|item| only_status.is_none_or(|status| item.status == status))
            .take(limit)
            .collect();

        tracing::info!(
            seeds = embeddings.len(),
            "Generated {} recommendations from seed items",
            results.len()
        );
        Ok(results)
    }

    async fn seed(&self, catalog: CatalogKind, id: Uuid) -> Option<Vec<f32>> {
        let embedding = self.search.get_stored_embedding(catalog, id).await;
        if embedding.is_none() {
            tracing::warn!(catalog = %catalog, %id, "Seed record not found or has no embedding");
        }
        embedding
    }
}

/// Component-wise mean of equally sized embeddings
///
/// Returns `None` for no input, empty vectors, or vectors of differing length.
pub fn average_embedding(embeddings: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = embeddings.first()?;
    if first.is_empty() || embeddings.iter().any(|e| e.len() != first.len()) {
        return None;
    }

    let mut sum: Array1<f64> = Array1::zeros(first.len());
    for embedding in embeddings {
        sum += &ArrayView1::from(embedding.as_slice()).mapv(f64::from);
    }

    let count = embeddings.len() as f64;
    Some(sum.iter().map(|total| (total / count) as f32).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_average_embedding() {
        let average = average_embedding(&[vec![1.0, 0.0, 2.0], vec![0.0, 1.0, 4.0]]).unwrap();
        assert_eq!(average, vec![0.5, 0.5, 3.0]);
    }

    #[test]
    fn test_average_embedding_rejects_unusable_input() {
        assert_eq!(average_embedding(&[]), None);
        assert_eq!(average_embedding(&[vec![]]), None);
        assert_eq!(average_embedding(&[vec![1.0], vec![1.0, 2.0]]), None);
    }
}
