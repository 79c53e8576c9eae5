//! Seeded recommendation flows on the SQLite backend

#![cfg(feature = "sqlite")]

mod common;

use anyhow::Result;
use catalog_similarity::vector_search::{CatalogKind, Recommender, SimilaritySearchService};
use common::{create_test_backend, insert_media, insert_note, MediaFixture, NoteFixture};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use uuid::Uuid;

async fn recommender_with(media: &[&MediaFixture], notes: &[&NoteFixture]) -> Result<Recommender> {
    let backend = create_test_backend().await?;
    for item in media {
        insert_media(&backend, item).await?;
    }
    for note in notes {
        insert_note(&backend, note).await?;
    }
    Ok(Recommender::new(SimilaritySearchService::new(backend)))
}

#[tokio::test]
async fn test_similar_to_media_item_excludes_seed() -> Result<()> {
    let seed = MediaFixture::new("Dune", &[1.0, 0.0, 0.0]);
    let sequel = MediaFixture::new("Dune Messiah", &[0.95, 0.05, 0.0]);
    let film = MediaFixture::new("Dune (film)", &[0.9, 0.1, 0.0]).media_type("Movie");
    let unrelated = MediaFixture::new("Cookbook", &[0.0, 0.0, 1.0]);
    let recommender = recommender_with(&[&seed, &sequel, &film, &unrelated], &[]).await?;

    let results = recommender.similar_to_media_item(seed.id, 2, None).await?;
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Dune Messiah", "Dune (film)"]);

    let movies = recommender.similar_to_media_item(seed.id, 5, Some("Movie")).await?;
    assert_eq!(movies.len(), 1);
    assert_eq!(movies[0].id, film.id);
    Ok(())
}

#[tokio::test]
async fn test_missing_seed_yields_empty_list() -> Result<()> {
    let bare = MediaFixture::new("Bare", &[0.0]).without_embedding();
    let other = MediaFixture::new("Other", &[1.0, 0.0]);
    let recommender = recommender_with(&[&bare, &other], &[]).await?;

    assert!(recommender.similar_to_media_item(bare.id, 5, None).await?.is_empty());
    assert!(recommender.similar_to_media_item(Uuid::new_v4(), 5, None).await?.is_empty());
    assert!(recommender.notes_related_to_media(bare.id, 5).await?.is_empty());
    assert!(recommender.similar_to_note(Uuid::new_v4(), 5, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_cross_catalog_relations() -> Result<()> {
    let book = MediaFixture::new("Rust in Action", &[0.0, 1.0]);
    let album = MediaFixture::new("Kind of Blue", &[1.0, 0.0]).media_type("Music");
    let note = NoteFixture::new("Ownership notes", &[0.1, 0.9]).tags(&["rust"]);
    let jazz = NoteFixture::new("Modal jazz", &[0.9, 0.1]).vault("Music");
    let recommender = recommender_with(&[&book, &album], &[&note, &jazz]).await?;

    let media = recommender.media_related_to_note(note.id, 1).await?;
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].id, book.id);

    let notes = recommender.notes_related_to_media(album.id, 2).await?;
    assert_eq!(notes[0].id, jazz.id);
    assert_eq!(notes.len(), 2);

    let similar_notes = recommender.similar_to_note(note.id, 5, Some("Music")).await?;
    assert_eq!(similar_notes.len(), 1);
    assert_eq!(similar_notes[0].id, jazz.id);
    Ok(())
}

#[tokio::test]
async fn test_recommend_from_seeds() -> Result<()> {
    let liked_a = MediaFixture::new("Liked A", &[1.0, 0.0, 0.0]);
    let liked_b = MediaFixture::new("Liked B", &[0.0, 1.0, 0.0]);
    let planned = MediaFixture::new("Between", &[0.7, 0.7, 0.0]).status("Planned");
    let done = MediaFixture::new("Leaning A", &[0.9, 0.3, 0.0]).status("Completed");
    let far = MediaFixture::new("Far", &[0.0, 0.0, 1.0]).status("Planned");
    let recommender = recommender_with(&[&liked_a, &liked_b, &planned, &done, &far], &[]).await?;

    let results = recommender.recommend_from_seeds(&[liked_a.id, liked_b.id], 2, None).await?;
    let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["Between", "Leaning A"]);

    let planned_only = recommender
        .recommend_from_seeds(&[liked_a.id, liked_b.id], 5, Some("Planned"))
        .await?;
    assert!(planned_only.iter().all(|r| r.status == "Planned"));
    assert_eq!(planned_only.len(), 2);
    assert_eq!(planned_only[0].id, planned.id);
    Ok(())
}

#[tokio::test]
async fn test_recommend_without_usable_seeds() -> Result<()> {
    let item = MediaFixture::new("Item", &[1.0, 0.0]);
    let recommender = recommender_with(&[&item], &[]).await?;

    assert!(recommender.recommend_from_seeds(&[], 5, None).await?.is_empty());
    assert!(recommender.recommend_from_seeds(&[Uuid::new_v4()], 5, None).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_recommender_shares_service() -> Result<()> {
    let backend = create_test_backend().await?;
    let service = SimilaritySearchService::new(backend.clone());
    let recommender = Recommender::new(service.clone());

    let item = MediaFixture::new("Item", &[0.0]).without_embedding();
    insert_media(&backend, &item).await?;
    assert!(service.store_embedding(CatalogKind::MediaItems, item.id, &[0.5, 0.5]).await?);

    let other = MediaFixture::new("Other", &[0.4, 0.6]);
    insert_media(&backend, &other).await?;

    let results = recommender.similar_to_media_item(item.id, 5, None).await?;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, other.id);
    Ok(())
}
