//! Shared fixtures for search integration tests

#![allow(dead_code)]

use anyhow::Result;
use catalog_similarity::vector_search::{codec, SqlParam, SqliteBackend, Statement, VectorBackend};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A media item row to seed into the store
pub struct MediaFixture {
    pub id: Uuid,
    pub title: &'static str,
    pub media_type: &'static str,
    pub status: &'static str,
    /// Stored embedding literal; `None` leaves the column NULL
    pub embedding: Option<String>,
}

impl MediaFixture {
    pub fn new(title: &'static str, embedding: &[f32]) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            media_type: "Book",
            status: "Completed",
            embedding: Some(literal(embedding)),
        }
    }

    pub fn media_type(mut self, media_type: &'static str) -> Self {
        self.media_type = media_type;
        self
    }

    pub fn status(mut self, status: &'static str) -> Self {
        self.status = status;
        self
    }

    pub fn without_embedding(mut self) -> Self {
        self.embedding = None;
        self
    }

    /// Store a raw literal, readable or not
    pub fn raw_embedding(mut self, raw: &str) -> Self {
        self.embedding = Some(raw.to_string());
        self
    }
}

/// A note row to seed into the store
pub struct NoteFixture {
    pub id: Uuid,
    pub title: &'static str,
    pub vault_name: &'static str,
    pub description: Option<&'static str>,
    pub ai_description: Option<&'static str>,
    pub tags: Vec<&'static str>,
    pub embedding: Option<String>,
}

impl NoteFixture {
    pub fn new(title: &'static str, embedding: &[f32]) -> Self {
        Self {
            id: Uuid::new_v4(),
            title,
            vault_name: "Personal",
            description: None,
            ai_description: None,
            tags: Vec::new(),
            embedding: Some(literal(embedding)),
        }
    }

    pub fn vault(mut self, vault_name: &'static str) -> Self {
        self.vault_name = vault_name;
        self
    }

    pub fn descriptions(
        mut self,
        description: Option<&'static str>,
        ai_description: Option<&'static str>,
    ) -> Self {
        self.description = description;
        self.ai_description = ai_description;
        self
    }

    pub fn tags(mut self, tags: &[&'static str]) -> Self {
        self.tags = tags.to_vec();
        self
    }
}

pub fn literal(embedding: &[f32]) -> String {
    codec::encode(embedding).expect("fixture embeddings are finite")
}

/// A fresh in-memory store with the catalog schema
pub async fn create_test_backend() -> Result<Arc<SqliteBackend>> {
    let backend = SqliteBackend::open_in_memory()?;
    backend.create_schema().await?;
    Ok(Arc::new(backend))
}

pub async fn insert_media(backend: &SqliteBackend, item: &MediaFixture) -> Result<()> {
    let statement = Statement::new(
        r#"INSERT INTO "MediaItems"
               ("Id", "Title", "MediaType", "Description", "Thumbnail", "Status",
                "Rating", "Embedding")
           VALUES (?1, ?2, ?3, ?4, NULL, ?5, NULL, NULLIF(?6, ''))"#,
        vec![
            SqlParam::Uuid(item.id),
            SqlParam::Text(item.title.to_string()),
            SqlParam::Text(item.media_type.to_string()),
            SqlParam::Text(format!("About {}", item.title)),
            SqlParam::Text(item.status.to_string()),
            nullable(item.embedding.clone()),
        ],
    );
    backend.execute(&statement, &CancellationToken::new()).await?;
    Ok(())
}

pub async fn insert_note(backend: &SqliteBackend, note: &NoteFixture) -> Result<()> {
    let statement = Statement::new(
        r#"INSERT INTO "Notes"
               ("Id", "Title", "VaultName", "Description", "AiDescription", "SourceUrl",
                "Tags", "Embedding")
           VALUES (?1, ?2, ?3, NULLIF(?4, ''), NULLIF(?5, ''), NULL, ?6, NULLIF(?7, ''))"#,
        vec![
            SqlParam::Uuid(note.id),
            SqlParam::Text(note.title.to_string()),
            SqlParam::Text(note.vault_name.to_string()),
            nullable(note.description.map(str::to_string)),
            nullable(note.ai_description.map(str::to_string)),
            SqlParam::Text(serde_json::to_string(&note.tags)?),
            nullable(note.embedding.clone()),
        ],
    );
    backend.execute(&statement, &CancellationToken::new()).await?;
    Ok(())
}

/// Absent values bind as '' and the insert folds them to NULL with `NULLIF`
fn nullable(value: Option<String>) -> SqlParam {
    SqlParam::Text(value.unwrap_or_default())
}

/// A read that keeps the connection busy for several seconds unless interrupted
pub fn slow_statement() -> Statement {
    Statement::new(
        "WITH RECURSIVE counter(n) AS \
         (SELECT 1 UNION ALL SELECT n + 1 FROM counter WHERE n < 200000000) \
         SELECT count(*) FROM counter",
        Vec::new(),
    )
}
