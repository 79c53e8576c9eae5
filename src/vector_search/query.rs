//! Parameterized statement construction
//!
//! Every statement the search layer sends to a store is built here. The
//! ranked similarity query is assembled from a list of predicate fragments,
//! each of which owns its bound value, so optional filters compose without
//! any value reaching the SQL text.

use uuid::Uuid;

use crate::vector_search::codec;
use crate::vector_search::dialect::{quote, Dialect};
use crate::vector_search::error::EncodingError;
use crate::vector_search::types::{CatalogKind, DEFAULT_LIMIT, EMBEDDING_COLUMN};

/// A value bound to a statement placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Integer(i64),
    Uuid(Uuid),
}

/// SQL text plus its positional parameters (`params[0]` binds to index 1)
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Column positions in the media projection
pub(crate) mod media_columns {
    pub const ID: usize = 0;
    pub const TITLE: usize = 1;
    pub const MEDIA_TYPE: usize = 2;
    pub const DESCRIPTION: usize = 3;
    pub const THUMBNAIL: usize = 4;
    pub const STATUS: usize = 5;
    pub const RATING: usize = 6;
    pub const SCORE: usize = 7;
}

/// Column positions in the note projection
pub(crate) mod note_columns {
    pub const ID: usize = 0;
    pub const TITLE: usize = 1;
    pub const VAULT_NAME: usize = 2;
    pub const DESCRIPTION: usize = 3;
    pub const SOURCE_URL: usize = 4;
    pub const TAGS: usize = 5;
    pub const SCORE: usize = 6;
}

fn projection(catalog: CatalogKind) -> String {
    let columns: &[&str] = match catalog {
        CatalogKind::MediaItems => &[
            "\"Id\"",
            "\"Title\"",
            "\"MediaType\"",
            "\"Description\"",
            "\"Thumbnail\"",
            "\"Status\"",
            "CAST(\"Rating\" AS TEXT) AS \"Rating\"",
        ],
        CatalogKind::Notes => &[
            "\"Id\"",
            "\"Title\"",
            "\"VaultName\"",
            "COALESCE(\"AiDescription\", \"Description\") AS \"Description\"",
            "\"SourceUrl\"",
            "\"Tags\"",
        ],
    };
    columns.join(", ")
}

/// One conjunct of the `WHERE` clause
#[derive(Debug, Clone, PartialEq)]
enum Predicate {
    EmbeddingPresent,
    ExcludeId(Uuid),
    Equals { column: &'static str, value: String },
}

impl Predicate {
    fn render(&self, dialect: Dialect, params: &mut Vec<SqlParam>) -> String {
        match self {
            Predicate::EmbeddingPresent => format!("{} IS NOT NULL", quote(EMBEDDING_COLUMN)),
            Predicate::ExcludeId(id) => {
                params.push(SqlParam::Uuid(*id));
                format!("\"Id\" <> {}", dialect.placeholder(params.len()))
            }
            Predicate::Equals { column, value } => {
                params.push(SqlParam::Text(value.clone()));
                format!("{} = {}", quote(column), dialect.placeholder(params.len()))
            }
        }
    }
}

/// Builds the ranked top-K similarity query for one catalog
#[derive(Debug, Clone)]
pub struct SimilarityQueryBuilder<'a> {
    catalog: CatalogKind,
    dialect: Dialect,
    embedding: &'a [f32],
    exclude_id: Option<Uuid>,
    filter: Option<String>,
    limit: usize,
}

impl<'a> SimilarityQueryBuilder<'a> {
    pub fn new(catalog: CatalogKind, dialect: Dialect, embedding: &'a [f32]) -> Self {
        Self {
            catalog,
            dialect,
            embedding,
            exclude_id: None,
            filter: None,
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn exclude_id(mut self, id: Option<Uuid>) -> Self {
        self.exclude_id = id;
        self
    }

    /// Equality filter on the catalog's grouping column; empty means none
    pub fn filter(mut self, value: Option<&str>) -> Self {
        self.filter = value.filter(|v| !v.is_empty()).map(str::to_string);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    fn predicates(&self) -> Vec<Predicate> {
        let mut predicates = vec![Predicate::EmbeddingPresent];
        if let Some(id) = self.exclude_id {
            predicates.push(Predicate::ExcludeId(id));
        }
        if let Some(value) = &self.filter {
            predicates.push(Predicate::Equals {
                column: self.catalog.filter_column(),
                value: value.clone(),
            });
        }
        predicates
    }

    pub fn build(&self) -> Result<Statement, EncodingError> {
        let literal = codec::encode(self.embedding)?;
        let mut params = vec![SqlParam::Text(literal)];
        let vector = self.dialect.placeholder(1);
        let distance = self.dialect.cosine_distance(EMBEDDING_COLUMN, &vector);

        let conditions: Vec<String> = self
            .predicates()
            .iter()
            .map(|predicate| predicate.render(self.dialect, &mut params))
            .collect();

        params.push(SqlParam::Integer(self.limit as i64));
        let limit = self.dialect.placeholder(params.len());

        let sql = format!(
            "SELECT {}, (1 - ({distance})) AS similarity_score FROM {} WHERE {} {} LIMIT {limit}",
            projection(self.catalog),
            quote(self.catalog.table()),
            conditions.join(" AND "),
            self.dialect.order_by_distance(&distance),
        );

        Ok(Statement::new(sql, params))
    }
}

/// Read one record's embedding in literal form
pub fn embedding_lookup(catalog: CatalogKind, dialect: Dialect, id: Uuid) -> Statement {
    let sql = format!(
        "SELECT {} FROM {} WHERE \"Id\" = {} AND {} IS NOT NULL",
        dialect.vector_as_text(EMBEDDING_COLUMN),
        quote(catalog.table()),
        dialect.placeholder(1),
        quote(EMBEDDING_COLUMN),
    );
    Statement::new(sql, vec![SqlParam::Uuid(id)])
}

/// Replace one record's embedding
pub fn embedding_update(
    catalog: CatalogKind,
    dialect: Dialect,
    id: Uuid,
    embedding: &[f32],
) -> Result<Statement, EncodingError> {
    let literal = codec::encode(embedding)?;
    let sql = format!(
        "UPDATE {} SET {} = {} WHERE \"Id\" = {}",
        quote(catalog.table()),
        quote(EMBEDDING_COLUMN),
        dialect.vector_value(&dialect.placeholder(1)),
        dialect.placeholder(2),
    );
    Ok(Statement::new(sql, vec![SqlParam::Text(literal), SqlParam::Uuid(id)]))
}

/// Remove one record's embedding
pub fn embedding_clear(catalog: CatalogKind, dialect: Dialect, id: Uuid) -> Statement {
    let sql = format!(
        "UPDATE {} SET {} = NULL WHERE \"Id\" = {}",
        quote(catalog.table()),
        quote(EMBEDDING_COLUMN),
        dialect.placeholder(1),
    );
    Statement::new(sql, vec![SqlParam::Uuid(id)])
}

/// Existence check for at least one stored embedding
pub fn embeddings_exist(catalog: CatalogKind) -> Statement {
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} IS NOT NULL LIMIT 1)",
        quote(catalog.table()),
        quote(EMBEDDING_COLUMN),
    );
    Statement::new(sql, Vec::new())
}

/// Metadata query for the store's vector capability
pub fn capability(dialect: Dialect) -> Statement {
    Statement::new(dialect.capability_query(), Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const QUERY: [f32; 3] = [1.0, 0.0, 0.5];

    fn builder(catalog: CatalogKind, dialect: Dialect) -> SimilarityQueryBuilder<'static> {
        SimilarityQueryBuilder::new(catalog, dialect, &QUERY)
    }

    #[test]
    fn test_base_query_has_only_embedding_restriction() {
        let statement = builder(CatalogKind::MediaItems, Dialect::Postgres).build().unwrap();

        assert_eq!(
            statement.sql,
            "SELECT \"Id\", \"Title\", \"MediaType\", \"Description\", \"Thumbnail\", \"Status\", \
             CAST(\"Rating\" AS TEXT) AS \"Rating\", \
             (1 - (\"Embedding\" <=> $1::vector)) AS similarity_score FROM \"MediaItems\" \
             WHERE \"Embedding\" IS NOT NULL ORDER BY \"Embedding\" <=> $1::vector LIMIT $2"
        );
        assert_eq!(
            statement.params,
            vec![SqlParam::Text("[1,0,0.5]".to_string()), SqlParam::Integer(10)]
        );
    }

    #[test]
    fn test_exclude_and_filter_add_two_conditions() {
        let id = Uuid::new_v4();
        let statement = builder(CatalogKind::MediaItems, Dialect::Postgres)
            .exclude_id(Some(id))
            .filter(Some("Book"))
            .limit(2)
            .build()
            .unwrap();

        assert!(statement.sql.contains(
            "WHERE \"Embedding\" IS NOT NULL AND \"Id\" <> $2 AND \"MediaType\" = $3 ORDER BY"
        ));
        assert!(statement.sql.ends_with("LIMIT $4"));
        assert_eq!(
            statement.params,
            vec![
                SqlParam::Text("[1,0,0.5]".to_string()),
                SqlParam::Uuid(id),
                SqlParam::Text("Book".to_string()),
                SqlParam::Integer(2),
            ]
        );
    }

    #[test]
    fn test_filter_without_exclusion() {
        let statement = builder(CatalogKind::Notes, Dialect::Sqlite)
            .filter(Some("Research"))
            .build()
            .unwrap();

        assert!(statement
            .sql
            .contains("WHERE \"Embedding\" IS NOT NULL AND \"VaultName\" = ?2 ORDER BY"));
        assert!(!statement.sql.contains("\"Id\" <>"));
        assert_eq!(statement.params.len(), 3);
    }

    #[test]
    fn test_empty_filter_emits_no_clause() {
        let statement = builder(CatalogKind::Notes, Dialect::Sqlite)
            .filter(Some(""))
            .build()
            .unwrap();

        assert!(!statement.sql.contains("\"VaultName\" ="));
        assert_eq!(statement.params.len(), 2);
    }

    #[test]
    fn test_untrusted_filter_is_bound_not_interpolated() {
        let hostile = "Book' OR '1'='1";
        let statement = builder(CatalogKind::MediaItems, Dialect::Sqlite)
            .filter(Some(hostile))
            .build()
            .unwrap();

        assert!(!statement.sql.contains(hostile));
        assert!(statement.params.contains(&SqlParam::Text(hostile.to_string())));
    }

    #[test]
    fn test_notes_projection_prefers_enriched_description() {
        let statement = builder(CatalogKind::Notes, Dialect::Sqlite).build().unwrap();

        assert!(statement.sql.starts_with(
            "SELECT \"Id\", \"Title\", \"VaultName\", \
             COALESCE(\"AiDescription\", \"Description\") AS \"Description\", \
             \"SourceUrl\", \"Tags\", "
        ));
        assert!(statement
            .sql
            .contains("ORDER BY vec_cosine_distance(\"Embedding\", ?1) ASC NULLS LAST LIMIT ?2"));
    }

    #[test]
    fn test_ordering_uses_distance_not_score() {
        let statement = builder(CatalogKind::MediaItems, Dialect::Postgres).build().unwrap();
        assert!(!statement.sql.contains("ORDER BY similarity_score"));
    }

    #[test]
    fn test_non_finite_embedding_fails_build() {
        let bad = [1.0, f32::INFINITY];
        let result =
            SimilarityQueryBuilder::new(CatalogKind::MediaItems, Dialect::Postgres, &bad).build();
        assert!(matches!(result, Err(EncodingError::NonFinite { index: 1, .. })));
    }

    #[test]
    fn test_embedding_statements() {
        let id = Uuid::new_v4();

        let lookup = embedding_lookup(CatalogKind::Notes, Dialect::Postgres, id);
        assert_eq!(
            lookup.sql,
            "SELECT \"Embedding\"::text FROM \"Notes\" \
             WHERE \"Id\" = $1 AND \"Embedding\" IS NOT NULL"
        );
        assert_eq!(lookup.params, vec![SqlParam::Uuid(id)]);

        let update =
            embedding_update(CatalogKind::MediaItems, Dialect::Postgres, id, &[0.25]).unwrap();
        assert_eq!(
            update.sql,
            "UPDATE \"MediaItems\" SET \"Embedding\" = $1::vector WHERE \"Id\" = $2"
        );
        assert_eq!(update.params[0], SqlParam::Text("[0.25]".to_string()));

        let exists = embeddings_exist(CatalogKind::MediaItems);
        assert_eq!(
            exists.sql,
            "SELECT EXISTS(SELECT 1 FROM \"MediaItems\" WHERE \"Embedding\" IS NOT NULL LIMIT 1)"
        );
    }
}
