//! PostgreSQL + pgvector implementation of the vector backend
//!
//! The embedding column uses the pgvector `vector` type; statements cast the
//! bound literal with `::vector` and rank with the `<=>` cosine distance
//! operator so an HNSW or IVFFlat index on the column can serve the ordering.

use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::{Column, PgPool, Postgres, Row as _, TypeInfo};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::vector_search::backend::{Row, Value, VectorBackend};
use crate::vector_search::dialect::Dialect;
use crate::vector_search::error::StoreError;
use crate::vector_search::query::{SqlParam, Statement};

/// pgvector-backed store using a sqlx connection pool
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        tracing::info!(
            "Connected to PostgreSQL vector store (max {} connections)",
            max_connections
        );
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_params<'q>(statement: &'q Statement) -> Query<'q, Postgres, PgArguments> {
    let mut query = sqlx::query(&statement.sql);
    for param in &statement.params {
        query = match param {
            SqlParam::Text(text) => query.bind(text.as_str()),
            SqlParam::Integer(value) => query.bind(*value),
            SqlParam::Uuid(id) => query.bind(*id),
        };
    }
    query
}

fn convert_row(row: &PgRow) -> Result<Row, StoreError> {
    let mut values = Vec::with_capacity(row.columns().len());

    for (index, column) in row.columns().iter().enumerate() {
        let value = match column.type_info().name() {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
            "INT2" => row.try_get::<Option<i16>, _>(index)?.map(|v| Value::Integer(v.into())),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.map(|v| Value::Integer(v.into())),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::Integer),
            "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.map(|v| Value::Real(v.into())),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::Real),
            "UUID" => row
                .try_get::<Option<Uuid>, _>(index)?
                .map(|id| Value::Text(id.to_string())),
            "TEXT[]" | "VARCHAR[]" => row
                .try_get::<Option<Vec<String>>, _>(index)?
                .map(Value::TextArray),
            "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
                row.try_get::<Option<String>, _>(index)?.map(Value::Text)
            }
            other => {
                return Err(StoreError::Row(format!(
                    "column {} has unsupported type {other}",
                    column.name()
                )))
            }
        };
        values.push(value.unwrap_or(Value::Null));
    }

    Ok(Row::new(values))
}

#[async_trait]
impl VectorBackend for PostgresBackend {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    async fn query_rows(
        &self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<Vec<Row>, StoreError> {
        let work = async {
            let mut conn = self.pool.acquire().await?;
            let mut stream = bind_params(statement).fetch(&mut *conn);

            let mut collected = Vec::new();
            while let Some(row) = stream
                .try_next()
                .await
                .map_err(|e| StoreError::from(e).after_rows(collected.len()))?
            {
                let row = convert_row(&row).map_err(|e| e.after_rows(collected.len()))?;
                collected.push(row);
            }
            Ok::<_, StoreError>(collected)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            result = work => result,
        }
    }

    async fn execute(
        &self,
        statement: &Statement,
        cancel: &CancellationToken,
    ) -> Result<u64, StoreError> {
        let work = async {
            let mut conn = self.pool.acquire().await?;
            let done = bind_params(statement).execute(&mut *conn).await?;
            Ok::<_, StoreError>(done.rows_affected())
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            result = work => result,
        }
    }
}
