//! Capability probing
//!
//! Cheap, fail-closed checks that tell callers whether the vector code path
//! is usable before they try it. A probe never returns an error: an outage,
//! a missing extension, and an empty table all read as `false`.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::vector_search::backend::VectorBackend;
use crate::vector_search::error::StoreError;
use crate::vector_search::query::{self, Statement};
use crate::vector_search::types::CatalogKind;

/// What a probe found, before it is reduced to a boolean
#[derive(Debug)]
pub(crate) enum ProbeOutcome {
    Available,
    Unsupported,
    Failed(StoreError),
}

impl ProbeOutcome {
    pub(crate) fn is_available(&self) -> bool {
        matches!(self, ProbeOutcome::Available)
    }
}

#[derive(Clone)]
pub struct CapabilityProbe {
    backend: Arc<dyn VectorBackend>,
    cancel: CancellationToken,
}

impl CapabilityProbe {
    pub fn new(backend: Arc<dyn VectorBackend>) -> Self {
        Self {
            backend,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Whether the store's vector extension or function is installed
    pub async fn is_vector_capability_available(&self) -> bool {
        let statement = query::capability(self.backend.dialect());
        let outcome = self.check(&statement).await;

        match &outcome {
            ProbeOutcome::Available => tracing::debug!("Vector similarity is available"),
            ProbeOutcome::Unsupported => {
                tracing::debug!("Vector similarity is not installed in the store")
            }
            ProbeOutcome::Failed(err) if err.is_cancelled() => {
                tracing::debug!("Vector capability probe cancelled")
            }
            ProbeOutcome::Failed(err) => {
                tracing::warn!(error = %err, "Error checking vector capability")
            }
        }

        outcome.is_available()
    }

    /// Whether at least one record of `catalog` has a stored embedding
    pub async fn has_any_embeddings(&self, catalog: CatalogKind) -> bool {
        let statement = query::embeddings_exist(catalog);
        let outcome = self.check(&statement).await;

        match &outcome {
            ProbeOutcome::Available => {
                tracing::debug!(catalog = %catalog, "Stored embeddings found")
            }
            ProbeOutcome::Unsupported => {
                tracing::debug!(catalog = %catalog, "No stored embeddings")
            }
            ProbeOutcome::Failed(err) if err.is_cancelled() => {
                tracing::debug!(catalog = %catalog, "Embedding existence probe cancelled")
            }
            ProbeOutcome::Failed(err) => {
                tracing::warn!(
                    catalog = %catalog,
                    error = %err,
                    "Error checking for stored embeddings"
                )
            }
        }

        outcome.is_available()
    }

    async fn check(&self, statement: &Statement) -> ProbeOutcome {
        let rows = match self.backend.query_rows(statement, &self.cancel).await {
            Ok(rows) => rows,
            Err(err) => return ProbeOutcome::Failed(err),
        };

        match rows.first().map(|row| row.bool(0)) {
            Some(Ok(true)) => ProbeOutcome::Available,
            Some(Ok(false)) | None => ProbeOutcome::Unsupported,
            Some(Err(err)) => ProbeOutcome::Failed(err),
        }
    }
}
