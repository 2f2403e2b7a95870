use archivum_core::AppResult;
use archivum_domain::{DataGroup, IndexTerm};
use async_trait::async_trait;

/// Document submitted to the search indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDocument {
    /// Record type of the indexed record.
    pub record_type: String,
    /// Record id.
    pub record_id: String,
    /// Combined type-and-id keys, most specific first.
    pub ids: Vec<String>,
    /// Terms to index.
    pub index_terms: Vec<IndexTerm>,
    /// Full record payload.
    pub data: DataGroup,
}

/// Search indexer port.
#[async_trait]
pub trait RecordIndexer: Send + Sync {
    /// Submits one document, leaving commit timing to the indexer.
    async fn index_without_explicit_commit(&self, document: IndexDocument) -> AppResult<()>;
}
