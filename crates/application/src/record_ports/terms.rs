use archivum_core::AppResult;
use archivum_domain::{CollectTerms, DataGroup};
use async_trait::async_trait;

/// Port extracting flat term sets from a record payload.
#[async_trait]
pub trait TermCollector: Send + Sync {
    /// Collects terms from `data` as described by the metadata group `metadata_id`.
    async fn collect_terms(&self, metadata_id: &str, data: &DataGroup) -> AppResult<CollectTerms>;
}
