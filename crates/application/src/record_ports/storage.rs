use archivum_core::AppResult;
use archivum_domain::{DataGroup, ListFilter};
use async_trait::async_trait;

/// One page of records plus the number of records matching the filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageReadResult {
    /// Records inside the requested window.
    pub records: Vec<DataGroup>,
    /// Matches across all windows.
    pub total_number_of_matches: u64,
}

/// Storage port for records and their definitions.
#[async_trait]
pub trait RecordStorage: Send + Sync {
    /// Reads one record, failing with `AppError::NotFound` when absent.
    async fn read(&self, record_type: &str, record_id: &str) -> AppResult<DataGroup>;

    /// Reads the window of records selected by the filter.
    async fn read_list(&self, record_type: &str, filter: &ListFilter)
    -> AppResult<StorageReadResult>;

    /// Returns whether any stored record links to the given record.
    async fn links_exist_for_record(&self, record_type: &str, record_id: &str) -> AppResult<bool>;
}
