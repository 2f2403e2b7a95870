use std::collections::BTreeMap;

use archivum_application::{RecordStorage, StorageReadResult};
use archivum_core::{AppError, AppResult};
use archivum_domain::{DataElement, DataGroup, FilterCondition, ListFilter};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::record_storage_support::{linked_records, window_bounds};

/// In-memory record storage implementation.
#[derive(Debug, Default)]
pub struct InMemoryRecordStorage {
    records: RwLock<BTreeMap<(String, String), DataGroup>>,
}

impl InMemoryRecordStorage {
    /// Creates an empty in-memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a new record under its `recordInfo/id`.
    pub async fn create(&self, record_type: &str, record: DataGroup) -> AppResult<()> {
        let record_id = record
            .record_id()
            .ok_or_else(|| AppError::Validation("record has no recordInfo id".to_owned()))?
            .to_owned();
        let key = (record_type.to_owned(), record_id);
        let mut records = self.records.write().await;

        if records.contains_key(&key) {
            return Err(AppError::Conflict(format!(
                "record '{}:{}' already exists",
                key.0, key.1
            )));
        }

        records.insert(key, record);
        Ok(())
    }
}

fn matches_conditions(record: &DataGroup, conditions: &[FilterCondition]) -> bool {
    conditions.iter().all(|condition| {
        record
            .children_with_name(condition.name_in_data.as_str())
            .any(|child| {
                matches!(child, DataElement::Atomic(atomic) if atomic.value() == condition.value)
            })
    })
}

#[async_trait]
impl RecordStorage for InMemoryRecordStorage {
    async fn read(&self, record_type: &str, record_id: &str) -> AppResult<DataGroup> {
        self.records
            .read()
            .await
            .get(&(record_type.to_owned(), record_id.to_owned()))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("record '{record_type}:{record_id}'")))
    }

    async fn read_list(
        &self,
        record_type: &str,
        filter: &ListFilter,
    ) -> AppResult<StorageReadResult> {
        let records = self.records.read().await;
        let matches: Vec<&DataGroup> = records
            .iter()
            .filter(|((stored_type, _), record)| {
                stored_type == record_type && matches_conditions(record, &filter.conditions)
            })
            .map(|(_, record)| record)
            .collect();

        let total_number_of_matches = matches.len() as u64;
        let (offset, limit) = window_bounds(filter, total_number_of_matches);
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);
        let take = usize::try_from(limit).unwrap_or(usize::MAX);

        Ok(StorageReadResult {
            records: matches.into_iter().skip(skip).take(take).cloned().collect(),
            total_number_of_matches,
        })
    }

    async fn links_exist_for_record(&self, record_type: &str, record_id: &str) -> AppResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|((stored_type, stored_id), _)| {
                stored_type != record_type || stored_id != record_id
            })
            .any(|(_, record)| linked_records(record).contains(&(record_type, record_id))))
    }
}
