//! Fakes and metadata builders shared by application tests.

use std::collections::{HashMap, HashSet};

use archivum_core::{AppError, AppResult};
use archivum_domain::record_type::{METADATA_RECORD_TYPE, RECORD_TYPE_RECORD_TYPE};
use archivum_domain::{DataAtomic, DataGroup, DataRecordLink, ListFilter};
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::record_ports::{RecordStorage, StorageReadResult};

#[derive(Default)]
pub(crate) struct FakeRecordStorage {
    records: HashMap<(String, String), DataGroup>,
    incoming_links: HashSet<(String, String)>,
    reads: Mutex<Vec<(String, String)>>,
    list_reads: Mutex<Vec<(String, ListFilter)>>,
    link_checks: Mutex<Vec<(String, String)>>,
}

impl FakeRecordStorage {
    pub(crate) fn with_record(mut self, record_type: &str, record: DataGroup) -> Self {
        let record_id = record.record_id().unwrap_or_default().to_owned();
        self.records
            .insert((record_type.to_owned(), record_id), record);
        self
    }

    pub(crate) fn with_records(self, record_type: &str, records: Vec<DataGroup>) -> Self {
        records
            .into_iter()
            .fold(self, |storage, record| storage.with_record(record_type, record))
    }

    pub(crate) fn with_incoming_link(mut self, record_type: &str, record_id: &str) -> Self {
        self.incoming_links
            .insert((record_type.to_owned(), record_id.to_owned()));
        self
    }

    pub(crate) async fn reads_of(&self, record_type: &str, record_id: &str) -> usize {
        self.reads
            .lock()
            .await
            .iter()
            .filter(|(read_type, read_id)| read_type == record_type && read_id == record_id)
            .count()
    }

    pub(crate) async fn list_read_count(&self) -> usize {
        self.list_reads.lock().await.len()
    }

    pub(crate) async fn link_checks(&self) -> Vec<(String, String)> {
        self.link_checks.lock().await.clone()
    }
}

#[async_trait]
impl RecordStorage for FakeRecordStorage {
    async fn read(&self, record_type: &str, record_id: &str) -> AppResult<DataGroup> {
        self.reads
            .lock()
            .await
            .push((record_type.to_owned(), record_id.to_owned()));

        self.records
            .get(&(record_type.to_owned(), record_id.to_owned()))
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("record '{record_type}:{record_id}'")))
    }

    async fn read_list(
        &self,
        record_type: &str,
        filter: &ListFilter,
    ) -> AppResult<StorageReadResult> {
        self.list_reads
            .lock()
            .await
            .push((record_type.to_owned(), filter.clone()));

        let mut matches: Vec<(&String, &DataGroup)> = self
            .records
            .iter()
            .filter(|((stored_type, _), _)| stored_type == record_type)
            .map(|((_, stored_id), record)| (stored_id, record))
            .collect();
        matches.sort_by(|left, right| left.0.cmp(right.0));

        let total_number_of_matches = matches.len() as u64;
        let from_no = filter.from_no.unwrap_or(1).max(1);
        let to_no = filter.to_no.unwrap_or(total_number_of_matches);
        let records = matches
            .into_iter()
            .map(|(_, record)| record.clone())
            .skip(usize::try_from(from_no - 1).unwrap_or(usize::MAX))
            .take(usize::try_from(to_no.saturating_sub(from_no - 1)).unwrap_or(usize::MAX))
            .collect();

        Ok(StorageReadResult {
            records,
            total_number_of_matches,
        })
    }

    async fn links_exist_for_record(&self, record_type: &str, record_id: &str) -> AppResult<bool> {
        self.link_checks
            .lock()
            .await
            .push((record_type.to_owned(), record_id.to_owned()));

        Ok(self
            .incoming_links
            .contains(&(record_type.to_owned(), record_id.to_owned())))
    }
}

/// Record type definition validated by `metadata_id` on update and create.
pub(crate) fn record_type_definition(record_type_id: &str, metadata_id: &str) -> DataGroup {
    DataGroup::new("recordType")
        .with_record_info(RECORD_TYPE_RECORD_TYPE, record_type_id)
        .with_child(DataRecordLink::new("metadataId", METADATA_RECORD_TYPE, metadata_id))
        .with_child(DataRecordLink::new(
            "newMetadataId",
            METADATA_RECORD_TYPE,
            metadata_id,
        ))
}

pub(crate) fn parent_link(parent_id: &str) -> DataRecordLink {
    DataRecordLink::new("parentId", RECORD_TYPE_RECORD_TYPE, parent_id)
}

pub(crate) fn flag(name_in_data: &str) -> DataAtomic {
    DataAtomic::new(name_in_data, "true")
}

pub(crate) fn metadata_group(
    metadata_id: &str,
    name_in_data: &str,
    child_references: Vec<DataGroup>,
) -> DataGroup {
    let references = child_references
        .into_iter()
        .fold(DataGroup::new("childReferences"), DataGroup::with_child);

    metadata_element(metadata_id, name_in_data, "group").with_child(references)
}

pub(crate) fn text_variable(metadata_id: &str, name_in_data: &str) -> DataGroup {
    metadata_element(metadata_id, name_in_data, "textVariable")
}

pub(crate) fn metadata_element(metadata_id: &str, name_in_data: &str, kind: &str) -> DataGroup {
    DataGroup::new("metadata")
        .with_attribute("type", kind)
        .with_record_info(METADATA_RECORD_TYPE, metadata_id)
        .with_child(DataAtomic::new("nameInData", name_in_data))
}

pub(crate) fn child_reference(child_id: &str, repeat_max: &str) -> DataGroup {
    DataGroup::new("childReference")
        .with_child(DataRecordLink::new("ref", METADATA_RECORD_TYPE, child_id))
        .with_child(DataAtomic::new("repeatMin", "0"))
        .with_child(DataAtomic::new("repeatMax", repeat_max))
}

pub(crate) fn constrained_child_reference(child_id: &str, marking: &str) -> DataGroup {
    child_reference(child_id, "1").with_child(DataAtomic::new("recordPartConstraint", marking))
}

pub(crate) fn record(record_type: &str, record_id: &str) -> DataGroup {
    DataGroup::new(record_type).with_record_info(record_type, record_id)
}
