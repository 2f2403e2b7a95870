//! Memoized access to metadata definitions stored as records.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use archivum_core::{AppError, AppResult};
use archivum_domain::DataGroup;
use archivum_domain::record_type::METADATA_RECORD_TYPE;

use crate::record_ports::RecordStorage;

/// Edge from a metadata group to one allowed child.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ChildReference {
    pub(crate) child_id: String,
    pub(crate) repeat_max: String,
    pub(crate) record_part_constraint: Option<String>,
    pub(crate) collect_terms: Vec<CollectTermReference>,
}

impl ChildReference {
    pub(crate) fn is_max_one(&self) -> bool {
        self.repeat_max == "1"
    }
}

/// Link from a child reference to a collect term definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CollectTermReference {
    pub(crate) collect_term_id: String,
}

/// Reads metadata elements once per pass; the cache dies with the reader.
pub(crate) struct MetadataReader<'a> {
    storage: &'a dyn RecordStorage,
    cache: HashMap<String, Arc<DataGroup>>,
}

impl<'a> MetadataReader<'a> {
    pub(crate) fn new(storage: &'a dyn RecordStorage) -> Self {
        Self {
            storage,
            cache: HashMap::new(),
        }
    }

    pub(crate) async fn read(&mut self, metadata_id: &str) -> AppResult<Arc<DataGroup>> {
        if let Some(metadata) = self.cache.get(metadata_id) {
            return Ok(metadata.clone());
        }

        let metadata = Arc::new(self.storage.read(METADATA_RECORD_TYPE, metadata_id).await?);
        self.cache.insert(metadata_id.to_owned(), metadata.clone());
        Ok(metadata)
    }

    /// Resolves every attribute reference of an element to its permitted values.
    pub(crate) async fn attribute_filters(
        &mut self,
        metadata: &DataGroup,
    ) -> AppResult<Vec<(String, BTreeSet<String>)>> {
        let Some(attribute_references) = metadata.first_group("attributeReferences") else {
            return Ok(Vec::new());
        };

        let mut filters = Vec::new();
        for reference in attribute_references.record_links_with_name("ref") {
            let collection_variable = self.read(reference.linked_record_id()).await?;
            let attribute_name = name_in_data(&collection_variable)?.to_owned();
            let values = self.permitted_values(&collection_variable).await?;
            filters.push((attribute_name, values));
        }

        Ok(filters)
    }

    async fn permitted_values(
        &mut self,
        collection_variable: &DataGroup,
    ) -> AppResult<BTreeSet<String>> {
        if let Some(final_value) = collection_variable.first_atomic_value("finalValue") {
            return Ok(BTreeSet::from([final_value.to_owned()]));
        }

        let collection_id = collection_variable
            .first_record_link("refCollection")
            .map(|link| link.linked_record_id().to_owned())
            .ok_or_else(|| {
                AppError::MissingData(format!(
                    "collection variable '{}' has no refCollection",
                    collection_variable.record_id().unwrap_or_default()
                ))
            })?;
        let collection = self.read(collection_id.as_str()).await?;

        let mut values = BTreeSet::new();
        if let Some(item_references) = collection.first_group("collectionItemReferences") {
            for item_reference in item_references.record_links_with_name("ref") {
                let item = self.read(item_reference.linked_record_id()).await?;
                values.insert(name_in_data(&item)?.to_owned());
            }
        }

        Ok(values)
    }
}

pub(crate) fn is_metadata_group(metadata: &DataGroup) -> bool {
    metadata.attribute("type") == Some("group")
}

pub(crate) fn name_in_data(metadata: &DataGroup) -> AppResult<&str> {
    metadata.first_atomic_value("nameInData").ok_or_else(|| {
        AppError::MissingData(format!(
            "metadata '{}' has no nameInData",
            metadata.record_id().unwrap_or_default()
        ))
    })
}

pub(crate) fn child_references(metadata_group: &DataGroup) -> AppResult<Vec<ChildReference>> {
    let Some(references) = metadata_group.first_group("childReferences") else {
        return Ok(Vec::new());
    };

    references
        .groups_with_name("childReference")
        .map(|reference| {
            let child_id = reference
                .first_record_link("ref")
                .map(|link| link.linked_record_id().to_owned())
                .ok_or_else(|| {
                    AppError::MissingData(format!(
                        "child reference in metadata '{}' has no ref",
                        metadata_group.record_id().unwrap_or_default()
                    ))
                })?;

            Ok(ChildReference {
                child_id,
                repeat_max: reference
                    .first_atomic_value("repeatMax")
                    .unwrap_or("1")
                    .to_owned(),
                record_part_constraint: reference
                    .first_atomic_value("recordPartConstraint")
                    .map(ToOwned::to_owned),
                collect_terms: reference
                    .record_links_with_name("childRefCollectTerm")
                    .map(|link| CollectTermReference {
                        collect_term_id: link.linked_record_id().to_owned(),
                    })
                    .collect(),
            })
        })
        .collect()
}
