use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use archivum_core::{AppError, AppResult};
use archivum_domain::record_type::COLLECT_TERM_RECORD_TYPE;
use archivum_domain::{
    CollectTerms, DataElement, DataGroup, IndexTerm, PermissionTerm, StorageTerm,
};
use async_trait::async_trait;

use crate::metadata_reader::{MetadataReader, child_references, is_metadata_group, name_in_data};
use crate::record_ports::{RecordStorage, TermCollector};

type TermWalk<'r> = Pin<Box<dyn Future<Output = AppResult<()>> + Send + 'r>>;

/// Term collector driven by `childRefCollectTerm` links in metadata definitions.
#[derive(Clone)]
pub struct MetadataTermCollector {
    storage: Arc<dyn RecordStorage>,
}

impl MetadataTermCollector {
    /// Creates a new collector reading definitions from storage.
    #[must_use]
    pub fn new(storage: Arc<dyn RecordStorage>) -> Self {
        Self { storage }
    }
}

#[async_trait]
impl TermCollector for MetadataTermCollector {
    async fn collect_terms(&self, metadata_id: &str, data: &DataGroup) -> AppResult<CollectTerms> {
        let mut collection = TermCollection {
            storage: self.storage.as_ref(),
            reader: MetadataReader::new(self.storage.as_ref()),
            definitions: HashMap::new(),
            terms: CollectTerms::default(),
        };

        collect_from_group(&mut collection, metadata_id, data).await?;

        Ok(collection.terms)
    }
}

/// State of one `collect_terms` call.
struct TermCollection<'a> {
    storage: &'a dyn RecordStorage,
    reader: MetadataReader<'a>,
    definitions: HashMap<String, Arc<DataGroup>>,
    terms: CollectTerms,
}

impl TermCollection<'_> {
    async fn definition(&mut self, collect_term_id: &str) -> AppResult<Arc<DataGroup>> {
        if let Some(definition) = self.definitions.get(collect_term_id) {
            return Ok(definition.clone());
        }

        let definition = Arc::new(
            self.storage
                .read(COLLECT_TERM_RECORD_TYPE, collect_term_id)
                .await?,
        );
        self.definitions
            .insert(collect_term_id.to_owned(), definition.clone());
        Ok(definition)
    }

    fn add_term(&mut self, definition: &DataGroup, value: &str) -> AppResult<()> {
        let id = definition.record_id().unwrap_or_default();

        match definition.attribute("type") {
            Some("permission") => self.terms.permission_terms.push(PermissionTerm {
                id: id.to_owned(),
                key: extra_data(definition, "permissionKey")?,
                value: value.to_owned(),
            }),
            Some("storage") => self.terms.storage_terms.push(StorageTerm {
                id: id.to_owned(),
                key: extra_data(definition, "storageKey")?,
                value: value.to_owned(),
            }),
            Some("index") => self.terms.index_terms.push(IndexTerm {
                id: id.to_owned(),
                value: value.to_owned(),
                index_type: extra_data(definition, "indexType")?,
            }),
            other => {
                return Err(AppError::Validation(format!(
                    "collect term '{id}' has unknown type '{}'",
                    other.unwrap_or_default()
                )));
            }
        }

        Ok(())
    }
}

fn extra_data(definition: &DataGroup, name_in_data: &str) -> AppResult<String> {
    definition
        .first_group("extraData")
        .and_then(|extra_data| extra_data.first_atomic_value(name_in_data))
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AppError::MissingData(format!(
                "collect term '{}' has no extraData/{name_in_data}",
                definition.record_id().unwrap_or_default()
            ))
        })
}

fn term_value(element: &DataElement) -> Option<&str> {
    match element {
        DataElement::Atomic(atomic) => Some(atomic.value()),
        DataElement::RecordLink(link) => Some(link.linked_record_id()),
        DataElement::Group(_) | DataElement::ResourceLink(_) => None,
    }
}

fn collect_from_group<'r, 'a: 'r>(
    collection: &'r mut TermCollection<'a>,
    metadata_id: &'r str,
    data: &'r DataGroup,
) -> TermWalk<'r> {
    Box::pin(async move {
        let metadata_group = collection.reader.read(metadata_id).await?;

        for reference in child_references(&metadata_group)? {
            let child_metadata = collection.reader.read(reference.child_id.as_str()).await?;
            let data_children: Vec<&DataElement> = data
                .children_with_name(name_in_data(&child_metadata)?)
                .collect();
            if data_children.is_empty() {
                continue;
            }

            for collect_term in &reference.collect_terms {
                let definition = collection
                    .definition(collect_term.collect_term_id.as_str())
                    .await?;
                for value in data_children.iter().filter_map(|child| term_value(child)) {
                    collection.add_term(&definition, value)?;
                }
            }

            if is_metadata_group(&child_metadata) {
                for child_group in data_children.iter().filter_map(|child| child.as_group()) {
                    collect_from_group(collection, reference.child_id.as_str(), child_group)
                        .await?;
                }
            }
        }

        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use archivum_core::AppError;
    use archivum_domain::record_type::{COLLECT_TERM_RECORD_TYPE, METADATA_RECORD_TYPE};
    use archivum_domain::{DataAtomic, DataGroup, DataRecordLink};

    use crate::record_ports::TermCollector;
    use crate::test_fixtures::{
        FakeRecordStorage, child_reference, metadata_element, metadata_group, record,
        text_variable,
    };

    use super::MetadataTermCollector;

    fn collect_term(collect_term_id: &str, kind: &str, extra: Option<(&str, &str)>) -> DataGroup {
        let definition = DataGroup::new("collectTerm")
            .with_attribute("type", kind)
            .with_record_info(COLLECT_TERM_RECORD_TYPE, collect_term_id);

        match extra {
            Some((name, value)) => definition
                .with_child(DataGroup::new("extraData").with_child(DataAtomic::new(name, value))),
            None => definition,
        }
    }

    fn collecting(reference: DataGroup, collect_term_id: &str) -> DataGroup {
        reference.with_child(DataRecordLink::new(
            "childRefCollectTerm",
            COLLECT_TERM_RECORD_TYPE,
            collect_term_id,
        ))
    }

    fn storage() -> FakeRecordStorage {
        FakeRecordStorage::default()
            .with_records(
                METADATA_RECORD_TYPE,
                vec![
                    metadata_group(
                        "bookGroup",
                        "book",
                        vec![
                            collecting(child_reference("titleTextVar", "X"), "titleIndexTerm"),
                            collecting(
                                child_reference("publisherLink", "1"),
                                "publisherPermissionTerm",
                            ),
                            child_reference("adminGroup", "1"),
                        ],
                    ),
                    metadata_group(
                        "adminGroup",
                        "admin",
                        vec![collecting(
                            child_reference("ownerTextVar", "1"),
                            "ownerStorageTerm",
                        )],
                    ),
                    text_variable("titleTextVar", "title"),
                    text_variable("ownerTextVar", "owner"),
                    metadata_element("publisherLink", "publisher", "recordLink"),
                ],
            )
            .with_records(
                COLLECT_TERM_RECORD_TYPE,
                vec![
                    collect_term("titleIndexTerm", "index", Some(("indexType", "indexTypeString"))),
                    collect_term(
                        "publisherPermissionTerm",
                        "permission",
                        Some(("permissionKey", "permissionKey.organisation")),
                    ),
                    collect_term("ownerStorageTerm", "storage", Some(("storageKey", "owner"))),
                ],
            )
    }

    fn book() -> DataGroup {
        record("book", "b:1")
            .with_child(DataAtomic::new("title", "Dune").with_repeat_id("0"))
            .with_child(DataAtomic::new("title", "Dune Messiah").with_repeat_id("1"))
            .with_child(DataRecordLink::new("publisher", "organisation", "system.uu"))
            .with_child(DataGroup::new("admin").with_child(DataAtomic::new("owner", "alice")))
    }

    #[tokio::test]
    async fn collects_terms_of_every_kind() {
        let storage = Arc::new(storage());
        let collector = MetadataTermCollector::new(storage.clone());

        let terms = collector.collect_terms("bookGroup", &book()).await;
        assert!(terms.is_ok());
        let terms = terms.unwrap_or_else(|_| unreachable!());

        let titles: Vec<&str> = terms
            .index_terms
            .iter()
            .map(|term| term.value.as_str())
            .collect();
        assert_eq!(titles, vec!["Dune", "Dune Messiah"]);
        assert_eq!(terms.index_terms[0].index_type, "indexTypeString");

        assert_eq!(terms.permission_terms.len(), 1);
        assert_eq!(terms.permission_terms[0].key, "permissionKey.organisation");
        assert_eq!(terms.permission_terms[0].value, "system.uu");

        assert_eq!(terms.storage_terms.len(), 1);
        assert_eq!(terms.storage_terms[0].id, "ownerStorageTerm");
        assert_eq!(terms.storage_terms[0].value, "alice");

        assert_eq!(
            storage
                .reads_of(COLLECT_TERM_RECORD_TYPE, "titleIndexTerm")
                .await,
            1
        );
    }

    #[tokio::test]
    async fn absent_data_yields_no_terms() {
        let storage = Arc::new(storage());
        let collector = MetadataTermCollector::new(storage.clone());

        let terms = collector
            .collect_terms("bookGroup", &record("book", "b:2"))
            .await;
        assert!(terms.is_ok());
        assert_eq!(terms.ok(), Some(Default::default()));
        assert_eq!(
            storage
                .reads_of(COLLECT_TERM_RECORD_TYPE, "titleIndexTerm")
                .await,
            0
        );
    }

    #[tokio::test]
    async fn missing_extra_data_is_reported() {
        let storage = Arc::new(storage().with_record(
            COLLECT_TERM_RECORD_TYPE,
            collect_term("titleIndexTerm", "index", None),
        ));
        let collector = MetadataTermCollector::new(storage);

        let result = collector.collect_terms("bookGroup", &book()).await;
        assert!(matches!(result, Err(AppError::MissingData(_))));
    }

    #[tokio::test]
    async fn unknown_metadata_propagates_not_found() {
        let collector = MetadataTermCollector::new(Arc::new(storage()));

        let result = collector.collect_terms("missingGroup", &book()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
