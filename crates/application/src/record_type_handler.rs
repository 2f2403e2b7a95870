use std::collections::BTreeSet;
use std::sync::Arc;

use archivum_core::{AppError, AppResult};
use archivum_domain::record_type::{
    BINARY_RECORD_TYPE, METADATA_RECORD_TYPE, RECORD_TYPE_RECORD_TYPE, SEARCH_RECORD_TYPE,
};
use archivum_domain::{Constraint, DataGroup, ListFilter, RecordPartConstraints};
use tokio::sync::OnceCell;

use crate::record_ports::RecordStorage;

mod constraints;

/// Resolved view of one record type definition.
///
/// Metadata and constraint lookups are memoized for the lifetime of the
/// handler. Handlers are never shared across record type identities.
pub struct RecordTypeHandler {
    storage: Arc<dyn RecordStorage>,
    record_type_id: String,
    definition: DataGroup,
    metadata_group: OnceCell<DataGroup>,
    update_constraints: OnceCell<RecordPartConstraints>,
    create_write_constraints: OnceCell<BTreeSet<Constraint>>,
    type_chain: OnceCell<Vec<String>>,
}

impl RecordTypeHandler {
    /// Reads the record type definition from storage.
    pub async fn resolve(storage: Arc<dyn RecordStorage>, record_type_id: &str) -> AppResult<Self> {
        let definition = storage.read(RECORD_TYPE_RECORD_TYPE, record_type_id).await?;
        Self::from_definition(storage, definition)
    }

    /// Wraps an already loaded record type definition.
    pub fn from_definition(storage: Arc<dyn RecordStorage>, definition: DataGroup) -> AppResult<Self> {
        let record_type_id = definition
            .record_id()
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                AppError::MissingData("record type definition has no recordInfo id".to_owned())
            })?;

        Ok(Self {
            storage,
            record_type_id,
            definition,
            metadata_group: OnceCell::new(),
            update_constraints: OnceCell::new(),
            create_write_constraints: OnceCell::new(),
            type_chain: OnceCell::new(),
        })
    }

    /// Returns the handled record type id.
    #[must_use]
    pub fn record_type_id(&self) -> &str {
        self.record_type_id.as_str()
    }

    /// Returns whether the type only has instances through concrete descendants.
    #[must_use]
    pub fn is_abstract(&self) -> bool {
        self.definition.flag("abstract")
    }

    /// Returns whether record ids are generated rather than supplied by users.
    #[must_use]
    pub fn should_auto_generate_id(&self) -> bool {
        self.definition.first_atomic_value("userSuppliedId") == Some("false")
    }

    /// Returns whether every user may read records of this type.
    #[must_use]
    pub fn is_public_for_read(&self) -> bool {
        self.definition.flag("public")
    }

    /// Returns whether records of this type are also stored in the archive.
    #[must_use]
    pub fn store_in_archive(&self) -> bool {
        self.definition.flag("storeInArchive")
    }

    /// Returns the metadata group id used to validate new records.
    pub fn new_metadata_id(&self) -> AppResult<&str> {
        self.linked_id("newMetadataId")
    }

    /// Returns the metadata group id used to validate updated records.
    pub fn metadata_id(&self) -> AppResult<&str> {
        self.linked_id("metadataId")
    }

    /// Returns the metadata group for [`Self::metadata_id`], read once per handler.
    pub async fn metadata_group(&self) -> AppResult<&DataGroup> {
        self.metadata_group
            .get_or_try_init(|| async {
                self.storage
                    .read(METADATA_RECORD_TYPE, self.metadata_id()?)
                    .await
            })
            .await
    }

    /// Returns whether the type has a parent type.
    #[must_use]
    pub fn has_parent(&self) -> bool {
        self.definition.contains_child("parentId")
    }

    /// Returns the parent type id.
    pub fn parent_id(&self) -> AppResult<&str> {
        self.definition
            .first_record_link("parentId")
            .map(|link| link.linked_record_id())
            .ok_or_else(|| AppError::MissingData("no parents exist".to_owned()))
    }

    /// Returns whether the immediate parent is the built-in binary type.
    #[must_use]
    pub fn is_child_of_binary(&self) -> bool {
        self.parent_id().ok() == Some(BINARY_RECORD_TYPE)
    }

    /// Returns whether this handler describes the type defining searches.
    #[must_use]
    pub fn represents_the_record_type_defining_searches(&self) -> bool {
        self.record_type_id == SEARCH_RECORD_TYPE
    }

    /// Returns whether this handler describes the type defining record types.
    #[must_use]
    pub fn represents_the_record_type_defining_record_types(&self) -> bool {
        self.record_type_id == RECORD_TYPE_RECORD_TYPE
    }

    /// Returns whether the type links a search definition.
    #[must_use]
    pub fn has_linked_search(&self) -> bool {
        self.definition.contains_child("search")
    }

    /// Returns the linked search id.
    pub fn search_id(&self) -> AppResult<&str> {
        self.definition
            .first_record_link("search")
            .map(|link| link.linked_record_id())
            .ok_or_else(|| {
                AppError::MissingData(format!(
                    "no search exists for record type '{}'",
                    self.record_type_id
                ))
            })
    }

    /// Returns `"{type}_{record_id}"` for this type and then for every ancestor,
    /// most specific first.
    pub async fn combined_ids_using_record_id(&self, record_id: &str) -> AppResult<Vec<String>> {
        Ok(self
            .type_chain()
            .await?
            .iter()
            .map(|record_type| format!("{record_type}_{record_id}"))
            .collect())
    }

    /// Returns handlers for every concrete type descending from this abstract type.
    ///
    /// Concrete types answer with an empty list without touching storage.
    pub async fn implementing_record_type_handlers(&self) -> AppResult<Vec<RecordTypeHandler>> {
        if !self.is_abstract() {
            return Ok(Vec::new());
        }

        let definitions = self
            .storage
            .read_list(RECORD_TYPE_RECORD_TYPE, &ListFilter::default())
            .await?;
        let mut remaining = definitions
            .records
            .into_iter()
            .map(|definition| Self::from_definition(self.storage.clone(), definition))
            .collect::<AppResult<Vec<_>>>()?;

        let mut implementing = Vec::new();
        let mut pending = vec![self.record_type_id.clone()];
        while let Some(ancestor_id) = pending.pop() {
            let (children, rest): (Vec<_>, Vec<_>) = remaining
                .into_iter()
                .partition(|handler| handler.parent_id().ok() == Some(ancestor_id.as_str()));
            remaining = rest;

            for child in children {
                if child.is_abstract() {
                    pending.push(child.record_type_id.clone());
                } else {
                    implementing.push(child);
                }
            }
        }

        Ok(implementing)
    }

    /// Returns constraints limiting who may read parts of records.
    pub async fn record_part_read_constraints(&self) -> AppResult<&BTreeSet<Constraint>> {
        Ok(self.update_constraints().await?.read())
    }

    /// Returns constraints limiting who may update parts of records.
    pub async fn record_part_write_constraints(&self) -> AppResult<&BTreeSet<Constraint>> {
        Ok(self.update_constraints().await?.write())
    }

    /// Returns constraints limiting who may set parts of new records.
    pub async fn record_part_create_write_constraints(&self) -> AppResult<&BTreeSet<Constraint>> {
        self.create_write_constraints
            .get_or_try_init(|| async {
                let constraints = self.resolve_constraints(self.new_metadata_id()?).await?;
                Ok(constraints.into_write())
            })
            .await
    }

    /// Returns whether any read constraint exists.
    pub async fn has_record_part_read_constraint(&self) -> AppResult<bool> {
        Ok(!self.record_part_read_constraints().await?.is_empty())
    }

    /// Returns whether any write constraint exists.
    pub async fn has_record_part_write_constraint(&self) -> AppResult<bool> {
        Ok(!self.record_part_write_constraints().await?.is_empty())
    }

    /// Returns whether any create-time write constraint exists.
    pub async fn has_record_part_create_constraint(&self) -> AppResult<bool> {
        Ok(!self.record_part_create_write_constraints().await?.is_empty())
    }

    async fn update_constraints(&self) -> AppResult<&RecordPartConstraints> {
        self.update_constraints
            .get_or_try_init(|| async { self.resolve_constraints(self.metadata_id()?).await })
            .await
    }

    async fn type_chain(&self) -> AppResult<&Vec<String>> {
        self.type_chain
            .get_or_try_init(|| async {
                let mut chain = vec![self.record_type_id.clone()];
                let mut next_parent = self.parent_id().ok().map(ToOwned::to_owned);

                while let Some(parent_id) = next_parent {
                    if chain.contains(&parent_id) {
                        break;
                    }
                    let parent = Self::resolve(self.storage.clone(), parent_id.as_str()).await?;
                    next_parent = parent.parent_id().ok().map(ToOwned::to_owned);
                    chain.push(parent_id);
                }

                Ok(chain)
            })
            .await
    }

    fn linked_id(&self, name_in_data: &str) -> AppResult<&str> {
        self.definition
            .first_record_link(name_in_data)
            .map(|link| link.linked_record_id())
            .ok_or_else(|| {
                AppError::MissingData(format!(
                    "record type '{}' has no {name_in_data}",
                    self.record_type_id
                ))
            })
    }
}
