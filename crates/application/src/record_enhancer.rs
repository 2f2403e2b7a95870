use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use archivum_core::{AppError, AppResult, UserIdentity};
use archivum_domain::record_type::SEARCH_RECORD_TYPE;
use archivum_domain::{Action, ActionDecision, DataGroup, PermissionTerm};
use tracing::debug;

use crate::RecordTypeHandler;
use crate::record_ports::{Authorizer, RecordStorage, TermCollector};

mod links;

/// Computes which actions a user may perform on a record and which of its
/// links the user may follow.
#[derive(Clone)]
pub struct RecordEnhancer {
    storage: Arc<dyn RecordStorage>,
    authorizer: Arc<dyn Authorizer>,
    term_collector: Arc<dyn TermCollector>,
}

/// Caches owned by exactly one `enhance` call.
#[derive(Default)]
struct EnhancementContext {
    handlers: HashMap<String, Arc<RecordTypeHandler>>,
    readable_links: HashMap<(String, String), bool>,
    resource_links_readable: Option<bool>,
}

impl RecordEnhancer {
    /// Creates a new enhancer from its collaborators.
    #[must_use]
    pub fn new(
        storage: Arc<dyn RecordStorage>,
        authorizer: Arc<dyn Authorizer>,
        term_collector: Arc<dyn TermCollector>,
    ) -> Self {
        Self {
            storage,
            authorizer,
            term_collector,
        }
    }

    /// Decides the user's actions on one record and decorates its readable links.
    ///
    /// Read and update eligibility never fail the call; a denied probe only
    /// leaves the action out. The input record is not modified.
    pub async fn enhance(
        &self,
        user: &UserIdentity,
        record_type: &str,
        data: &DataGroup,
    ) -> AppResult<ActionDecision> {
        let mut context = EnhancementContext::default();
        let handler = self.handler(&mut context, record_type).await?;

        let terms = self
            .term_collector
            .collect_terms(handler.metadata_id()?, data)
            .await?;
        let permission_terms = terms.permission_terms.as_slice();

        let mut actions = BTreeSet::new();

        let has_read_constraint = handler.has_record_part_read_constraint().await?;
        let read_record_part_permissions = self
            .probe_record_part_permissions(
                user,
                Action::Read,
                record_type,
                permission_terms,
                has_read_constraint,
            )
            .await
            .map(|permissions| {
                actions.insert(Action::Read);
                permissions
            })
            .unwrap_or_default();

        let has_write_constraint = handler.has_record_part_write_constraint().await?;
        let write_record_part_permissions = self
            .probe_record_part_permissions(
                user,
                Action::Update,
                record_type,
                permission_terms,
                has_write_constraint,
            )
            .await
            .map(|permissions| {
                actions.insert(Action::Update);
                permissions
            })
            .unwrap_or_default();

        if self
            .authorized_on_data(user, Action::Index, record_type, permission_terms)
            .await?
        {
            actions.insert(Action::Index);
        }

        let record_id = data.record_id().ok_or_else(|| {
            AppError::MissingData(format!("record of type '{record_type}' has no recordInfo id"))
        })?;
        let has_incoming_links = self
            .has_incoming_links(&handler, record_type, record_id)
            .await?;

        if self
            .authorized_on_data(user, Action::Delete, record_type, permission_terms)
            .await?
            && !has_incoming_links
        {
            actions.insert(Action::Delete);
        }

        if has_incoming_links {
            actions.insert(Action::ReadIncomingLinks);
        }

        if handler.is_child_of_binary()
            && self
                .authorized_on_data(user, Action::Upload, record_type, permission_terms)
                .await?
        {
            actions.insert(Action::Upload);
        }

        if handler.represents_the_record_type_defining_searches()
            && self.authorized_to_search_all(user, data).await?
        {
            actions.insert(Action::Search);
        }

        if handler.represents_the_record_type_defining_record_types() {
            self.add_actions_for_described_record_type(user, &mut context, record_id, &mut actions)
                .await?;
        }

        let mut decorated = data.clone();
        self.decorate_links(user, &mut context, &mut decorated).await;

        Ok(ActionDecision {
            record_type: record_type.to_owned(),
            data: decorated,
            actions,
            read_record_part_permissions,
            write_record_part_permissions,
        })
    }

    /// Enhances every record independently, each with its own caches.
    pub async fn enhance_list(
        &self,
        user: &UserIdentity,
        record_type: &str,
        records: &[DataGroup],
    ) -> AppResult<Vec<ActionDecision>> {
        let mut decisions = Vec::with_capacity(records.len());
        for record in records {
            decisions.push(self.enhance(user, record_type, record).await?);
        }

        Ok(decisions)
    }

    async fn handler(
        &self,
        context: &mut EnhancementContext,
        record_type: &str,
    ) -> AppResult<Arc<RecordTypeHandler>> {
        if let Some(handler) = context.handlers.get(record_type) {
            return Ok(handler.clone());
        }

        let handler = Arc::new(RecordTypeHandler::resolve(self.storage.clone(), record_type).await?);
        context
            .handlers
            .insert(record_type.to_owned(), handler.clone());
        Ok(handler)
    }

    async fn probe_record_part_permissions(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
        has_record_part_constraint: bool,
    ) -> Option<BTreeSet<String>> {
        match self
            .authorizer
            .matched_record_part_permissions(
                user,
                action,
                record_type,
                permission_terms,
                has_record_part_constraint,
            )
            .await
        {
            Ok(permissions) => Some(permissions),
            Err(error) => {
                debug!(
                    subject = %user.subject(),
                    record_type = %record_type,
                    action = action.as_str(),
                    error = %error,
                    "record-part permission probe denied"
                );
                None
            }
        }
    }

    async fn authorized_on_data(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
    ) -> AppResult<bool> {
        self.authorizer
            .is_authorized_for_action_on_record_type_and_collected_data(
                user,
                action,
                record_type,
                permission_terms,
            )
            .await
    }

    async fn has_incoming_links(
        &self,
        handler: &RecordTypeHandler,
        record_type: &str,
        record_id: &str,
    ) -> AppResult<bool> {
        if self
            .storage
            .links_exist_for_record(record_type, record_id)
            .await?
        {
            return Ok(true);
        }

        match handler.parent_id() {
            Ok(parent_id) => {
                self.storage
                    .links_exist_for_record(parent_id, record_id)
                    .await
            }
            Err(_) => Ok(false),
        }
    }

    /// All-or-nothing over the `recordTypeToSearchIn` links of a search record.
    async fn authorized_to_search_all(
        &self,
        user: &UserIdentity,
        search: &DataGroup,
    ) -> AppResult<bool> {
        for target in search.record_links_with_name("recordTypeToSearchIn") {
            if !self
                .authorizer
                .is_authorized_for_action_on_record_type(
                    user,
                    Action::Search,
                    target.linked_record_id(),
                )
                .await?
            {
                return Ok(false);
            }
        }

        Ok(true)
    }

    async fn add_actions_for_described_record_type(
        &self,
        user: &UserIdentity,
        context: &mut EnhancementContext,
        described_type: &str,
        actions: &mut BTreeSet<Action>,
    ) -> AppResult<()> {
        let described = self.handler(context, described_type).await?;

        if !described.is_abstract()
            && self
                .authorizer
                .is_authorized_for_action_on_record_type(user, Action::Create, described_type)
                .await?
        {
            actions.insert(Action::Create);
        }

        for action in [Action::List, Action::Validate] {
            if self
                .authorizer
                .is_authorized_for_action_on_record_type(user, action, described_type)
                .await?
            {
                actions.insert(action);
            }
        }

        if described.has_linked_search() {
            let search = self
                .storage
                .read(SEARCH_RECORD_TYPE, described.search_id()?)
                .await?;
            if self.authorized_to_search_all(user, &search).await? {
                actions.insert(Action::Search);
            }
        }

        Ok(())
    }
}
