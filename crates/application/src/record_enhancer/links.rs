use archivum_core::{AppResult, UserIdentity};
use archivum_domain::record_type::IMAGE_RECORD_TYPE;
use archivum_domain::{Action, DataElement, DataGroup};
use tracing::debug;

use super::{EnhancementContext, RecordEnhancer};

enum LinkTarget {
    Record {
        record_type: String,
        record_id: String,
    },
    Resource,
}

impl RecordEnhancer {
    /// Adds [`Action::Read`] to every link in `data` the user may follow.
    ///
    /// Any failure while deciding a link denies that link.
    pub(super) async fn decorate_links(
        &self,
        user: &UserIdentity,
        context: &mut EnhancementContext,
        data: &mut DataGroup,
    ) {
        let mut targets = Vec::new();
        collect_link_targets(data, &mut targets);

        let mut readable = Vec::with_capacity(targets.len());
        for target in targets {
            let decision = match target {
                LinkTarget::Record {
                    record_type,
                    record_id,
                } => {
                    self.record_link_readable(user, context, record_type, record_id)
                        .await
                }
                LinkTarget::Resource => self.resource_links_readable(user, context).await,
            };
            readable.push(decision);
        }

        apply_read_decorations(data, &mut readable.into_iter());
    }

    async fn record_link_readable(
        &self,
        user: &UserIdentity,
        context: &mut EnhancementContext,
        record_type: String,
        record_id: String,
    ) -> bool {
        let key = (record_type, record_id);
        if let Some(readable) = context.readable_links.get(&key) {
            return *readable;
        }

        let (record_type, record_id) = (key.0.as_str(), key.1.as_str());
        let readable = match self
            .linked_record_readable(user, context, record_type, record_id)
            .await
        {
            Ok(readable) => readable,
            Err(error) => {
                debug!(
                    record_type = %record_type,
                    record_id = %record_id,
                    error = %error,
                    "link read denied"
                );
                false
            }
        };

        context.readable_links.insert(key, readable);
        readable
    }

    async fn linked_record_readable(
        &self,
        user: &UserIdentity,
        context: &mut EnhancementContext,
        record_type: &str,
        record_id: &str,
    ) -> AppResult<bool> {
        let handler = self.handler(context, record_type).await?;
        if handler.is_public_for_read() {
            return Ok(true);
        }

        let linked = self.storage.read(record_type, record_id).await?;
        let terms = self
            .term_collector
            .collect_terms(handler.metadata_id()?, &linked)
            .await?;

        self.authorizer
            .is_authorized_for_action_on_record_type_and_collected_data(
                user,
                Action::Read,
                record_type,
                &terms.permission_terms,
            )
            .await
    }

    async fn resource_links_readable(
        &self,
        user: &UserIdentity,
        context: &mut EnhancementContext,
    ) -> bool {
        if let Some(readable) = context.resource_links_readable {
            return readable;
        }

        let readable = self
            .authorizer
            .is_authorized_for_action_on_record_type(user, Action::Read, IMAGE_RECORD_TYPE)
            .await
            .unwrap_or_else(|error| {
                debug!(error = %error, "resource link read denied");
                false
            });

        context.resource_links_readable = Some(readable);
        readable
    }
}

/// Depth-first, document order.
fn collect_link_targets(group: &DataGroup, targets: &mut Vec<LinkTarget>) {
    for child in group.children() {
        match child {
            DataElement::Group(child_group) => collect_link_targets(child_group, targets),
            DataElement::RecordLink(link) => targets.push(LinkTarget::Record {
                record_type: link.linked_record_type().to_owned(),
                record_id: link.linked_record_id().to_owned(),
            }),
            DataElement::ResourceLink(_) => targets.push(LinkTarget::Resource),
            DataElement::Atomic(_) => {}
        }
    }
}

/// Same traversal order as [`collect_link_targets`].
fn apply_read_decorations(group: &mut DataGroup, readable: &mut impl Iterator<Item = bool>) {
    for child in group.children_mut() {
        match child {
            DataElement::Group(child_group) => apply_read_decorations(child_group, readable),
            DataElement::RecordLink(link) => {
                if readable.next().unwrap_or(false) {
                    link.add_action(Action::Read);
                }
            }
            DataElement::ResourceLink(link) => {
                if readable.next().unwrap_or(false) {
                    link.add_action(Action::Read);
                }
            }
            DataElement::Atomic(_) => {}
        }
    }
}
