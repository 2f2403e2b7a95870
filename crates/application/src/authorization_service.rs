use std::collections::BTreeSet;
use std::sync::Arc;

use archivum_core::{AppError, AppResult, UserIdentity};
use archivum_domain::{Action, PermissionRule, PermissionTerm};
use async_trait::async_trait;

use crate::record_ports::{Authorizer, PermissionRuleRepository};

/// Rule-based authorizer over subject permission rules.
#[derive(Clone)]
pub struct AuthorizationService {
    repository: Arc<dyn PermissionRuleRepository>,
}

impl AuthorizationService {
    /// Creates a new authorization service from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn PermissionRuleRepository>) -> Self {
        Self { repository }
    }

    async fn rules_for(&self, user: &UserIdentity) -> AppResult<Vec<PermissionRule>> {
        if !user.is_active() {
            return Ok(Vec::new());
        }

        self.repository.list_rules_for_subject(user.subject()).await
    }

    async fn matching_rules(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
    ) -> AppResult<Vec<PermissionRule>> {
        Ok(self
            .rules_for(user)
            .await?
            .into_iter()
            .filter(|rule| rule.covers_data(action, record_type, permission_terms))
            .collect())
    }
}

fn unauthorized(user: &UserIdentity, action: Action, record_type: &str) -> AppError {
    AppError::Unauthorized(format!(
        "subject '{}' is not authorized to {} on record type '{record_type}'",
        user.subject(),
        action.as_str()
    ))
}

#[async_trait]
impl Authorizer for AuthorizationService {
    async fn is_authorized_for_action_on_record_type(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
    ) -> AppResult<bool> {
        Ok(self
            .rules_for(user)
            .await?
            .iter()
            .any(|rule| rule.covers(action, record_type)))
    }

    async fn is_authorized_for_action_on_record_type_and_collected_data(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
    ) -> AppResult<bool> {
        Ok(!self
            .matching_rules(user, action, record_type, permission_terms)
            .await?
            .is_empty())
    }

    async fn check_authorized_for_action_on_record_type(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
    ) -> AppResult<()> {
        if self
            .is_authorized_for_action_on_record_type(user, action, record_type)
            .await?
        {
            return Ok(());
        }

        Err(unauthorized(user, action, record_type))
    }

    async fn check_authorized_for_action_on_record_type_and_collected_data(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
    ) -> AppResult<()> {
        if self
            .is_authorized_for_action_on_record_type_and_collected_data(
                user,
                action,
                record_type,
                permission_terms,
            )
            .await?
        {
            return Ok(());
        }

        Err(unauthorized(user, action, record_type))
    }

    async fn matched_record_part_permissions(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
        calculate_record_part_permissions: bool,
    ) -> AppResult<BTreeSet<String>> {
        let rules = self
            .matching_rules(user, action, record_type, permission_terms)
            .await?;

        if rules.is_empty() {
            return Err(unauthorized(user, action, record_type));
        }

        if !calculate_record_part_permissions {
            return Ok(BTreeSet::new());
        }

        Ok(rules
            .into_iter()
            .flat_map(|rule| match action {
                Action::Read => rule.read_record_parts,
                _ => rule.write_record_parts,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests;
