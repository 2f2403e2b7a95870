use std::collections::BTreeSet;

use archivum_core::{AppResult, UserIdentity};
use archivum_domain::{Action, PermissionRule, PermissionTerm};
use async_trait::async_trait;

/// Authorization port consulted by record services.
///
/// Boolean predicates answer informational questions; `check_*` variants fail
/// with `AppError::Unauthorized` and guard hard entry points.
#[async_trait]
pub trait Authorizer: Send + Sync {
    /// Returns whether the user may perform the action on the record type.
    async fn is_authorized_for_action_on_record_type(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
    ) -> AppResult<bool>;

    /// Returns whether the user may perform the action on a record with the collected terms.
    async fn is_authorized_for_action_on_record_type_and_collected_data(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
    ) -> AppResult<bool>;

    /// Fails unless the user may perform the action on the record type.
    async fn check_authorized_for_action_on_record_type(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
    ) -> AppResult<()>;

    /// Fails unless the user may perform the action on a record with the collected terms.
    async fn check_authorized_for_action_on_record_type_and_collected_data(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
    ) -> AppResult<()>;

    /// Returns the record-part permission keys the user holds for the action,
    /// failing when the user may not perform the action at all.
    async fn matched_record_part_permissions(
        &self,
        user: &UserIdentity,
        action: Action,
        record_type: &str,
        permission_terms: &[PermissionTerm],
        calculate_record_part_permissions: bool,
    ) -> AppResult<BTreeSet<String>>;
}

/// Repository port for permission rules.
#[async_trait]
pub trait PermissionRuleRepository: Send + Sync {
    /// Lists the rules assigned to a subject.
    async fn list_rules_for_subject(&self, subject: &str) -> AppResult<Vec<PermissionRule>>;
}
