use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use archivum_core::{AppError, AppResult, UserIdentity};
use archivum_domain::{Action, PermissionRule, PermissionTerm, PermissionTermRulePart};
use async_trait::async_trait;

use crate::record_ports::{Authorizer, PermissionRuleRepository};

use super::AuthorizationService;

struct FakePermissionRuleRepository {
    map: HashMap<String, Vec<PermissionRule>>,
}

#[async_trait]
impl PermissionRuleRepository for FakePermissionRuleRepository {
    async fn list_rules_for_subject(&self, subject: &str) -> AppResult<Vec<PermissionRule>> {
        Ok(self.map.get(subject).cloned().unwrap_or_default())
    }
}

fn service(rules: Vec<PermissionRule>) -> AuthorizationService {
    AuthorizationService::new(Arc::new(FakePermissionRuleRepository {
        map: HashMap::from([("alice".to_owned(), rules)]),
    }))
}

fn alice() -> UserIdentity {
    UserIdentity::new("alice", "Alice", Some("alice@example.org".to_owned()))
}

fn book_rule(actions: &[Action]) -> PermissionRule {
    PermissionRule {
        actions: actions.iter().copied().collect(),
        record_types: BTreeSet::from(["book".to_owned()]),
        ..PermissionRule::default()
    }
}

fn organisation_term(value: &str) -> PermissionTerm {
    PermissionTerm {
        id: "organisationPermissionTerm".to_owned(),
        key: "permissionKey.organisation".to_owned(),
        value: value.to_owned(),
    }
}

fn uu_rule() -> PermissionRule {
    PermissionRule {
        term_rule_parts: vec![PermissionTermRulePart {
            key: "permissionKey.organisation".to_owned(),
            values: vec!["system.uu.*".to_owned()],
        }],
        read_record_parts: BTreeSet::from(["book.title".to_owned()]),
        write_record_parts: BTreeSet::from(["book.isbn".to_owned()]),
        ..book_rule(&[Action::Read, Action::Update])
    }
}

#[tokio::test]
async fn type_predicate_grants_covered_action() {
    let service = service(vec![book_rule(&[Action::Read, Action::Create])]);

    let result = service
        .is_authorized_for_action_on_record_type(&alice(), Action::Create, "book")
        .await;
    assert_eq!(result.ok(), Some(true));

    let result = service
        .is_authorized_for_action_on_record_type(&alice(), Action::Delete, "book")
        .await;
    assert_eq!(result.ok(), Some(false));
}

#[tokio::test]
async fn unknown_subject_is_never_authorized() {
    let service = service(vec![book_rule(&[Action::Read])]);
    let bob = UserIdentity::new("bob", "Bob", None);

    let result = service
        .is_authorized_for_action_on_record_type(&bob, Action::Read, "book")
        .await;
    assert_eq!(result.ok(), Some(false));
}

#[tokio::test]
async fn inactive_user_is_never_authorized() {
    let service = service(vec![book_rule(&[Action::Read])]);

    let result = service
        .is_authorized_for_action_on_record_type(&alice().deactivated(), Action::Read, "book")
        .await;
    assert_eq!(result.ok(), Some(false));
}

#[tokio::test]
async fn data_predicate_requires_matching_terms() {
    let service = service(vec![uu_rule()]);

    let matching = service
        .is_authorized_for_action_on_record_type_and_collected_data(
            &alice(),
            Action::Read,
            "book",
            &[organisation_term("system.uu.ub")],
        )
        .await;
    assert_eq!(matching.ok(), Some(true));

    let other = service
        .is_authorized_for_action_on_record_type_and_collected_data(
            &alice(),
            Action::Read,
            "book",
            &[organisation_term("system.kth")],
        )
        .await;
    assert_eq!(other.ok(), Some(false));
}

#[tokio::test]
async fn checked_variants_fail_with_unauthorized() {
    let service = service(vec![uu_rule()]);

    let allowed = service
        .check_authorized_for_action_on_record_type(&alice(), Action::Read, "book")
        .await;
    assert!(allowed.is_ok());

    let denied = service
        .check_authorized_for_action_on_record_type(&alice(), Action::Delete, "book")
        .await;
    assert!(matches!(denied, Err(AppError::Unauthorized(_))));

    let denied_on_data = service
        .check_authorized_for_action_on_record_type_and_collected_data(
            &alice(),
            Action::Read,
            "book",
            &[],
        )
        .await;
    assert!(matches!(denied_on_data, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn record_part_permissions_follow_action() {
    let service = service(vec![uu_rule()]);
    let terms = [organisation_term("system.uu.ub")];

    let read = service
        .matched_record_part_permissions(&alice(), Action::Read, "book", &terms, true)
        .await;
    assert_eq!(read.ok(), Some(BTreeSet::from(["book.title".to_owned()])));

    let update = service
        .matched_record_part_permissions(&alice(), Action::Update, "book", &terms, true)
        .await;
    assert_eq!(update.ok(), Some(BTreeSet::from(["book.isbn".to_owned()])));
}

#[tokio::test]
async fn record_part_permissions_are_empty_without_constraints() {
    let service = service(vec![uu_rule()]);

    let result = service
        .matched_record_part_permissions(
            &alice(),
            Action::Read,
            "book",
            &[organisation_term("system.uu.ub")],
            false,
        )
        .await;
    assert_eq!(result.ok(), Some(BTreeSet::new()));
}

#[tokio::test]
async fn record_part_permissions_fail_without_matching_rule() {
    let service = service(vec![uu_rule()]);

    let result = service
        .matched_record_part_permissions(
            &alice(),
            Action::Read,
            "book",
            &[organisation_term("system.kth")],
            true,
        )
        .await;
    assert!(matches!(result, Err(AppError::Unauthorized(_))));
}

#[tokio::test]
async fn record_part_permissions_union_matching_rules() {
    let broad = PermissionRule {
        read_record_parts: BTreeSet::from(["book.note".to_owned()]),
        ..book_rule(&[Action::Read])
    };
    let service = service(vec![uu_rule(), broad]);

    let result = service
        .matched_record_part_permissions(
            &alice(),
            Action::Read,
            "book",
            &[organisation_term("system.uu.ub")],
            true,
        )
        .await;
    assert_eq!(
        result.ok(),
        Some(BTreeSet::from([
            "book.note".to_owned(),
            "book.title".to_owned(),
        ]))
    );
}
