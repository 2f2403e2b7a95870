use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Action, PermissionTerm};

/// Condition on collected permission terms that a rule requires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTermRulePart {
    /// Permission key matched against collected terms.
    pub key: String,
    /// Accepted values. A value ending in `*` matches by prefix.
    pub values: Vec<String>,
}

impl PermissionTermRulePart {
    /// Returns whether any collected term satisfies this part.
    #[must_use]
    pub fn is_satisfied_by(&self, terms: &[PermissionTerm]) -> bool {
        terms
            .iter()
            .filter(|term| term.key == self.key)
            .any(|term| self.values.iter().any(|value| value_matches(value, &term.value)))
    }
}

fn value_matches(rule_value: &str, collected: &str) -> bool {
    match rule_value.strip_suffix('*') {
        Some(prefix) => collected.starts_with(prefix),
        None => rule_value == collected,
    }
}

/// One permission rule assigned to a subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Actions the rule grants.
    pub actions: BTreeSet<Action>,
    /// Record types the rule covers.
    pub record_types: BTreeSet<String>,
    /// Conditions on record content, all of which must hold.
    pub term_rule_parts: Vec<PermissionTermRulePart>,
    /// Record-part permission keys granted for reading.
    pub read_record_parts: BTreeSet<String>,
    /// Record-part permission keys granted for writing.
    pub write_record_parts: BTreeSet<String>,
}

impl PermissionRule {
    /// Returns whether the rule covers the action on the record type.
    #[must_use]
    pub fn covers(&self, action: Action, record_type: &str) -> bool {
        self.actions.contains(&action) && self.record_types.contains(record_type)
    }

    /// Returns whether the rule covers the action on the record type for the collected terms.
    #[must_use]
    pub fn covers_data(&self, action: Action, record_type: &str, terms: &[PermissionTerm]) -> bool {
        self.covers(action, record_type)
            && self
                .term_rule_parts
                .iter()
                .all(|part| part.is_satisfied_by(terms))
    }
}
