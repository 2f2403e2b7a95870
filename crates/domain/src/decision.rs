use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{Action, DataGroup};

/// Outcome of enhancing one record for one user.
///
/// `data` is a copy of the input payload in which every readable link
/// carries [`Action::Read`]; the input itself is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDecision {
    /// Record type the decision was computed for.
    pub record_type: String,
    /// Decorated record payload.
    pub data: DataGroup,
    /// Actions the user may perform on the record.
    pub actions: BTreeSet<Action>,
    /// Record-part permission keys matched while probing read access.
    pub read_record_part_permissions: BTreeSet<String>,
    /// Record-part permission keys matched while probing update access.
    pub write_record_part_permissions: BTreeSet<String>,
}

impl ActionDecision {
    /// Returns whether the decision grants the action.
    #[must_use]
    pub fn allows(&self, action: Action) -> bool {
        self.actions.contains(&action)
    }
}
