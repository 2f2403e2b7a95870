use std::str::FromStr;

use archivum_core::AppError;
use serde::{Deserialize, Serialize};

/// Capabilities attachable to a record or link for the current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Read the record.
    Read,
    /// Update the record.
    Update,
    /// Delete the record.
    Delete,
    /// Index the record for search.
    Index,
    /// Create records of the described type.
    Create,
    /// List records of the described type.
    List,
    /// Validate records of the described type.
    Validate,
    /// Run a search.
    Search,
    /// Upload a binary stream.
    Upload,
    /// Read links pointing at the record.
    ReadIncomingLinks,
}

impl Action {
    /// Returns a stable storage value for this action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Index => "index",
            Self::Create => "create",
            Self::List => "list",
            Self::Validate => "validate",
            Self::Search => "search",
            Self::Upload => "upload",
            Self::ReadIncomingLinks => "read_incoming_links",
        }
    }

    /// Returns all known actions.
    #[must_use]
    pub fn all() -> &'static [Self] {
        const ALL: &[Action] = &[
            Action::Read,
            Action::Update,
            Action::Delete,
            Action::Index,
            Action::Create,
            Action::List,
            Action::Validate,
            Action::Search,
            Action::Upload,
            Action::ReadIncomingLinks,
        ];

        ALL
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|action| action.as_str() == value)
            .ok_or_else(|| AppError::Validation(format!("unknown action value '{value}'")))
    }
}
