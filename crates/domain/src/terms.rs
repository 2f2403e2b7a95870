use serde::{Deserialize, Serialize};

/// Term used to match permission rules against record content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionTerm {
    /// Collect term definition id.
    pub id: String,
    /// Permission key shared with rule parts.
    pub key: String,
    /// Collected value.
    pub value: String,
}

/// Term submitted to the search indexer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexTerm {
    /// Collect term definition id.
    pub id: String,
    /// Collected value.
    pub value: String,
    /// Indexer field type.
    pub index_type: String,
}

/// Term used by storage for filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTerm {
    /// Collect term definition id.
    pub id: String,
    /// Storage key.
    pub key: String,
    /// Collected value.
    pub value: String,
}

/// Flat term sets extracted from one record payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectTerms {
    /// Terms consulted by authorization.
    pub permission_terms: Vec<PermissionTerm>,
    /// Terms consulted by storage.
    pub storage_terms: Vec<StorageTerm>,
    /// Terms consulted by the indexer.
    pub index_terms: Vec<IndexTerm>,
}
