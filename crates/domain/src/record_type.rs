//! Reserved record type identifiers.

/// Record type whose records define record types.
pub const RECORD_TYPE_RECORD_TYPE: &str = "recordType";

/// Record type whose records define searches.
pub const SEARCH_RECORD_TYPE: &str = "search";

/// Parent type of every record type holding binary streams.
pub const BINARY_RECORD_TYPE: &str = "binary";

/// Record type consulted for resource link read access.
pub const IMAGE_RECORD_TYPE: &str = "image";

/// Record type holding metadata definitions.
pub const METADATA_RECORD_TYPE: &str = "metadata";

/// Record type holding collect term definitions.
pub const COLLECT_TERM_RECORD_TYPE: &str = "collectTerm";
