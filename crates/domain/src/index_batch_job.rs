use std::str::FromStr;

use archivum_core::{AppError, AppResult, NonEmptyString};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record id used for index errors that are not tied to one record.
pub const INDEX_BATCH_JOB_ERROR_ID: &str = "IndexBatchJobRunner";

/// Lifecycle state of a reindex job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBatchJobStatus {
    /// Job is running or waiting for a runner.
    Started,
    /// Job was paused from outside the runner.
    Paused,
    /// Job completed or stopped on a fatal error.
    Finished,
}

impl IndexBatchJobStatus {
    /// Returns a stable storage value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Started => "started",
            Self::Paused => "paused",
            Self::Finished => "finished",
        }
    }
}

impl FromStr for IndexBatchJobStatus {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "started" => Ok(Self::Started),
            "paused" => Ok(Self::Paused),
            "finished" => Ok(Self::Finished),
            _ => Err(AppError::Validation(format!(
                "unknown index batch job status '{value}'"
            ))),
        }
    }
}

/// Exact-match condition on a top-level atomic child.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Child name.
    pub name_in_data: String,
    /// Expected value.
    pub value: String,
}

/// Filter and 1-based inclusive window for record list reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListFilter {
    /// First row number, 1-based.
    pub from_no: Option<u64>,
    /// Last row number, inclusive.
    pub to_no: Option<u64>,
    /// Conditions combined with logical AND.
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
}

impl ListFilter {
    /// Returns a copy restricted to the window `[from_no, to_no]`.
    #[must_use]
    pub fn with_window(&self, from_no: u64, to_no: u64) -> Self {
        Self {
            from_no: Some(from_no),
            to_no: Some(to_no),
            conditions: self.conditions.clone(),
        }
    }
}

/// Failure recorded while reindexing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexError {
    /// Position in the persisted error list, assigned on first persist.
    pub repeat_id: Option<u64>,
    /// Failing record id, or [`INDEX_BATCH_JOB_ERROR_ID`].
    pub record_id: String,
    /// Failure description.
    pub message: String,
}

impl IndexError {
    /// Creates an unpersisted error entry.
    #[must_use]
    pub fn new(record_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            repeat_id: None,
            record_id: record_id.into(),
            message: message.into(),
        }
    }
}

/// Progress document for reindexing every record of one type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexBatchJob {
    /// Stable job id.
    pub id: String,
    /// Record type whose records are reindexed.
    pub record_type_to_index: String,
    /// Number of records matched when the job was created.
    pub total_number_to_index: u64,
    /// Records handled so far, failed ones included.
    pub number_of_processed_records: u64,
    /// Lifecycle state.
    pub status: IndexBatchJobStatus,
    /// Record filter; the runner rewrites its window per page.
    pub filter: ListFilter,
    /// Ordered failures.
    pub errors: Vec<IndexError>,
    /// Time of the last persisted checkpoint.
    pub last_checkpoint_at: Option<DateTime<Utc>>,
}

impl IndexBatchJob {
    /// Creates a started job with no progress.
    pub fn new(
        record_type_to_index: impl Into<String>,
        total_number_to_index: u64,
        filter: ListFilter,
    ) -> AppResult<Self> {
        let record_type_to_index = NonEmptyString::new(record_type_to_index)?;

        Ok(Self {
            id: Uuid::new_v4().to_string(),
            record_type_to_index: record_type_to_index.into(),
            total_number_to_index,
            number_of_processed_records: 0,
            status: IndexBatchJobStatus::Started,
            filter,
            errors: Vec::new(),
            last_checkpoint_at: None,
        })
    }
}

/// Yields inclusive 1-based windows `[1 + k*P, min((k+1)*P, total)]` covering `1..=total`.
///
/// A zero page size is treated as one.
pub fn pagination_windows(total: u64, page_size: u64) -> impl Iterator<Item = (u64, u64)> {
    let step = page_size.max(1);

    (0_u64..)
        .map_while(move |page| page.checked_mul(step)?.checked_add(1))
        .take_while(move |from_no| *from_no <= total)
        .map(move |from_no| (from_no, from_no.saturating_add(step - 1).min(total)))
}
