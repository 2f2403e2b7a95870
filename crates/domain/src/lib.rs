//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod action;
mod constraint;
mod data;
mod decision;
mod index_batch_job;
pub mod record_type;
mod security;
mod terms;

pub use action::Action;
pub use constraint::{
    Constraint, ConstraintAttribute, RecordPartConstraintMarking, RecordPartConstraints,
};
pub use data::{DataAtomic, DataElement, DataGroup, DataRecordLink, DataResourceLink};
pub use decision::ActionDecision;
pub use index_batch_job::{
    FilterCondition, INDEX_BATCH_JOB_ERROR_ID, IndexBatchJob, IndexBatchJobStatus, IndexError,
    ListFilter, pagination_windows,
};
pub use security::{PermissionRule, PermissionTermRulePart};
pub use terms::{CollectTerms, IndexTerm, PermissionTerm, StorageTerm};
