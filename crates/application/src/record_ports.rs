mod authorization;
mod batch_jobs;
mod indexer;
mod lease;
mod storage;
mod terms;

pub use authorization::{Authorizer, PermissionRuleRepository};
pub use batch_jobs::{IndexBatchJobRepository, IndexBatchJobStorer};
pub use indexer::{IndexDocument, RecordIndexer};
pub use lease::{IndexBatchJobLease, IndexBatchJobLeaseCoordinator};
pub use storage::{RecordStorage, StorageReadResult};
pub use terms::TermCollector;
