//! Application services and ports.

#![forbid(unsafe_code)]

mod authorization_service;
mod index_batch_job_storer;
mod index_batch_runner;
mod metadata_reader;
mod metadata_term_collector;
mod record_enhancer;
mod record_ports;
mod record_type_handler;

#[cfg(test)]
mod test_fixtures;

pub use authorization_service::AuthorizationService;
pub use index_batch_job_storer::RepositoryIndexBatchJobStorer;
pub use index_batch_runner::{DEFAULT_INDEX_PAGE_SIZE, IndexBatchJobRunner};
pub use metadata_term_collector::MetadataTermCollector;
pub use record_enhancer::RecordEnhancer;
pub use record_ports::{
    Authorizer, IndexBatchJobLease, IndexBatchJobLeaseCoordinator, IndexBatchJobRepository,
    IndexBatchJobStorer, IndexDocument, PermissionRuleRepository, RecordIndexer, RecordStorage,
    StorageReadResult, TermCollector,
};
pub use record_type_handler::RecordTypeHandler;
