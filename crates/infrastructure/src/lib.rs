//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod http_record_indexer;
mod in_memory_index_batch_job_repository;
mod in_memory_record_storage;
mod postgres_index_batch_job_repository;
mod postgres_permission_rule_repository;
mod postgres_record_storage;
mod record_storage_support;
mod redis_index_batch_job_lease_coordinator;

pub use http_record_indexer::HttpRecordIndexer;
pub use in_memory_index_batch_job_repository::InMemoryIndexBatchJobRepository;
pub use in_memory_record_storage::InMemoryRecordStorage;
pub use postgres_index_batch_job_repository::PostgresIndexBatchJobRepository;
pub use postgres_permission_rule_repository::PostgresPermissionRuleRepository;
pub use postgres_record_storage::PostgresRecordStorage;
pub use redis_index_batch_job_lease_coordinator::RedisIndexBatchJobLeaseCoordinator;
