use archivum_core::AppResult;
use archivum_domain::{IndexBatchJob, IndexBatchJobStatus};
use async_trait::async_trait;

/// Repository port for persisted index batch jobs.
#[async_trait]
pub trait IndexBatchJobRepository: Send + Sync {
    /// Persists a new job.
    async fn create_job(&self, job: &IndexBatchJob) -> AppResult<()>;

    /// Returns one job by id.
    async fn find_job(&self, job_id: &str) -> AppResult<Option<IndexBatchJob>>;

    /// Replaces the job document. Errors already stored are never rewritten.
    async fn save_job(&self, job: &IndexBatchJob) -> AppResult<()>;

    /// Lists jobs in the given status.
    async fn list_jobs_with_status(
        &self,
        status: IndexBatchJobStatus,
    ) -> AppResult<Vec<IndexBatchJob>>;
}

/// Checkpoint port used by the batch runner.
#[async_trait]
pub trait IndexBatchJobStorer: Send + Sync {
    /// Merges the runner's progress into the persisted job.
    async fn store(&self, job: &IndexBatchJob) -> AppResult<()>;
}
