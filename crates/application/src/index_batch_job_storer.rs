use std::sync::Arc;

use archivum_core::{AppError, AppResult};
use archivum_domain::{IndexBatchJob, IndexBatchJobStatus, IndexError};
use async_trait::async_trait;
use chrono::Utc;

use crate::record_ports::{IndexBatchJobRepository, IndexBatchJobStorer};

/// Checkpoint storer merging runner progress into the persisted job.
#[derive(Clone)]
pub struct RepositoryIndexBatchJobStorer {
    repository: Arc<dyn IndexBatchJobRepository>,
}

impl RepositoryIndexBatchJobStorer {
    /// Creates a new storer from a repository implementation.
    #[must_use]
    pub fn new(repository: Arc<dyn IndexBatchJobRepository>) -> Self {
        Self { repository }
    }
}

#[async_trait]
impl IndexBatchJobStorer for RepositoryIndexBatchJobStorer {
    /// Progress only grows, stored errors keep their repeat ids, and a status
    /// set from outside survives until the runner reports completion.
    async fn store(&self, job: &IndexBatchJob) -> AppResult<()> {
        let mut persisted = self
            .repository
            .find_job(job.id.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("index batch job '{}'", job.id)))?;

        persisted.number_of_processed_records = persisted
            .number_of_processed_records
            .max(job.number_of_processed_records);

        if job.status == IndexBatchJobStatus::Finished {
            persisted.status = IndexBatchJobStatus::Finished;
        }

        let persisted_errors = persisted.errors.len();
        persisted.errors.extend(
            job.errors
                .iter()
                .skip(persisted_errors)
                .enumerate()
                .map(|(offset, error)| IndexError {
                    repeat_id: Some((persisted_errors + offset) as u64),
                    ..error.clone()
                }),
        );
        persisted.last_checkpoint_at = Some(Utc::now());

        self.repository.save_job(&persisted).await
    }
}
