use std::collections::HashMap;

use archivum_application::IndexBatchJobRepository;
use archivum_core::{AppError, AppResult};
use archivum_domain::{IndexBatchJob, IndexBatchJobStatus};
use async_trait::async_trait;
use tokio::sync::RwLock;

/// In-memory index batch job repository.
#[derive(Debug, Default)]
pub struct InMemoryIndexBatchJobRepository {
    jobs: RwLock<HashMap<String, IndexBatchJob>>,
}

impl InMemoryIndexBatchJobRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexBatchJobRepository for InMemoryIndexBatchJobRepository {
    async fn create_job(&self, job: &IndexBatchJob) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job.id.as_str()) {
            return Err(AppError::Conflict(format!(
                "index batch job '{}' already exists",
                job.id
            )));
        }

        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    async fn find_job(&self, job_id: &str) -> AppResult<Option<IndexBatchJob>> {
        Ok(self.jobs.read().await.get(job_id).cloned())
    }

    async fn save_job(&self, job: &IndexBatchJob) -> AppResult<()> {
        let mut jobs = self.jobs.write().await;
        let stored = jobs
            .get_mut(job.id.as_str())
            .ok_or_else(|| AppError::NotFound(format!("index batch job '{}'", job.id)))?;

        let persisted_errors = stored.errors.len().min(job.errors.len());
        let mut errors = std::mem::take(&mut stored.errors);
        errors.extend(job.errors.iter().skip(persisted_errors).cloned());

        *stored = IndexBatchJob {
            errors,
            ..job.clone()
        };
        Ok(())
    }

    async fn list_jobs_with_status(
        &self,
        status: IndexBatchJobStatus,
    ) -> AppResult<Vec<IndexBatchJob>> {
        let mut jobs: Vec<IndexBatchJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|job| job.status == status)
            .cloned()
            .collect();
        jobs.sort_by(|left, right| left.id.cmp(&right.id));

        Ok(jobs)
    }
}
