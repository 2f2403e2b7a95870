use std::sync::Arc;

use archivum_core::{AppError, AppResult};
use archivum_domain::{
    DataGroup, INDEX_BATCH_JOB_ERROR_ID, IndexBatchJob, IndexBatchJobStatus, IndexError,
    pagination_windows,
};
use tracing::{info, warn};

use crate::RecordTypeHandler;
use crate::record_ports::{
    IndexBatchJobStorer, IndexDocument, RecordIndexer, RecordStorage, TermCollector,
};

/// Records read per page when no page size is configured.
pub const DEFAULT_INDEX_PAGE_SIZE: u64 = 1000;

/// Drives one index batch job through every page of its record type.
///
/// The runner takes no lock on the job; callers keep at most one runner
/// active per job id.
#[derive(Clone)]
pub struct IndexBatchJobRunner {
    storage: Arc<dyn RecordStorage>,
    term_collector: Arc<dyn TermCollector>,
    indexer: Arc<dyn RecordIndexer>,
    job_storer: Arc<dyn IndexBatchJobStorer>,
    page_size: u64,
}

impl IndexBatchJobRunner {
    /// Creates a runner reading [`DEFAULT_INDEX_PAGE_SIZE`] records per page.
    #[must_use]
    pub fn new(
        storage: Arc<dyn RecordStorage>,
        term_collector: Arc<dyn TermCollector>,
        indexer: Arc<dyn RecordIndexer>,
        job_storer: Arc<dyn IndexBatchJobStorer>,
    ) -> Self {
        Self {
            storage,
            term_collector,
            indexer,
            job_storer,
            page_size: DEFAULT_INDEX_PAGE_SIZE,
        }
    }

    /// Overrides the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    /// Reindexes every record of the job's type and returns the finished job.
    ///
    /// A job carrying progress from an earlier run resumes after its last
    /// processed record and keeps the errors it already holds.
    ///
    /// Per-record failures become job errors and never stop the run. A failed
    /// page read records one job-level error and finishes the job at once.
    pub async fn run(&self, mut job: IndexBatchJob) -> AppResult<IndexBatchJob> {
        if self.page_size == 0 {
            return Err(AppError::Validation(
                "index batch page size must be greater than zero".to_owned(),
            ));
        }

        let handler =
            match RecordTypeHandler::resolve(self.storage.clone(), &job.record_type_to_index).await
            {
                Ok(handler) => handler,
                Err(error) => return self.stop_with_error(job, error).await,
            };
        let metadata_id = match handler.metadata_id() {
            Ok(metadata_id) => metadata_id.to_owned(),
            Err(error) => return self.stop_with_error(job, error).await,
        };

        // Checkpoints land on page boundaries, so persisted progress is where the next page starts.
        let resume_from = job
            .number_of_processed_records
            .min(job.total_number_to_index);
        job.number_of_processed_records = resume_from;

        info!(
            job_id = %job.id,
            record_type = %job.record_type_to_index,
            total = job.total_number_to_index,
            resume_from,
            page_size = self.page_size,
            "index batch job started"
        );

        let windows = pagination_windows(job.total_number_to_index - resume_from, self.page_size)
            .map(|(from_no, to_no)| (from_no + resume_from, to_no + resume_from));
        for (from_no, to_no) in windows {
            job.filter = job.filter.with_window(from_no, to_no);

            let page = match self
                .storage
                .read_list(&job.record_type_to_index, &job.filter)
                .await
            {
                Ok(page) => page,
                Err(error) => return self.stop_with_error(job, error).await,
            };

            for record in &page.records {
                if let Err(error) = self
                    .index_record(&handler, &job.record_type_to_index, &metadata_id, record)
                    .await
                {
                    let record_id = record.record_id().unwrap_or(INDEX_BATCH_JOB_ERROR_ID);
                    warn!(
                        job_id = %job.id,
                        record_id = %record_id,
                        error = %error,
                        "record indexing failed"
                    );
                    job.errors.push(IndexError::new(record_id, error.to_string()));
                }
                job.number_of_processed_records += 1;
            }

            self.job_storer.store(&job).await?;
            info!(
                job_id = %job.id,
                from_no,
                to_no,
                processed = job.number_of_processed_records,
                "index batch page checkpointed"
            );
        }

        job.status = IndexBatchJobStatus::Finished;
        self.job_storer.store(&job).await?;
        info!(
            job_id = %job.id,
            processed = job.number_of_processed_records,
            errors = job.errors.len(),
            "index batch job finished"
        );

        Ok(job)
    }

    async fn index_record(
        &self,
        handler: &RecordTypeHandler,
        record_type: &str,
        metadata_id: &str,
        record: &DataGroup,
    ) -> AppResult<()> {
        let record_id = record.record_id().ok_or_else(|| {
            AppError::MissingData(format!("record of type '{record_type}' has no recordInfo id"))
        })?;
        let terms = self.term_collector.collect_terms(metadata_id, record).await?;
        let ids = handler.combined_ids_using_record_id(record_id).await?;

        self.indexer
            .index_without_explicit_commit(IndexDocument {
                record_type: record_type.to_owned(),
                record_id: record_id.to_owned(),
                ids,
                index_terms: terms.index_terms,
                data: record.clone(),
            })
            .await
    }

    async fn stop_with_error(
        &self,
        mut job: IndexBatchJob,
        error: AppError,
    ) -> AppResult<IndexBatchJob> {
        warn!(
            job_id = %job.id,
            record_type = %job.record_type_to_index,
            error = %error,
            "index batch job stopped"
        );

        job.errors
            .push(IndexError::new(INDEX_BATCH_JOB_ERROR_ID, error.to_string()));
        job.status = IndexBatchJobStatus::Finished;
        self.job_storer.store(&job).await?;

        Ok(job)
    }
}
