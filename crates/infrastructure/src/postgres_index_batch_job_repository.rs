use std::str::FromStr;

use archivum_application::IndexBatchJobRepository;
use archivum_core::{AppError, AppResult};
use archivum_domain::{IndexBatchJob, IndexBatchJobStatus, IndexError, ListFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};

/// PostgreSQL-backed index batch job repository.
///
/// Errors are stored one row per entry keyed by `(job_id, repeat_id)` and are
/// only ever inserted.
#[derive(Clone)]
pub struct PostgresIndexBatchJobRepository {
    pool: PgPool,
}

impl PostgresIndexBatchJobRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn errors_for(&self, job_id: &str) -> AppResult<Vec<IndexError>> {
        let rows = sqlx::query_as::<_, IndexErrorRow>(
            r#"
            SELECT repeat_id, record_id, message
            FROM index_batch_job_errors
            WHERE job_id = $1
            ORDER BY repeat_id
            "#,
        )
        .bind(job_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to load errors of index batch job '{job_id}': {error}"
            ))
        })?;

        Ok(rows
            .into_iter()
            .map(|row| IndexError {
                repeat_id: u64::try_from(row.repeat_id).ok(),
                record_id: row.record_id,
                message: row.message,
            })
            .collect())
    }

    async fn job_from_row(&self, row: IndexBatchJobRow) -> AppResult<IndexBatchJob> {
        let errors = self.errors_for(row.id.as_str()).await?;
        let filter: ListFilter = serde_json::from_value(row.filter).map_err(|error| {
            AppError::Internal(format!(
                "failed to decode filter of index batch job '{}': {error}",
                row.id
            ))
        })?;

        Ok(IndexBatchJob {
            status: IndexBatchJobStatus::from_str(row.status.as_str())?,
            record_type_to_index: row.record_type_to_index,
            total_number_to_index: u64::try_from(row.total_number_to_index).unwrap_or_default(),
            number_of_processed_records: u64::try_from(row.number_of_processed_records)
                .unwrap_or_default(),
            filter,
            errors,
            last_checkpoint_at: row.last_checkpoint_at,
            id: row.id,
        })
    }
}

#[derive(Debug, FromRow)]
struct IndexBatchJobRow {
    id: String,
    record_type_to_index: String,
    total_number_to_index: i64,
    number_of_processed_records: i64,
    status: String,
    filter: Value,
    last_checkpoint_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromRow)]
struct IndexErrorRow {
    repeat_id: i64,
    record_id: String,
    message: String,
}

fn to_i64(value: u64, label: &str) -> AppResult<i64> {
    i64::try_from(value)
        .map_err(|error| AppError::Validation(format!("invalid index batch job {label}: {error}")))
}

fn encode_filter(job: &IndexBatchJob) -> AppResult<Value> {
    serde_json::to_value(&job.filter).map_err(|error| {
        AppError::Internal(format!(
            "failed to encode filter of index batch job '{}': {error}",
            job.id
        ))
    })
}

async fn append_errors(
    transaction: &mut Transaction<'_, Postgres>,
    job: &IndexBatchJob,
) -> AppResult<()> {
    for (position, index_error) in job.errors.iter().enumerate() {
        let repeat_id = index_error.repeat_id.unwrap_or(position as u64);

        sqlx::query(
            r#"
            INSERT INTO index_batch_job_errors (job_id, repeat_id, record_id, message)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id, repeat_id) DO NOTHING
            "#,
        )
        .bind(job.id.as_str())
        .bind(to_i64(repeat_id, "error repeat id")?)
        .bind(index_error.record_id.as_str())
        .bind(index_error.message.as_str())
        .execute(&mut **transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to append error to index batch job '{}': {error}",
                job.id
            ))
        })?;
    }

    Ok(())
}

#[async_trait]
impl IndexBatchJobRepository for PostgresIndexBatchJobRepository {
    async fn create_job(&self, job: &IndexBatchJob) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start create transaction for index batch job '{}': {error}",
                job.id
            ))
        })?;

        let result = sqlx::query(
            r#"
            INSERT INTO index_batch_jobs (
                id,
                record_type_to_index,
                total_number_to_index,
                number_of_processed_records,
                status,
                filter,
                last_checkpoint_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job.id.as_str())
        .bind(job.record_type_to_index.as_str())
        .bind(to_i64(job.total_number_to_index, "total")?)
        .bind(to_i64(job.number_of_processed_records, "progress")?)
        .bind(job.status.as_str())
        .bind(encode_filter(job)?)
        .bind(job.last_checkpoint_at)
        .execute(&mut *transaction)
        .await;

        if let Err(error) = result {
            if let sqlx::Error::Database(database_error) = &error
                && database_error.code().as_deref() == Some("23505")
            {
                return Err(AppError::Conflict(format!(
                    "index batch job '{}' already exists",
                    job.id
                )));
            }

            return Err(AppError::Internal(format!(
                "failed to create index batch job '{}': {error}",
                job.id
            )));
        }

        append_errors(&mut transaction, job).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit create transaction for index batch job '{}': {error}",
                job.id
            ))
        })
    }

    async fn find_job(&self, job_id: &str) -> AppResult<Option<IndexBatchJob>> {
        let row = sqlx::query_as::<_, IndexBatchJobRow>(
            r#"
            SELECT
                id,
                record_type_to_index,
                total_number_to_index,
                number_of_processed_records,
                status,
                filter,
                last_checkpoint_at
            FROM index_batch_jobs
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to find index batch job '{job_id}': {error}"))
        })?;

        match row {
            Some(row) => self.job_from_row(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn save_job(&self, job: &IndexBatchJob) -> AppResult<()> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to start save transaction for index batch job '{}': {error}",
                job.id
            ))
        })?;

        let updated = sqlx::query(
            r#"
            UPDATE index_batch_jobs
            SET
                total_number_to_index = $2,
                number_of_processed_records = $3,
                status = $4,
                filter = $5,
                last_checkpoint_at = $6
            WHERE id = $1
            "#,
        )
        .bind(job.id.as_str())
        .bind(to_i64(job.total_number_to_index, "total")?)
        .bind(to_i64(job.number_of_processed_records, "progress")?)
        .bind(job.status.as_str())
        .bind(encode_filter(job)?)
        .bind(job.last_checkpoint_at)
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save index batch job '{}': {error}",
                job.id
            ))
        })?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("index batch job '{}'", job.id)));
        }

        append_errors(&mut transaction, job).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!(
                "failed to commit save transaction for index batch job '{}': {error}",
                job.id
            ))
        })
    }

    async fn list_jobs_with_status(
        &self,
        status: IndexBatchJobStatus,
    ) -> AppResult<Vec<IndexBatchJob>> {
        let rows = sqlx::query_as::<_, IndexBatchJobRow>(
            r#"
            SELECT
                id,
                record_type_to_index,
                total_number_to_index,
                number_of_processed_records,
                status,
                filter,
                last_checkpoint_at
            FROM index_batch_jobs
            WHERE status = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to list {} index batch jobs: {error}",
                status.as_str()
            ))
        })?;

        let mut jobs = Vec::with_capacity(rows.len());
        for row in rows {
            jobs.push(self.job_from_row(row).await?);
        }

        Ok(jobs)
    }
}
