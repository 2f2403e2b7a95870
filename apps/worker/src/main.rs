//! Archivum reindex worker runtime.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use archivum_application::{
    IndexBatchJobLease, IndexBatchJobLeaseCoordinator, IndexBatchJobRepository,
    IndexBatchJobRunner, MetadataTermCollector, RepositoryIndexBatchJobStorer,
};
use archivum_core::{AppError, AppResult};
use archivum_domain::{IndexBatchJob, IndexBatchJobStatus};
use archivum_infrastructure::{
    HttpRecordIndexer, PostgresIndexBatchJobRepository, PostgresRecordStorage,
    RedisIndexBatchJobLeaseCoordinator,
};

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    redis_url: String,
    indexer_base_url: String,
    worker_id: String,
    page_size: u64,
    lease_seconds: u32,
    poll_interval_ms: u64,
    indexer_timeout_seconds: u64,
    indexer_max_attempts: u8,
    indexer_retry_backoff_ms: u64,
}

struct Worker {
    config: WorkerConfig,
    repository: Arc<dyn IndexBatchJobRepository>,
    lease_coordinator: Arc<dyn IndexBatchJobLeaseCoordinator>,
    runner: IndexBatchJobRunner,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    sqlx::migrate!("../../crates/infrastructure/migrations")
        .run(&pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to run migrations: {error}")))?;

    let worker = Worker::build(config, pool)?;

    info!(
        worker_id = %worker.config.worker_id,
        indexer_base_url = %worker.config.indexer_base_url,
        page_size = worker.config.page_size,
        lease_seconds = worker.config.lease_seconds,
        poll_interval_ms = worker.config.poll_interval_ms,
        "archivum-worker started"
    );

    loop {
        match worker
            .repository
            .list_jobs_with_status(IndexBatchJobStatus::Started)
            .await
        {
            Ok(jobs) => {
                if !jobs.is_empty() {
                    info!(
                        worker_id = %worker.config.worker_id,
                        started_count = jobs.len(),
                        "found started index batch jobs"
                    );
                }

                for job in jobs {
                    worker.run_leased(job).await;
                }
            }
            Err(error) => {
                warn!(
                    worker_id = %worker.config.worker_id,
                    error = %error,
                    "failed to list started index batch jobs"
                );
            }
        }

        tokio::time::sleep(Duration::from_millis(worker.config.poll_interval_ms)).await;
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl Worker {
    fn build(config: WorkerConfig, pool: PgPool) -> AppResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.indexer_timeout_seconds))
            .build()
            .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
        let redis_client = redis::Client::open(config.redis_url.as_str())
            .map_err(|error| AppError::Validation(format!("invalid REDIS_URL: {error}")))?;

        let storage = Arc::new(PostgresRecordStorage::new(pool.clone()));
        let repository = Arc::new(PostgresIndexBatchJobRepository::new(pool));
        let runner = IndexBatchJobRunner::new(
            storage.clone(),
            Arc::new(MetadataTermCollector::new(storage)),
            Arc::new(HttpRecordIndexer::new(
                http_client,
                config.indexer_base_url.as_str(),
                config.indexer_max_attempts,
                config.indexer_retry_backoff_ms,
            )),
            Arc::new(RepositoryIndexBatchJobStorer::new(repository.clone())),
        )
        .with_page_size(config.page_size);

        Ok(Self {
            config,
            repository,
            lease_coordinator: Arc::new(RedisIndexBatchJobLeaseCoordinator::new(
                redis_client,
                "archivum:index_batch_job_lease",
            )),
            runner,
        })
    }

    async fn run_leased(&self, job: IndexBatchJob) {
        let job_id = job.id.clone();
        let lease = match self
            .lease_coordinator
            .try_acquire_lease(
                job_id.as_str(),
                self.config.worker_id.as_str(),
                self.config.lease_seconds,
            )
            .await
        {
            Ok(Some(lease)) => lease,
            Ok(None) => return,
            Err(error) => {
                warn!(
                    worker_id = %self.config.worker_id,
                    job_id = %job_id,
                    error = %error,
                    "failed to acquire index batch job lease"
                );
                return;
            }
        };

        // The listed snapshot predates the lease; another worker may have advanced or finished it.
        let job = match reload_started(self.repository.as_ref(), job_id.as_str()).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                info!(
                    worker_id = %self.config.worker_id,
                    job_id = %job_id,
                    "index batch job no longer started, skipping"
                );
                self.release(&lease).await;
                return;
            }
            Err(error) => {
                warn!(
                    worker_id = %self.config.worker_id,
                    job_id = %job_id,
                    error = %error,
                    "failed to reload index batch job"
                );
                self.release(&lease).await;
                return;
            }
        };

        let renewal = spawn_lease_renewal(
            self.lease_coordinator.clone(),
            lease.clone(),
            self.config.lease_seconds,
        );

        match self.runner.run(job).await {
            Ok(finished) => {
                info!(
                    worker_id = %self.config.worker_id,
                    job_id = %job_id,
                    processed = finished.number_of_processed_records,
                    errors = finished.errors.len(),
                    "index batch job run completed"
                );
            }
            Err(error) => {
                warn!(
                    worker_id = %self.config.worker_id,
                    job_id = %job_id,
                    error = %error,
                    "index batch job run failed"
                );
            }
        }

        renewal.abort();
        self.release(&lease).await;
    }

    async fn release(&self, lease: &IndexBatchJobLease) {
        if let Err(error) = self.lease_coordinator.release_lease(lease).await {
            warn!(
                worker_id = %self.config.worker_id,
                job_id = %lease.job_id,
                error = %error,
                "failed to release index batch job lease"
            );
        }
    }
}

async fn reload_started(
    repository: &dyn IndexBatchJobRepository,
    job_id: &str,
) -> AppResult<Option<IndexBatchJob>> {
    Ok(repository
        .find_job(job_id)
        .await?
        .filter(|job| job.status == IndexBatchJobStatus::Started))
}

fn renewal_interval(lease_seconds: u32) -> Duration {
    Duration::from_secs(u64::from((lease_seconds / 3).max(1)))
}

fn spawn_lease_renewal(
    lease_coordinator: Arc<dyn IndexBatchJobLeaseCoordinator>,
    lease: IndexBatchJobLease,
    lease_seconds: u32,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(renewal_interval(lease_seconds));
        interval.tick().await;

        loop {
            interval.tick().await;
            match lease_coordinator.renew_lease(&lease, lease_seconds).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(
                        job_id = %lease.job_id,
                        holder_id = %lease.holder_id,
                        "index batch job lease lost"
                    );
                    return;
                }
                Err(error) => {
                    warn!(
                        job_id = %lease.job_id,
                        error = %error,
                        "failed to renew index batch job lease"
                    );
                }
            }
        }
    })
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let redis_url = required_env("REDIS_URL")?;
        let indexer_base_url = required_env("INDEXER_BASE_URL")?
            .trim_end_matches('/')
            .to_owned();
        let worker_id = env::var("WORKER_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()));
        let page_size = parse_env_u64("INDEX_BATCH_PAGE_SIZE", 1000)?;
        let lease_seconds = parse_env_u32("WORKER_LEASE_SECONDS", 60)?;
        let poll_interval_ms = parse_env_u64("WORKER_POLL_INTERVAL_MS", 5000)?;
        let indexer_timeout_seconds = parse_env_u64("INDEXER_TIMEOUT_SECONDS", 15)?;
        let indexer_max_attempts = parse_env_u8("INDEXER_MAX_ATTEMPTS", 3)?;
        let indexer_retry_backoff_ms = parse_env_u64("INDEXER_RETRY_BACKOFF_MS", 250)?;

        for (name, value) in [
            ("INDEX_BATCH_PAGE_SIZE", page_size),
            ("WORKER_LEASE_SECONDS", u64::from(lease_seconds)),
            ("WORKER_POLL_INTERVAL_MS", poll_interval_ms),
            ("INDEXER_TIMEOUT_SECONDS", indexer_timeout_seconds),
            ("INDEXER_MAX_ATTEMPTS", u64::from(indexer_max_attempts)),
        ] {
            if value == 0 {
                return Err(AppError::Validation(format!(
                    "{name} must be greater than zero"
                )));
            }
        }

        Ok(Self {
            database_url,
            redis_url,
            indexer_base_url,
            worker_id,
            page_size,
            lease_seconds,
            poll_interval_ms,
            indexer_timeout_seconds,
            indexer_max_attempts,
            indexer_retry_backoff_ms,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u8(name: &str, default: u8) -> AppResult<u8> {
    match env::var(name) {
        Ok(value) => value.parse::<u8>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
