//! Redis-backed lease coordinator keeping one runner per index batch job.

use archivum_application::{IndexBatchJobLease, IndexBatchJobLeaseCoordinator};
use archivum_core::{AppError, AppResult};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Script};

const RELEASE_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('DEL', KEYS[1])
else
  return 0
end
"#;

const RENEW_LEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
  return redis.call('EXPIRE', KEYS[1], ARGV[2])
else
  return 0
end
"#;

/// Redis implementation of index batch job lease coordination.
#[derive(Clone)]
pub struct RedisIndexBatchJobLeaseCoordinator {
    client: redis::Client,
    key_prefix: String,
}

impl RedisIndexBatchJobLeaseCoordinator {
    /// Creates one coordinator adapter.
    #[must_use]
    pub fn new(client: redis::Client, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
        }
    }

    fn key_for(&self, job_id: &str) -> String {
        format!("{}:{job_id}", self.key_prefix)
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|error| AppError::Internal(format!("failed to connect to redis: {error}")))
    }
}

fn validate_lease_seconds(lease_seconds: u32) -> AppResult<()> {
    if lease_seconds == 0 {
        return Err(AppError::Validation(
            "index batch job lease_seconds must be greater than zero".to_owned(),
        ));
    }

    Ok(())
}

#[async_trait]
impl IndexBatchJobLeaseCoordinator for RedisIndexBatchJobLeaseCoordinator {
    async fn try_acquire_lease(
        &self,
        job_id: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<IndexBatchJobLease>> {
        if job_id.trim().is_empty() {
            return Err(AppError::Validation(
                "index batch job lease job_id must not be empty".to_owned(),
            ));
        }

        if holder_id.trim().is_empty() {
            return Err(AppError::Validation(
                "index batch job lease holder_id must not be empty".to_owned(),
            ));
        }

        validate_lease_seconds(lease_seconds)?;

        let key = self.key_for(job_id);
        let token = format!("{holder_id}:{}", uuid::Uuid::new_v4());
        let mut connection = self.connection().await?;

        let acquired: bool = connection
            .set_nx(key.as_str(), token.as_str())
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to acquire index batch job lease: {error}"))
            })?;

        if !acquired {
            return Ok(None);
        }

        connection
            .expire::<_, ()>(key.as_str(), i64::from(lease_seconds))
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to set index batch job lease ttl: {error}"))
            })?;

        Ok(Some(IndexBatchJobLease {
            job_id: job_id.to_owned(),
            token,
            holder_id: holder_id.to_owned(),
        }))
    }

    async fn release_lease(&self, lease: &IndexBatchJobLease) -> AppResult<()> {
        let mut connection = self.connection().await?;

        Script::new(RELEASE_LEASE_SCRIPT)
            .key(self.key_for(lease.job_id.as_str()))
            .arg(lease.token.as_str())
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to release index batch job lease: {error}"))
            })?;

        Ok(())
    }

    async fn renew_lease(
        &self,
        lease: &IndexBatchJobLease,
        lease_seconds: u32,
    ) -> AppResult<bool> {
        validate_lease_seconds(lease_seconds)?;

        let mut connection = self.connection().await?;

        let renewed = Script::new(RENEW_LEASE_SCRIPT)
            .key(self.key_for(lease.job_id.as_str()))
            .arg(lease.token.as_str())
            .arg(i64::from(lease_seconds))
            .invoke_async::<i32>(&mut connection)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to renew index batch job lease: {error}"))
            })?;

        Ok(renewed > 0)
    }
}

#[cfg(test)]
mod tests {
    use archivum_application::{IndexBatchJobLease, IndexBatchJobLeaseCoordinator};
    use archivum_core::AppError;

    use super::RedisIndexBatchJobLeaseCoordinator;

    fn coordinator() -> RedisIndexBatchJobLeaseCoordinator {
        let client = redis::Client::open("redis://127.0.0.1:6379");
        assert!(client.is_ok());
        RedisIndexBatchJobLeaseCoordinator::new(
            client.unwrap_or_else(|_| unreachable!()),
            "archivum:index_batch_job_lease",
        )
    }

    #[test]
    fn key_is_prefixed_with_job_id() {
        assert_eq!(
            coordinator().key_for("job-1"),
            "archivum:index_batch_job_lease:job-1"
        );
    }

    #[tokio::test]
    async fn acquire_rejects_invalid_input_before_connecting() {
        let coordinator = coordinator();

        let empty_job = coordinator.try_acquire_lease(" ", "worker-1", 30).await;
        assert!(matches!(empty_job, Err(AppError::Validation(_))));

        let empty_holder = coordinator.try_acquire_lease("job-1", "", 30).await;
        assert!(matches!(empty_holder, Err(AppError::Validation(_))));

        let zero_seconds = coordinator.try_acquire_lease("job-1", "worker-1", 0).await;
        assert!(matches!(zero_seconds, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn renew_rejects_zero_lease_seconds() {
        let lease = IndexBatchJobLease {
            job_id: "job-1".to_owned(),
            token: "worker-1:token".to_owned(),
            holder_id: "worker-1".to_owned(),
        };

        let result = coordinator().renew_lease(&lease, 0).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
