use archivum_core::AppResult;
use async_trait::async_trait;

/// Lease held by one runner for one job id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexBatchJobLease {
    /// Leased job id.
    pub job_id: String,
    /// Ownership token compared on release and renewal.
    pub token: String,
    /// Worker holding the lease.
    pub holder_id: String,
}

/// Distributed coordination port keeping one active runner per job.
#[async_trait]
pub trait IndexBatchJobLeaseCoordinator: Send + Sync {
    /// Attempts to acquire the lease for a job.
    async fn try_acquire_lease(
        &self,
        job_id: &str,
        holder_id: &str,
        lease_seconds: u32,
    ) -> AppResult<Option<IndexBatchJobLease>>;

    /// Releases a lease using token compare-and-delete semantics.
    async fn release_lease(&self, lease: &IndexBatchJobLease) -> AppResult<()>;

    /// Renews a lease and returns false when token ownership changed.
    async fn renew_lease(&self, lease: &IndexBatchJobLease, lease_seconds: u32)
    -> AppResult<bool>;
}
