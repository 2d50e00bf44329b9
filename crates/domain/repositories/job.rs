use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::jobs::JobEntity,
    value_objects::{
        enums::{job_statuses::JobStatus, job_types::JobType},
        ticket_jobs::{BalanceCompensation, CheckEvent, TicketPurchaseMessage},
    },
};

#[async_trait]
#[automock]
pub trait JobRepository {
    async fn enqueue_ticket_purchase(
        &self,
        message: TicketPurchaseMessage,
        tracking_id: String,
    ) -> Result<Uuid>;
    async fn enqueue_check_event(&self, event: CheckEvent) -> Result<Uuid>;
    async fn enqueue_balance_compensation(&self, compensation: BalanceCompensation)
    -> Result<Uuid>;

    async fn lock_next_job(&self, job_type: JobType) -> Result<Option<JobEntity>>;
    async fn mark_job_done(&self, job_id: Uuid) -> Result<()>;
    /// Requeues with backoff or buries the job; returns the resulting status.
    async fn mark_job_failed(&self, job_id: Uuid, err: String, max_attempts: i32)
    -> Result<JobStatus>;
    /// Returns `running` jobs locked before the cutoff to the queue, counting the
    /// lost run as an attempt. Jobs out of attempts are buried instead.
    async fn requeue_stale_jobs(
        &self,
        job_type: JobType,
        locked_before: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<usize>;
}
