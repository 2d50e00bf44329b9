use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crates::domain::{
    entities::jobs::JobEntity,
    repositories::job::JobRepository,
    value_objects::enums::{job_statuses::JobStatus, job_types::JobType},
};
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{error, info, warn};

/// One consumer of a job stream. `handle` may run more than once for the same job.
#[async_trait]
pub trait JobHandler: Send + Sync {
    fn job_type(&self) -> JobType;

    async fn handle(&self, job: &JobEntity) -> Result<()>;

    /// Called once when retries are exhausted.
    async fn on_dead(&self, _job: &JobEntity, _reason: &str) {}
}

#[derive(Debug, Clone, Copy)]
pub struct JobLoopConfig {
    pub max_attempts: i32,
    pub poll_interval: Duration,
    /// How long a job may stay `running` before another worker takes it back.
    pub lease: Duration,
}

pub async fn run<J, H>(job_repository: Arc<J>, handler: Arc<H>, config: JobLoopConfig) -> Result<()>
where
    J: JobRepository + Send + Sync,
    H: JobHandler,
{
    let job_type = handler.job_type();
    info!(
        %job_type,
        max_attempts = config.max_attempts,
        lease_secs = config.lease.as_secs(),
        "job_loop: starting"
    );

    let reap_every = config.lease / 2;
    let mut next_reap = Some(Instant::now());

    loop {
        if next_reap.is_some_and(|at| Instant::now() >= at) {
            reap_stale_jobs(job_repository.as_ref(), job_type, config).await;
            next_reap = Instant::now().checked_add(reap_every);
        }

        match run_once(job_repository.as_ref(), handler.as_ref(), config.max_attempts).await {
            Ok(true) => {}
            Ok(false) => tokio::time::sleep(config.poll_interval).await,
            Err(err) => {
                error!(%job_type, error = ?err, "job_loop: failed to lock next job");
                tokio::time::sleep(config.poll_interval).await;
            }
        }
    }
}

/// Requeues jobs whose worker died mid-run. Returns how many were reclaimed.
pub async fn reap_stale_jobs<J>(
    job_repository: &J,
    job_type: JobType,
    config: JobLoopConfig,
) -> usize
where
    J: JobRepository + Send + Sync,
{
    // An unrepresentable lease never expires.
    let locked_before = chrono::Duration::from_std(config.lease)
        .ok()
        .and_then(|lease| Utc::now().checked_sub_signed(lease))
        .unwrap_or(DateTime::<Utc>::MIN_UTC);

    match job_repository
        .requeue_stale_jobs(job_type, locked_before, config.max_attempts)
        .await
    {
        Ok(0) => 0,
        Ok(reclaimed) => {
            warn!(%job_type, reclaimed, %locked_before, "job_loop: reclaimed jobs with expired lease");
            reclaimed
        }
        Err(err) => {
            error!(%job_type, db_error = ?err, "job_loop: failed to reclaim stale jobs");
            0
        }
    }
}

/// Claims and processes at most one job. `Ok(false)` when the queue was empty.
pub async fn run_once<J, H>(job_repository: &J, handler: &H, max_attempts: i32) -> Result<bool>
where
    J: JobRepository + Send + Sync,
    H: JobHandler + ?Sized,
{
    let job_type = handler.job_type();
    let Some(job) = job_repository.lock_next_job(job_type).await? else {
        return Ok(false);
    };

    match handler.handle(&job).await {
        Ok(()) => {
            if let Err(err) = job_repository.mark_job_done(job.id).await {
                error!(job_id = %job.id, %job_type, db_error = ?err, "job_loop: failed to mark job done");
            } else {
                info!(job_id = %job.id, %job_type, "job_loop: job done");
            }
        }
        Err(err) => {
            let reason = format!("{err:#}");
            warn!(job_id = %job.id, %job_type, attempts = job.attempts + 1, error = %reason, "job_loop: job failed");

            match job_repository
                .mark_job_failed(job.id, reason.clone(), max_attempts)
                .await
            {
                Ok(JobStatus::Dead) => {
                    error!(job_id = %job.id, %job_type, error = %reason, "job_loop: job is dead");
                    handler.on_dead(&job, &reason).await;
                }
                Ok(_) => {}
                Err(mark_err) => {
                    error!(job_id = %job.id, %job_type, db_error = ?mark_err, "job_loop: failed to mark job failed");
                }
            }
        }
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crates::domain::repositories::job::MockJobRepository;
    use serde_json::json;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingHandler {
        fail: bool,
        dead: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobHandler for RecordingHandler {
        fn job_type(&self) -> JobType {
            JobType::CheckEvent
        }

        async fn handle(&self, _job: &JobEntity) -> Result<()> {
            if self.fail {
                Err(anyhow!("database unavailable"))
            } else {
                Ok(())
            }
        }

        async fn on_dead(&self, _job: &JobEntity, reason: &str) {
            self.dead.lock().unwrap().push(reason.to_string());
        }
    }

    fn handler(fail: bool) -> RecordingHandler {
        RecordingHandler {
            fail,
            dead: Mutex::new(Vec::new()),
        }
    }

    fn job() -> JobEntity {
        JobEntity {
            id: Uuid::new_v4(),
            type_: "check_event".to_string(),
            payload: json!({}),
            correlation_id: None,
            run_at: Utc::now(),
            attempts: 0,
            locked_at: Some(Utc::now()),
            locked_by: Some("worker".to_string()),
            error: None,
            status: "running".to_string(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_queue_reports_idle() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_lock_next_job()
            .withf(|job_type| *job_type == JobType::CheckEvent)
            .returning(|_| Box::pin(async { Ok(None) }));

        let processed = run_once(&jobs, &handler(false), 5).await.unwrap();

        assert!(!processed);
    }

    #[tokio::test]
    async fn successful_job_is_marked_done() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_lock_next_job()
            .returning(|_| Box::pin(async { Ok(Some(job())) }));
        jobs.expect_mark_job_done()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        jobs.expect_mark_job_failed().never();

        assert!(run_once(&jobs, &handler(false), 5).await.unwrap());
    }

    #[tokio::test]
    async fn failed_job_is_requeued_without_dead_hook() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_lock_next_job()
            .returning(|_| Box::pin(async { Ok(Some(job())) }));
        jobs.expect_mark_job_failed()
            .withf(|_, err, max_attempts| err == "database unavailable" && *max_attempts == 5)
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(JobStatus::Queued) }));
        let handler = handler(true);

        run_once(&jobs, &handler, 5).await.unwrap();

        assert!(handler.dead.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn exhausted_job_triggers_dead_hook() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_lock_next_job()
            .returning(|_| Box::pin(async { Ok(Some(job())) }));
        jobs.expect_mark_job_failed()
            .returning(|_, _, _| Box::pin(async { Ok(JobStatus::Dead) }));
        let handler = handler(true);

        run_once(&jobs, &handler, 5).await.unwrap();

        assert_eq!(
            handler.dead.lock().unwrap().as_slice(),
            ["database unavailable".to_string()]
        );
    }

    fn loop_config() -> JobLoopConfig {
        JobLoopConfig {
            max_attempts: 5,
            poll_interval: Duration::from_secs(2),
            lease: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn jobs_locked_past_the_lease_are_reclaimed() {
        let mut jobs = MockJobRepository::new();
        let started = Utc::now();
        jobs.expect_requeue_stale_jobs()
            .withf(move |job_type, locked_before, max_attempts| {
                let age = started - *locked_before;
                *job_type == JobType::TicketPurchase
                    && *max_attempts == 5
                    && age >= chrono::Duration::seconds(295)
                    && age <= chrono::Duration::seconds(300)
            })
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(2) }));

        let reclaimed = reap_stale_jobs(&jobs, JobType::TicketPurchase, loop_config()).await;

        assert_eq!(reclaimed, 2);
    }

    #[tokio::test]
    async fn reclaim_failure_is_not_fatal() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_requeue_stale_jobs()
            .returning(|_, _, _| Box::pin(async { Err(anyhow!("database unavailable")) }));

        assert_eq!(reap_stale_jobs(&jobs, JobType::CheckEvent, loop_config()).await, 0);
    }

    #[tokio::test]
    async fn oversized_lease_reclaims_nothing_recent() {
        let mut jobs = MockJobRepository::new();
        jobs.expect_requeue_stale_jobs()
            .withf(|_, locked_before, _| *locked_before == DateTime::<Utc>::MIN_UTC)
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(0) }));
        let config = JobLoopConfig {
            lease: Duration::MAX,
            ..loop_config()
        };

        assert_eq!(reap_stale_jobs(&jobs, JobType::CheckEvent, config).await, 0);
    }
}
