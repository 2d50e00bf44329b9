use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::jobs::{InsertJobEntity, JobEntity},
        repositories::job::JobRepository,
        value_objects::{
            enums::{job_statuses::JobStatus, job_types::JobType},
            ticket_jobs::{BalanceCompensation, CheckEvent, TicketPurchaseMessage},
        },
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::jobs},
};

pub struct JobPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl JobPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }

    fn enqueue<P: Serialize>(
        &self,
        job_type: JobType,
        payload: &P,
        correlation_id: Option<String>,
    ) -> Result<Uuid> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let now = Utc::now();

        let insert_entity = InsertJobEntity {
            type_: job_type.to_string(),
            payload: serde_json::to_value(payload)?,
            correlation_id,
            run_at: now,
            attempts: 0,
            status: JobStatus::Queued.to_string(),
            created_at: now,
        };

        let job_id = diesel::insert_into(jobs::table)
            .values(&insert_entity)
            .returning(jobs::id)
            .get_result::<Uuid>(&mut conn)?;

        Ok(job_id)
    }
}

const LEASE_EXPIRED: &str = "lease expired";

/// Retry delay after the given number of failed attempts: 5s, 25s, 125s...
pub fn backoff_seconds(attempts: i32) -> i64 {
    let exponent = attempts.saturating_sub(1).clamp(0, 8) as u32;
    5 * 5_i64.pow(exponent)
}

#[async_trait]
impl JobRepository for JobPostgres {
    async fn enqueue_ticket_purchase(
        &self,
        message: TicketPurchaseMessage,
        tracking_id: String,
    ) -> Result<Uuid> {
        self.enqueue(JobType::TicketPurchase, &message, Some(tracking_id))
    }

    async fn enqueue_check_event(&self, event: CheckEvent) -> Result<Uuid> {
        let correlation_id = Some(event.qr_code.clone());
        self.enqueue(JobType::CheckEvent, &event, correlation_id)
    }

    async fn enqueue_balance_compensation(
        &self,
        compensation: BalanceCompensation,
    ) -> Result<Uuid> {
        self.enqueue(JobType::BalanceCompensation, &compensation, None)
    }

    async fn lock_next_job(&self, job_type: JobType) -> Result<Option<JobEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let worker_id = Uuid::new_v4().to_string();
        let current_time = Utc::now();

        let job = conn.transaction::<Option<JobEntity>, diesel::result::Error, _>(|conn| {
            let candidate: Option<JobEntity> = jobs::table
                .select(JobEntity::as_select())
                .filter(jobs::type_.eq(job_type.as_str()))
                .filter(jobs::status.eq(JobStatus::Queued.as_str()))
                .filter(jobs::run_at.le(current_time))
                .order(jobs::run_at.asc())
                .for_update()
                .skip_locked()
                .first::<JobEntity>(conn)
                .optional()?;

            let Some(job) = candidate else {
                return Ok(None);
            };

            let locked = diesel::update(jobs::table.find(job.id))
                .set((
                    jobs::status.eq(JobStatus::Running.as_str()),
                    jobs::locked_at.eq(Some(current_time)),
                    jobs::locked_by.eq(Some(worker_id)),
                ))
                .returning(JobEntity::as_select())
                .get_result::<JobEntity>(conn)?;

            Ok(Some(locked))
        })?;

        Ok(job)
    }

    async fn mark_job_done(&self, job_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        diesel::update(jobs::table.find(job_id))
            .set((
                jobs::status.eq(JobStatus::Done.as_str()),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(&mut conn)?;

        Ok(())
    }

    async fn mark_job_failed(
        &self,
        job_id: Uuid,
        err: String,
        max_attempts: i32,
    ) -> Result<JobStatus> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let current_time = Utc::now();

        let attempts = jobs::table
            .find(job_id)
            .select(jobs::attempts)
            .first::<i32>(&mut conn)?;

        let new_attempts = attempts + 1;
        let (new_status, next_run_at) = if new_attempts < max_attempts {
            (
                JobStatus::Queued,
                current_time + chrono::Duration::seconds(backoff_seconds(new_attempts)),
            )
        } else {
            (JobStatus::Dead, current_time)
        };

        diesel::update(jobs::table.find(job_id))
            .set((
                jobs::status.eq(new_status.as_str()),
                jobs::attempts.eq(new_attempts),
                jobs::error.eq(Some(err)),
                jobs::run_at.eq(next_run_at),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(&mut conn)?;

        Ok(new_status)
    }

    async fn requeue_stale_jobs(
        &self,
        job_type: JobType,
        locked_before: DateTime<Utc>,
        max_attempts: i32,
    ) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let current_time = Utc::now();

        let reclaimed = conn.transaction::<usize, diesel::result::Error, _>(|conn| {
            let buried = diesel::update(
                jobs::table
                    .filter(jobs::type_.eq(job_type.as_str()))
                    .filter(jobs::status.eq(JobStatus::Running.as_str()))
                    .filter(jobs::locked_at.lt(locked_before))
                    .filter(jobs::attempts.ge(max_attempts - 1)),
            )
            .set((
                jobs::status.eq(JobStatus::Dead.as_str()),
                jobs::attempts.eq(jobs::attempts + 1),
                jobs::error.eq(Some(LEASE_EXPIRED)),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(conn)?;

            let requeued = diesel::update(
                jobs::table
                    .filter(jobs::type_.eq(job_type.as_str()))
                    .filter(jobs::status.eq(JobStatus::Running.as_str()))
                    .filter(jobs::locked_at.lt(locked_before)),
            )
            .set((
                jobs::status.eq(JobStatus::Queued.as_str()),
                jobs::attempts.eq(jobs::attempts + 1),
                jobs::error.eq(Some(LEASE_EXPIRED)),
                jobs::run_at.eq(current_time),
                jobs::locked_at.eq::<Option<DateTime<Utc>>>(None),
                jobs::locked_by.eq::<Option<String>>(None),
            ))
            .execute(conn)?;

            Ok(buried + requeued)
        })?;

        Ok(reclaimed)
    }
}
