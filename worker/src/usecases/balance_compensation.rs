use anyhow::{Context, Result};
use async_trait::async_trait;
use crates::domain::{
    entities::jobs::JobEntity,
    repositories::users::UserRepository,
    value_objects::{enums::job_types::JobType, ticket_jobs::BalanceCompensation},
};
use std::sync::Arc;
use tracing::{error, info};

use crate::services::job_loop::JobHandler;

/// Retries credits that could not be applied inline.
pub struct BalanceCompensationUseCase<U>
where
    U: UserRepository + Send + Sync,
{
    user_repository: Arc<U>,
}

impl<U> BalanceCompensationUseCase<U>
where
    U: UserRepository + Send + Sync,
{
    pub fn new(user_repository: Arc<U>) -> Self {
        Self { user_repository }
    }

    pub async fn apply(&self, compensation: BalanceCompensation) -> Result<()> {
        let balance = self
            .user_repository
            .credit_balance(compensation.user_id, compensation.amount)
            .await
            .context("failed to credit balance")?;
        info!(
            user_id = compensation.user_id,
            amount = compensation.amount,
            balance,
            reason = %compensation.reason,
            "balance_compensation: credit applied"
        );
        Ok(())
    }
}

#[async_trait]
impl<U> JobHandler for BalanceCompensationUseCase<U>
where
    U: UserRepository + Send + Sync,
{
    fn job_type(&self) -> JobType {
        JobType::BalanceCompensation
    }

    async fn handle(&self, job: &JobEntity) -> Result<()> {
        let compensation: BalanceCompensation =
            serde_json::from_value(job.payload.clone()).context("malformed compensation")?;
        self.apply(compensation).await
    }

    async fn on_dead(&self, job: &JobEntity, reason: &str) {
        error!(
            job_id = %job.id,
            payload = %job.payload,
            reason,
            "balance_compensation: retries exhausted; manual refund required"
        );
    }
}
