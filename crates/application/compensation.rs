use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{
    repositories::{job::JobRepository, users::UserRepository},
    value_objects::ticket_jobs::BalanceCompensation,
};

/// Gives money back after a debit whose follow-up failed. Tries the credit inline
/// and falls back to a durable retry job.
pub struct BalanceCompensator<U, J>
where
    U: UserRepository + Send + Sync,
    J: JobRepository + Send + Sync,
{
    user_repository: Arc<U>,
    job_repository: Arc<J>,
}

impl<U, J> BalanceCompensator<U, J>
where
    U: UserRepository + Send + Sync,
    J: JobRepository + Send + Sync,
{
    pub fn new(user_repository: Arc<U>, job_repository: Arc<J>) -> Self {
        Self {
            user_repository,
            job_repository,
        }
    }

    pub async fn compensate(&self, compensation: BalanceCompensation) {
        let user_id = compensation.user_id;
        let amount = compensation.amount;

        match self.user_repository.credit_balance(user_id, amount).await {
            Ok(balance) => {
                info!(user_id, amount, balance, reason = %compensation.reason, "compensation: balance restored");
                return;
            }
            Err(err) => {
                warn!(user_id, amount, error = ?err, "compensation: inline credit failed; deferring");
            }
        }

        if let Err(err) = self
            .job_repository
            .enqueue_balance_compensation(compensation)
            .await
        {
            error!(
                user_id,
                amount,
                error = ?err,
                "compensation: could not defer credit; manual refund required"
            );
        }
    }
}
