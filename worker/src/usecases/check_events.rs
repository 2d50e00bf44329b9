use anyhow::{Context, Result};
use async_trait::async_trait;
use crates::domain::{
    entities::jobs::JobEntity,
    repositories::tickets::TicketRepository,
    value_objects::{enums::job_types::JobType, ticket_jobs::CheckEvent},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::services::job_loop::JobHandler;

/// Brings ticket rows in line with check-ins accepted on the cached fast path.
pub struct CheckEventUseCase<T>
where
    T: TicketRepository + Send + Sync,
{
    ticket_repository: Arc<T>,
}

impl<T> CheckEventUseCase<T>
where
    T: TicketRepository + Send + Sync,
{
    pub fn new(ticket_repository: Arc<T>) -> Self {
        Self { ticket_repository }
    }

    pub async fn apply(&self, event: CheckEvent) -> Result<()> {
        let ticket_id = event.ticket_id;
        let Some(ticket) = self
            .ticket_repository
            .find_by_id(ticket_id)
            .await
            .context("failed to load ticket")?
        else {
            warn!(ticket_id, qr_code = %event.qr_code, "check_events: unknown ticket; dropping event");
            return Ok(());
        };

        if ticket.cancelled_at.is_some() {
            warn!(ticket_id, "check_events: ticket was cancelled; dropping event");
            return Ok(());
        }

        if self
            .ticket_repository
            .mark_checked(ticket_id)
            .await
            .context("failed to mark ticket checked")?
        {
            info!(ticket_id, current_stop = %event.current_stop, checked_at = %event.checked_at, "check_events: ticket checked");
        } else if ticket.checked {
            debug!(ticket_id, "check_events: already checked");
        } else {
            warn!(ticket_id, paid = ticket.paid_status, "check_events: row not eligible for check-in");
        }

        Ok(())
    }
}

#[async_trait]
impl<T> JobHandler for CheckEventUseCase<T>
where
    T: TicketRepository + Send + Sync,
{
    fn job_type(&self) -> JobType {
        JobType::CheckEvent
    }

    async fn handle(&self, job: &JobEntity) -> Result<()> {
        let event: CheckEvent =
            serde_json::from_value(job.payload.clone()).context("malformed check event")?;
        self.apply(event).await
    }
}
