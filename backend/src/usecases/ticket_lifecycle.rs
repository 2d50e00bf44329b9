use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use crates::{
    application::compensation::BalanceCompensator,
    domain::{
        entities::tickets::{InsertTicketEntity, TicketEntity},
        repositories::{
            job::JobRepository, routes::FareCalculator, status_cache::StatusCache,
            tickets::TicketRepository, transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::{
            check_in::SnapshotRevoke,
            enums::{
                payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
                transaction_types::TransactionType,
            },
            fares::{refund_amount, round_up_fare},
            ledger::{ledger_entry, over_travel_description, refund_description},
            over_travel::{OverTravelRequest, OverTravelTicketDto},
            qr_codes::over_travel_qr_code,
            ticket_jobs::BalanceCompensation,
            tickets::{CancelTicketDto, PaymentStatusDto, TicketDto, TicketListDto, TicketListQuery},
        },
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

pub const CANCELLATION_WINDOW_HOURS: i64 = 24;

#[derive(Debug, Error)]
pub enum TicketLifecycleError {
    #[error("{0}")]
    Validation(String),
    #[error("ticket not found")]
    NotFound,
    #[error("unauthorized")]
    Unauthorized,
    #[error("ticket already cancelled")]
    AlreadyCancelled,
    #[error("ticket already used")]
    AlreadyUsed,
    #[error("unpaid tickets cannot be cancelled")]
    Unpaid,
    #[error("cancellation window expired")]
    WindowExpired,
    #[error("ticket is not valid for this route")]
    WrongRoute,
    #[error("fare is unavailable for this trip")]
    FareUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for TicketLifecycleError {
    fn status_code(&self) -> StatusCode {
        match self {
            TicketLifecycleError::Validation(_) => StatusCode::BAD_REQUEST,
            TicketLifecycleError::NotFound => StatusCode::NOT_FOUND,
            TicketLifecycleError::Unauthorized => StatusCode::FORBIDDEN,
            TicketLifecycleError::AlreadyCancelled
            | TicketLifecycleError::AlreadyUsed
            | TicketLifecycleError::WrongRoute => StatusCode::CONFLICT,
            TicketLifecycleError::Unpaid | TicketLifecycleError::WindowExpired => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            TicketLifecycleError::FareUnavailable(_) => StatusCode::BAD_GATEWAY,
            TicketLifecycleError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, TicketLifecycleError>;

pub struct TicketLifecycleUseCase<T, U, X, C, F, J>
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    ticket_repository: Arc<T>,
    transaction_repository: Arc<X>,
    status_cache: Arc<C>,
    fare_calculator: Arc<F>,
    compensator: BalanceCompensator<U, J>,
}

impl<T, U, X, C, F, J> TicketLifecycleUseCase<T, U, X, C, F, J>
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    pub fn new(
        ticket_repository: Arc<T>,
        user_repository: Arc<U>,
        transaction_repository: Arc<X>,
        status_cache: Arc<C>,
        fare_calculator: Arc<F>,
        job_repository: Arc<J>,
    ) -> Self {
        Self {
            ticket_repository,
            transaction_repository,
            status_cache,
            fare_calculator,
            compensator: BalanceCompensator::new(user_repository, job_repository),
        }
    }

    pub async fn list_tickets(
        &self,
        user_id: i64,
        query: TicketListQuery,
    ) -> UseCaseResult<TicketListDto> {
        let (page, limit, offset) = query.normalized();
        let (tickets, total) = self
            .ticket_repository
            .list_by_user(user_id, limit, offset)
            .await
            .map_err(|err| {
                error!(user_id, db_error = ?err, "ticket_lifecycle: failed to list tickets");
                TicketLifecycleError::Internal(err)
            })?;

        Ok(TicketListDto {
            tickets: tickets.into_iter().map(TicketDto::from).collect(),
            total,
            page,
            limit,
        })
    }

    pub async fn get_payment_status(
        &self,
        user_id: i64,
        ticket_id: i64,
    ) -> UseCaseResult<PaymentStatusDto> {
        let ticket = self.owned_ticket(user_id, ticket_id).await?;
        Ok(PaymentStatusDto {
            ticket_id,
            status: effective_payment_status(&ticket),
        })
    }

    /// Books the leg past the ticket's destination. Boarding was already decided at the scan.
    pub async fn create_over_travel_ticket(
        &self,
        route_id: i64,
        bus_name: String,
        request: OverTravelRequest,
    ) -> UseCaseResult<OverTravelTicketDto> {
        let current_stop = request.current_stop.trim().to_string();
        if current_stop.is_empty() {
            return Err(TicketLifecycleError::Validation(
                "current_stop is required".to_string(),
            ));
        }

        let original = self.load_ticket(request.ticket_id).await?;
        if original.route_id != route_id {
            return Err(TicketLifecycleError::WrongRoute);
        }

        let fare = self
            .fare_calculator
            .calculate_fare(
                route_id,
                original.end_destination.clone(),
                current_stop.clone(),
            )
            .await
            .map_err(|err| {
                warn!(ticket_id = original.id, error = ?err, "ticket_lifecycle: over-travel fare lookup failed");
                TicketLifecycleError::FareUnavailable(err)
            })?;
        let fare = round_up_fare(fare);
        if fare <= 0.0 {
            return Err(TicketLifecycleError::FareUnavailable(anyhow::anyhow!(
                "non-positive fare {fare}"
            )));
        }

        let paid = request.payment_collected;
        let status = if paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Unpaid
        };
        let ticket = self
            .ticket_repository
            .create(InsertTicketEntity {
                user_id: original.user_id,
                route_id,
                bus_name: bus_name.clone(),
                start_destination: original.end_destination.clone(),
                end_destination: current_stop,
                fare,
                payment_method: PaymentMethod::Cash.to_string(),
                payment_status: status.to_string(),
                paid_status: paid,
                payment_used: paid,
                batch_id: Uuid::new_v4(),
                qr_code: over_travel_qr_code(),
                checked: true,
                created_at: Utc::now(),
            })
            .await
            .map_err(|err| {
                error!(ticket_id = original.id, db_error = ?err, "ticket_lifecycle: failed to create over-travel ticket");
                TicketLifecycleError::Internal(err)
            })?;

        if paid {
            let entry = ledger_entry(
                original.user_id,
                fare,
                TransactionType::Purchase,
                over_travel_description(&bus_name),
                PaymentMethod::Cash,
            );
            if let Err(err) = self.transaction_repository.record(entry).await {
                error!(ticket_id = ticket.id, db_error = ?err, "ticket_lifecycle: failed to record over-travel ledger entry");
            }
        }

        info!(ticket_id = ticket.id, original_ticket_id = original.id, fare, paid, "ticket_lifecycle: over-travel ticket created");
        Ok(OverTravelTicketDto {
            ticket_id: ticket.id,
            original_ticket_id: original.id,
            start_destination: ticket.start_destination,
            end_destination: ticket.end_destination,
            fare,
            paid,
            qr_code: ticket.qr_code,
        })
    }

    pub async fn cancel_ticket(
        &self,
        user_id: i64,
        ticket_id: i64,
    ) -> UseCaseResult<CancelTicketDto> {
        let ticket = self.owned_ticket(user_id, ticket_id).await?;
        let now = Utc::now();
        check_cancellable(&ticket, now)?;

        // A snapshot that already boarded wins over the cancellation.
        let revoke = self
            .status_cache
            .revoke_check_in_snapshot(ticket.qr_code.clone())
            .await
            .map_err(|err| {
                error!(ticket_id, cache_error = ?err, "ticket_lifecycle: failed to revoke check-in snapshot");
                TicketLifecycleError::Internal(err)
            })?;
        if revoke == SnapshotRevoke::AlreadyChecked {
            return Err(TicketLifecycleError::AlreadyUsed);
        }

        let cancelled = self
            .ticket_repository
            .cancel(ticket_id, now)
            .await
            .map_err(|err| {
                error!(ticket_id, db_error = ?err, "ticket_lifecycle: failed to cancel ticket");
                TicketLifecycleError::Internal(err)
            })?;
        if !cancelled {
            let current = self.load_ticket(ticket_id).await?;
            check_cancellable(&current, now)?;
            return Err(TicketLifecycleError::AlreadyUsed);
        }

        let amount = refund_amount(ticket.fare);
        let refunded_to_wallet =
            PaymentMethod::parse(&ticket.payment_method) == Some(PaymentMethod::Wallet);

        if refunded_to_wallet {
            self.compensator
                .compensate(BalanceCompensation {
                    user_id,
                    amount,
                    reason: format!("refund for ticket {ticket_id}"),
                })
                .await;

            let entry = ledger_entry(
                user_id,
                amount,
                TransactionType::Refund,
                refund_description(&ticket.bus_name),
                PaymentMethod::Wallet,
            );
            if let Err(err) = self.transaction_repository.record(entry).await {
                error!(ticket_id, db_error = ?err, "ticket_lifecycle: failed to record refund ledger entry");
            }
        }

        info!(ticket_id, user_id, amount, refunded_to_wallet, "ticket_lifecycle: ticket cancelled");
        Ok(CancelTicketDto {
            ticket_id,
            refund_amount: amount,
            refunded_to_wallet,
        })
    }

    async fn load_ticket(&self, ticket_id: i64) -> UseCaseResult<TicketEntity> {
        self.ticket_repository
            .find_by_id(ticket_id)
            .await
            .map_err(|err| {
                error!(ticket_id, db_error = ?err, "ticket_lifecycle: failed to load ticket");
                TicketLifecycleError::Internal(err)
            })?
            .ok_or(TicketLifecycleError::NotFound)
    }

    async fn owned_ticket(&self, user_id: i64, ticket_id: i64) -> UseCaseResult<TicketEntity> {
        let ticket = self.load_ticket(ticket_id).await?;
        if ticket.user_id != user_id {
            warn!(ticket_id, user_id, "ticket_lifecycle: access to another rider's ticket");
            return Err(TicketLifecycleError::Unauthorized);
        }
        Ok(ticket)
    }
}

pub fn effective_payment_status(ticket: &TicketEntity) -> PaymentStatus {
    if ticket.cancelled_at.is_some() {
        return PaymentStatus::Cancelled;
    }
    if ticket.paid_status {
        return PaymentStatus::Paid;
    }
    if ticket.payment_used {
        return PaymentStatus::Failed;
    }
    PaymentStatus::parse(&ticket.payment_status)
}

fn check_cancellable(ticket: &TicketEntity, now: chrono::DateTime<Utc>) -> UseCaseResult<()> {
    if ticket.cancelled_at.is_some() {
        return Err(TicketLifecycleError::AlreadyCancelled);
    }
    if ticket.checked {
        return Err(TicketLifecycleError::AlreadyUsed);
    }
    if !ticket.paid_status {
        return Err(TicketLifecycleError::Unpaid);
    }
    if now - ticket.created_at > Duration::hours(CANCELLATION_WINDOW_HOURS) {
        return Err(TicketLifecycleError::WindowExpired);
    }
    Ok(())
}
