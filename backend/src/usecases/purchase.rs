use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    repositories::{
        job::JobRepository, routes::FareCalculator, status_cache::StatusCache,
        tickets::TicketRepository,
    },
    value_objects::{
        fares::round_up_fare,
        ticket_jobs::TicketPurchaseMessage,
        tickets::{
            BuyTicketRequest, BuyTicketResponse, MAX_ACTIVE_TICKETS_PER_ROUTE,
            MAX_TICKETS_PER_REQUEST, TicketDto, TrackingStatusDto,
        },
        tracking_sessions::TrackingSession,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum PurchaseError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    LimitReached(String),
    #[error("fare is unavailable for this trip")]
    FareUnavailable(#[source] anyhow::Error),
    #[error("request not found")]
    TrackingNotFound,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for PurchaseError {
    fn status_code(&self) -> StatusCode {
        match self {
            PurchaseError::Validation(_) => StatusCode::BAD_REQUEST,
            PurchaseError::LimitReached(_) => StatusCode::CONFLICT,
            PurchaseError::FareUnavailable(_) => StatusCode::BAD_GATEWAY,
            PurchaseError::TrackingNotFound => StatusCode::NOT_FOUND,
            PurchaseError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, PurchaseError>;

pub struct PurchaseUseCase<T, C, J, F>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    ticket_repository: Arc<T>,
    status_cache: Arc<C>,
    job_repository: Arc<J>,
    fare_calculator: Arc<F>,
}

impl<T, C, J, F> PurchaseUseCase<T, C, J, F>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    pub fn new(
        ticket_repository: Arc<T>,
        status_cache: Arc<C>,
        job_repository: Arc<J>,
        fare_calculator: Arc<F>,
    ) -> Self {
        Self {
            ticket_repository,
            status_cache,
            job_repository,
            fare_calculator,
        }
    }

    /// Accepts a purchase and hands it to the fulfillment worker. Never waits for the worker.
    pub async fn buy(
        &self,
        user_id: i64,
        request: BuyTicketRequest,
    ) -> UseCaseResult<BuyTicketResponse> {
        let quantity = request.quantity.unwrap_or(1);
        if !(1..=MAX_TICKETS_PER_REQUEST).contains(&quantity) {
            return Err(PurchaseError::Validation(format!(
                "you can purchase between 1 and {MAX_TICKETS_PER_REQUEST} tickets per request"
            )));
        }
        if !request.payment_method.is_purchasable() {
            return Err(PurchaseError::Validation(
                "payment method must be wallet or gateway".to_string(),
            ));
        }
        let bus_name = request.bus_name.trim().to_string();
        let start_destination = request.start_destination.trim().to_string();
        let end_destination = request.end_destination.trim().to_string();
        if request.route_id <= 0
            || bus_name.is_empty()
            || start_destination.is_empty()
            || end_destination.is_empty()
        {
            return Err(PurchaseError::Validation(
                "route_id, bus_name, start_destination and end_destination are required"
                    .to_string(),
            ));
        }

        let existing = self
            .ticket_repository
            .count_active_on_route(user_id, request.route_id)
            .await
            .map_err(|err| {
                error!(user_id, route_id = request.route_id, db_error = ?err, "purchase: failed to count active tickets");
                PurchaseError::Internal(err)
            })?;
        check_active_limit(existing, quantity)?;

        let fare = self
            .fare_calculator
            .calculate_fare(
                request.route_id,
                start_destination.clone(),
                end_destination.clone(),
            )
            .await
            .map_err(|err| {
                warn!(user_id, route_id = request.route_id, error = ?err, "purchase: fare lookup failed");
                PurchaseError::FareUnavailable(err)
            })?;
        let fare = round_up_fare(fare);
        if fare <= 0.0 {
            return Err(PurchaseError::FareUnavailable(anyhow::anyhow!(
                "non-positive fare {fare}"
            )));
        }

        let batch_id = Uuid::new_v4();
        let tracking_id = Uuid::new_v4().to_string();
        let message = TicketPurchaseMessage {
            user_id,
            route_id: request.route_id,
            bus_name,
            start_destination,
            end_destination,
            fare,
            total_fare: fare * quantity as f64,
            quantity,
            batch_id,
            payment_method: request.payment_method,
        };

        // The poller starts right away, so the session must exist before the response.
        self.status_cache
            .put_tracking_session(tracking_id.clone(), TrackingSession::Processing)
            .await
            .map_err(|err| {
                error!(%tracking_id, cache_error = ?err, "purchase: failed to open tracking session");
                PurchaseError::Internal(err)
            })?;

        if let Err(err) = self
            .job_repository
            .enqueue_ticket_purchase(message, tracking_id.clone())
            .await
        {
            error!(%tracking_id, %batch_id, db_error = ?err, "purchase: failed to enqueue purchase");
            let failed = TrackingSession::Failed {
                error: "could not queue purchase".to_string(),
            };
            if let Err(cache_err) = self
                .status_cache
                .put_tracking_session(tracking_id.clone(), failed)
                .await
            {
                warn!(%tracking_id, cache_error = ?cache_err, "purchase: failed to record enqueue failure");
            }
            return Err(PurchaseError::Internal(err));
        }

        info!(user_id, %tracking_id, %batch_id, quantity, fare, "purchase: queued");

        Ok(BuyTicketResponse {
            message: "Ticket purchase is being processed".to_string(),
            tracking_id,
        })
    }

    pub async fn tracking_status(&self, tracking_id: String) -> UseCaseResult<TrackingStatusDto> {
        let session = self
            .status_cache
            .get_tracking_session(tracking_id.clone())
            .await
            .map_err(|err| {
                error!(%tracking_id, cache_error = ?err, "purchase: failed to read tracking session");
                PurchaseError::Internal(err)
            })?
            // Expired and unknown look the same.
            .ok_or(PurchaseError::TrackingNotFound)?;

        let mut status = TrackingStatusDto {
            message: session.message(),
            ..Default::default()
        };

        match &session {
            TrackingSession::Ready { url, .. } => status.payment_url = Some(url.clone()),
            TrackingSession::Paid { url, .. } => status.download_url = Some(url.clone()),
            TrackingSession::Processing | TrackingSession::Failed { .. } => {}
        }

        let ticket_ids = session.ticket_ids();
        if let Some(first_id) = ticket_ids.first() {
            let ticket = self
                .ticket_repository
                .find_by_id(*first_id)
                .await
                .map_err(|err| {
                    error!(%tracking_id, ticket_id = first_id, db_error = ?err, "purchase: failed to load tracked ticket");
                    PurchaseError::Internal(err)
                })?;
            status.ticket = ticket.map(TicketDto::from);
            status.ticket_ids = Some(ticket_ids.to_vec());
        }

        Ok(status)
    }
}

fn check_active_limit(existing: i64, quantity: i32) -> UseCaseResult<()> {
    if existing >= MAX_ACTIVE_TICKETS_PER_ROUTE {
        return Err(PurchaseError::LimitReached(format!(
            "ticket limit reached for this route (max {MAX_ACTIVE_TICKETS_PER_ROUTE} active tickets)"
        )));
    }
    if existing + i64::from(quantity) > MAX_ACTIVE_TICKETS_PER_ROUTE {
        let remaining = MAX_ACTIVE_TICKETS_PER_ROUTE - existing;
        return Err(PurchaseError::LimitReached(format!(
            "you already have {existing} active ticket(s) on this route. You can buy up to {remaining} more for this route"
        )));
    }
    Ok(())
}
