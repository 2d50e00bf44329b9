use std::sync::Arc;

use anyhow::anyhow;
use axum::http::StatusCode;
use chrono::Utc;
use crates::domain::{
    entities::tickets::TicketEntity,
    repositories::{
        job::JobRepository,
        routes::{FareCalculator, RouteStopRepository},
        status_cache::StatusCache,
        tickets::TicketRepository,
    },
    value_objects::{
        check_in::{
            CheckInOutcome, CheckInRequest, SnapshotClaim, ValidateTicketRequest,
            is_over_travel, reject_snapshot, reject_ticket,
        },
        fares::round_up_fare,
        ticket_jobs::CheckEvent,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum CheckInError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for CheckInError {
    fn status_code(&self) -> StatusCode {
        match self {
            CheckInError::Validation(_) => StatusCode::BAD_REQUEST,
            CheckInError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, CheckInError>;

/// The parts of a ticket the boarding decision needs, from either the cache or the row.
struct Boarding<'a> {
    ticket_id: i64,
    route_id: i64,
    end_destination: &'a str,
}

pub struct CheckInUseCase<T, C, J, S, F>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    S: RouteStopRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    ticket_repository: Arc<T>,
    status_cache: Arc<C>,
    job_repository: Arc<J>,
    stop_repository: Arc<S>,
    fare_calculator: Arc<F>,
}

impl<T, C, J, S, F> CheckInUseCase<T, C, J, S, F>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    S: RouteStopRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    pub fn new(
        ticket_repository: Arc<T>,
        status_cache: Arc<C>,
        job_repository: Arc<J>,
        stop_repository: Arc<S>,
        fare_calculator: Arc<F>,
    ) -> Self {
        Self {
            ticket_repository,
            status_cache,
            job_repository,
            stop_repository,
            fare_calculator,
        }
    }

    /// Scanner entry point: cached snapshot first, ticket row when no snapshot exists.
    pub async fn check_in(
        &self,
        route_id: i64,
        request: CheckInRequest,
    ) -> UseCaseResult<CheckInOutcome> {
        let qr_code = request.qr_code.trim().to_string();
        let current_stop = required_stop(&request.current_stop)?;
        if qr_code.is_empty() {
            return Err(CheckInError::Validation("qr_code is required".to_string()));
        }

        match self.fast_path(route_id, &qr_code, &current_stop).await? {
            Some(outcome) => Ok(outcome),
            None => self.slow_path_by_qr(route_id, &qr_code, &current_stop).await,
        }
    }

    /// Row-backed validation for a ticket id typed in by the conductor.
    pub async fn validate_ticket(
        &self,
        route_id: i64,
        request: ValidateTicketRequest,
    ) -> UseCaseResult<CheckInOutcome> {
        let current_stop = required_stop(&request.current_stop)?;
        let ticket = self
            .ticket_repository
            .find_by_id(request.ticket_id)
            .await
            .map_err(|err| {
                error!(ticket_id = request.ticket_id, db_error = ?err, "check_in: failed to load ticket");
                CheckInError::Internal(err)
            })?;

        match ticket {
            Some(ticket) => self.board_from_row(route_id, ticket, &current_stop).await,
            None => Ok(CheckInOutcome::Invalid),
        }
    }

    /// `None` when there is no snapshot to decide from.
    async fn fast_path(
        &self,
        route_id: i64,
        qr_code: &str,
        current_stop: &str,
    ) -> UseCaseResult<Option<CheckInOutcome>> {
        let snapshot = match self
            .status_cache
            .get_check_in_snapshot(qr_code.to_string())
            .await
        {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return Ok(None),
            Err(err) => {
                warn!(cache_error = ?err, "check_in: snapshot read failed; using ticket row");
                return Ok(None);
            }
        };

        if let Some(rejection) = reject_snapshot(&snapshot, route_id) {
            return Ok(Some(rejection));
        }

        let outcome = self
            .boarding_outcome(
                Boarding {
                    ticket_id: snapshot.ticket_id,
                    route_id,
                    end_destination: &snapshot.end_destination,
                },
                current_stop,
            )
            .await?;

        let claim = self
            .status_cache
            .claim_check_in_snapshot(qr_code.to_string())
            .await
            .map_err(|err| {
                error!(ticket_id = snapshot.ticket_id, cache_error = ?err, "check_in: snapshot claim failed");
                CheckInError::Internal(err)
            })?;

        match claim {
            SnapshotClaim::Claimed => {}
            SnapshotClaim::AlreadyChecked => {
                return Ok(Some(CheckInOutcome::AlreadyUsed {
                    ticket_id: snapshot.ticket_id,
                }));
            }
            // Expired between read and claim.
            SnapshotClaim::Missing => return Ok(None),
        }

        self.publish_check_event(CheckEvent {
            ticket_id: snapshot.ticket_id,
            qr_code: qr_code.to_string(),
            current_stop: current_stop.to_string(),
            checked_at: Utc::now(),
        })
        .await;

        info!(ticket_id = snapshot.ticket_id, route_id, "check_in: boarded via snapshot");
        Ok(Some(outcome))
    }

    async fn slow_path_by_qr(
        &self,
        route_id: i64,
        qr_code: &str,
        current_stop: &str,
    ) -> UseCaseResult<CheckInOutcome> {
        let ticket = self
            .ticket_repository
            .find_by_qr_code(qr_code.to_string())
            .await
            .map_err(|err| {
                error!(db_error = ?err, "check_in: failed to load ticket by qr code");
                CheckInError::Internal(err)
            })?;

        match ticket {
            Some(ticket) => self.board_from_row(route_id, ticket, current_stop).await,
            None => Ok(CheckInOutcome::Invalid),
        }
    }

    async fn board_from_row(
        &self,
        route_id: i64,
        ticket: TicketEntity,
        current_stop: &str,
    ) -> UseCaseResult<CheckInOutcome> {
        if let Some(rejection) = reject_ticket(&ticket, route_id) {
            return Ok(rejection);
        }

        let outcome = self
            .boarding_outcome(
                Boarding {
                    ticket_id: ticket.id,
                    route_id,
                    end_destination: &ticket.end_destination,
                },
                current_stop,
            )
            .await?;

        // A snapshot claimed on the fast path may not have reached the row yet.
        let claimed = match self
            .status_cache
            .claim_check_in_snapshot(ticket.qr_code.clone())
            .await
        {
            Ok(SnapshotClaim::AlreadyChecked) => {
                return Ok(CheckInOutcome::AlreadyUsed {
                    ticket_id: ticket.id,
                });
            }
            Ok(SnapshotClaim::Claimed) => true,
            Ok(SnapshotClaim::Missing) => false,
            Err(err) => {
                warn!(ticket_id = ticket.id, cache_error = ?err, "check_in: snapshot claim failed on row path");
                false
            }
        };

        let marked = match self.ticket_repository.mark_checked(ticket.id).await {
            Ok(marked) => marked,
            Err(err) => {
                error!(ticket_id = ticket.id, db_error = ?err, "check_in: failed to mark ticket checked");
                if claimed {
                    self.release_snapshot(ticket.id, &ticket.qr_code).await;
                }
                return Err(CheckInError::Internal(err));
            }
        };

        if !marked {
            // Lost a race; report what the row says now.
            let current = self
                .ticket_repository
                .find_by_id(ticket.id)
                .await
                .map_err(CheckInError::Internal)?;
            return Ok(current
                .and_then(|t| reject_ticket(&t, route_id))
                .unwrap_or(CheckInOutcome::AlreadyUsed {
                    ticket_id: ticket.id,
                }));
        }

        info!(ticket_id = ticket.id, route_id, "check_in: boarded via ticket row");
        Ok(outcome)
    }

    // The rider was not boarded, so the next scan must be able to claim again.
    async fn release_snapshot(&self, ticket_id: i64, qr_code: &str) {
        if let Err(err) = self
            .status_cache
            .release_check_in_snapshot(qr_code.to_string())
            .await
        {
            error!(ticket_id, cache_error = ?err, "check_in: failed to release claimed snapshot");
        }
    }

    /// Valid, or over-travel with the extra fare from the ticket's end to the current stop.
    async fn boarding_outcome(
        &self,
        boarding: Boarding<'_>,
        current_stop: &str,
    ) -> UseCaseResult<CheckInOutcome> {
        let Boarding {
            ticket_id,
            route_id,
            end_destination,
        } = boarding;

        let current = self
            .stop_repository
            .find_stop(route_id, current_stop.to_string())
            .await
            .map_err(CheckInError::Internal)?
            .ok_or_else(|| {
                CheckInError::Validation(format!("unknown stop {current_stop} on this route"))
            })?;
        let destination = self
            .stop_repository
            .find_stop(route_id, end_destination.to_string())
            .await
            .map_err(CheckInError::Internal)?
            .ok_or_else(|| {
                CheckInError::Internal(anyhow!(
                    "ticket {ticket_id} ends at {end_destination}, which route {route_id} does not serve"
                ))
            })?;

        if !is_over_travel(current.stop_order, destination.stop_order) {
            return Ok(CheckInOutcome::Valid { ticket_id });
        }

        let extra_fare = self
            .fare_calculator
            .calculate_fare(route_id, destination.name.clone(), current.name.clone())
            .await
            .map_err(|err| {
                error!(ticket_id, route_id, error = ?err, "check_in: extra fare lookup failed");
                CheckInError::Internal(err)
            })?;

        info!(
            ticket_id,
            destination_order = destination.stop_order,
            current_order = current.stop_order,
            "check_in: over-travel detected"
        );
        Ok(CheckInOutcome::OverTravel {
            ticket_id,
            extra_fare: round_up_fare(extra_fare),
            current_stop: current.name,
            ticket_end: destination.name,
        })
    }

    /// The row catches up through the queue; a direct write covers a queue outage.
    async fn publish_check_event(&self, event: CheckEvent) {
        let ticket_id = event.ticket_id;
        let Err(err) = self.job_repository.enqueue_check_event(event).await else {
            return;
        };
        warn!(ticket_id, db_error = ?err, "check_in: check event enqueue failed; marking row directly");

        match self.ticket_repository.mark_checked(ticket_id).await {
            Ok(true) => {}
            Ok(false) => {
                error!(ticket_id, "check_in: row could not be marked checked after snapshot claim")
            }
            Err(err) => {
                error!(ticket_id, db_error = ?err, "check_in: row left unchecked after snapshot claim")
            }
        }
    }
}

fn required_stop(raw: &str) -> UseCaseResult<String> {
    let stop = raw.trim();
    if stop.is_empty() {
        return Err(CheckInError::Validation(
            "current_stop is required".to_string(),
        ));
    }
    Ok(stop.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use crates::domain::{
        entities::stops::StopEntity,
        repositories::{
            job::MockJobRepository,
            routes::{MockFareCalculator, MockRouteStopRepository},
            status_cache::MockStatusCache,
            tickets::MockTicketRepository,
        },
        value_objects::check_in::CheckInSnapshot,
    };
    use uuid::Uuid;

    type TestUseCase = CheckInUseCase<
        MockTicketRepository,
        MockStatusCache,
        MockJobRepository,
        MockRouteStopRepository,
        MockFareCalculator,
    >;

    const ROUTE: i64 = 3;
    const QR: &str = "QR-9";

    struct Mocks {
        tickets: MockTicketRepository,
        cache: MockStatusCache,
        jobs: MockJobRepository,
        stops: MockRouteStopRepository,
        fares: MockFareCalculator,
    }

    impl Mocks {
        fn new() -> Self {
            let mut stops = MockRouteStopRepository::new();
            stops.expect_find_stop().returning(|route_id, name| {
                let order = match name.as_str() {
                    "A" => Some(1),
                    "B" => Some(2),
                    "C" => Some(3),
                    "D" => Some(4),
                    "E" => Some(5),
                    _ => None,
                };
                let stop = order.map(|stop_order| StopEntity {
                    id: i64::from(stop_order),
                    route_id,
                    name: name.clone(),
                    stop_order,
                });
                Box::pin(async move { Ok(stop) })
            });
            Self {
                tickets: MockTicketRepository::new(),
                cache: MockStatusCache::new(),
                jobs: MockJobRepository::new(),
                stops,
                fares: MockFareCalculator::new(),
            }
        }

        fn build(self) -> TestUseCase {
            CheckInUseCase::new(
                Arc::new(self.tickets),
                Arc::new(self.cache),
                Arc::new(self.jobs),
                Arc::new(self.stops),
                Arc::new(self.fares),
            )
        }
    }

    fn snapshot(checked: bool) -> CheckInSnapshot {
        CheckInSnapshot {
            ticket_id: 9,
            route_id: ROUTE,
            start_destination: "A".to_string(),
            end_destination: "C".to_string(),
            user_id: 1,
            created_at: Utc::now(),
            checked,
        }
    }

    fn paid_ticket() -> TicketEntity {
        TicketEntity {
            id: 9,
            user_id: 1,
            route_id: ROUTE,
            bus_name: "Green Line".to_string(),
            start_destination: "A".to_string(),
            end_destination: "C".to_string(),
            fare: 20.0,
            payment_method: "gateway".to_string(),
            payment_status: "paid".to_string(),
            paid_status: true,
            payment_used: true,
            batch_id: Uuid::new_v4(),
            qr_code: QR.to_string(),
            checked: false,
            cancelled_at: None,
            created_at: Utc::now(),
            gateway_tran_id: None,
        }
    }

    fn scan(stop: &str) -> CheckInRequest {
        CheckInRequest {
            qr_code: QR.to_string(),
            current_stop: stop.to_string(),
        }
    }

    fn with_snapshot(mocks: &mut Mocks, checked: bool) {
        mocks
            .cache
            .expect_get_check_in_snapshot()
            .returning(move |_| Box::pin(async move { Ok(Some(snapshot(checked))) }));
    }

    fn without_snapshot(mocks: &mut Mocks) {
        mocks
            .cache
            .expect_get_check_in_snapshot()
            .returning(|_| Box::pin(async { Ok(None) }));
    }

    fn claim_returns(mocks: &mut Mocks, claim: SnapshotClaim) {
        mocks
            .cache
            .expect_claim_check_in_snapshot()
            .returning(move |_| Box::pin(async move { Ok(claim) }));
    }

    #[tokio::test]
    async fn fast_path_boards_and_emits_check_event() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        claim_returns(&mut mocks, SnapshotClaim::Claimed);
        mocks
            .jobs
            .expect_enqueue_check_event()
            .withf(|event| event.ticket_id == 9 && event.qr_code == QR && event.current_stop == "B")
            .times(1)
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));
        mocks.tickets.expect_mark_checked().never();

        let outcome = mocks.build().check_in(ROUTE, scan("B")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::Valid { ticket_id: 9 });
    }

    #[tokio::test]
    async fn over_travel_past_destination_charges_extra() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        claim_returns(&mut mocks, SnapshotClaim::Claimed);
        mocks
            .fares
            .expect_calculate_fare()
            .withf(|route_id, from, to| *route_id == ROUTE && from == "C" && to == "E")
            .times(1)
            .returning(|_, _, _| Box::pin(async { Ok(14.2) }));
        mocks
            .jobs
            .expect_enqueue_check_event()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));

        let outcome = mocks.build().check_in(ROUTE, scan("E")).await.unwrap();

        assert_eq!(
            outcome,
            CheckInOutcome::OverTravel {
                ticket_id: 9,
                extra_fare: 15.0,
                current_stop: "E".to_string(),
                ticket_end: "C".to_string(),
            }
        );
        assert!(outcome.is_boarding());
    }

    #[tokio::test]
    async fn scan_at_destination_is_valid() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        claim_returns(&mut mocks, SnapshotClaim::Claimed);
        mocks.fares.expect_calculate_fare().never();
        mocks
            .jobs
            .expect_enqueue_check_event()
            .returning(|_| Box::pin(async { Ok(Uuid::new_v4()) }));

        let outcome = mocks.build().check_in(ROUTE, scan("C")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::Valid { ticket_id: 9 });
    }

    #[tokio::test]
    async fn concurrent_scan_loses_the_claim() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        claim_returns(&mut mocks, SnapshotClaim::AlreadyChecked);
        mocks.jobs.expect_enqueue_check_event().never();

        let outcome = mocks.build().check_in(ROUTE, scan("B")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::AlreadyUsed { ticket_id: 9 });
    }

    #[tokio::test]
    async fn checked_snapshot_is_already_used() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, true);
        mocks.cache.expect_claim_check_in_snapshot().never();

        let outcome = mocks.build().check_in(ROUTE, scan("B")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::AlreadyUsed { ticket_id: 9 });
    }

    #[tokio::test]
    async fn snapshot_for_another_route_is_rejected() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        mocks.cache.expect_claim_check_in_snapshot().never();

        let outcome = mocks.build().check_in(ROUTE + 1, scan("B")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::InvalidRoute { ticket_id: 9 });
    }

    #[tokio::test]
    async fn enqueue_failure_marks_row_directly() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        claim_returns(&mut mocks, SnapshotClaim::Claimed);
        mocks
            .jobs
            .expect_enqueue_check_event()
            .returning(|_| Box::pin(async { Err(anyhow!("db busy")) }));
        mocks
            .tickets
            .expect_mark_checked()
            .withf(|id| *id == 9)
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));

        let outcome = mocks.build().check_in(ROUTE, scan("B")).await.unwrap();

        assert!(outcome.is_boarding());
    }

    #[tokio::test]
    async fn unknown_qr_code_is_invalid_without_side_effects() {
        let mut mocks = Mocks::new();
        without_snapshot(&mut mocks);
        mocks
            .tickets
            .expect_find_by_qr_code()
            .returning(|_| Box::pin(async { Ok(None) }));
        mocks.tickets.expect_mark_checked().never();

        let outcome = mocks.build().check_in(ROUTE, scan("B")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::Invalid);
    }

    #[tokio::test]
    async fn slow_path_marks_row_checked() {
        let mut mocks = Mocks::new();
        without_snapshot(&mut mocks);
        claim_returns(&mut mocks, SnapshotClaim::Missing);
        mocks
            .tickets
            .expect_find_by_qr_code()
            .returning(|_| Box::pin(async { Ok(Some(paid_ticket())) }));
        mocks
            .tickets
            .expect_mark_checked()
            .times(1)
            .returning(|_| Box::pin(async { Ok(true) }));
        mocks.jobs.expect_enqueue_check_event().never();

        let outcome = mocks.build().check_in(ROUTE, scan("A")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::Valid { ticket_id: 9 });
    }

    #[tokio::test]
    async fn cancelled_ticket_cannot_board() {
        let mut mocks = Mocks::new();
        without_snapshot(&mut mocks);
        mocks.tickets.expect_find_by_qr_code().returning(|_| {
            let mut ticket = paid_ticket();
            ticket.cancelled_at = Some(Utc::now());
            ticket.paid_status = false;
            Box::pin(async move { Ok(Some(ticket)) })
        });
        mocks.tickets.expect_mark_checked().never();

        let outcome = mocks.build().check_in(ROUTE, scan("B")).await.unwrap();

        assert_eq!(outcome, CheckInOutcome::Cancelled { ticket_id: 9 });
    }

    #[tokio::test]
    async fn unpaid_ticket_cannot_board() {
        let mut mocks = Mocks::new();
        mocks.tickets.expect_find_by_id().returning(|_| {
            let mut ticket = paid_ticket();
            ticket.paid_status = false;
            Box::pin(async move { Ok(Some(ticket)) })
        });
        mocks.tickets.expect_mark_checked().never();

        let outcome = mocks
            .build()
            .validate_ticket(
                ROUTE,
                ValidateTicketRequest {
                    ticket_id: 9,
                    current_stop: "B".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, CheckInOutcome::Unpaid { ticket_id: 9 });
    }

    #[tokio::test]
    async fn row_path_respects_a_claimed_snapshot() {
        let mut mocks = Mocks::new();
        claim_returns(&mut mocks, SnapshotClaim::AlreadyChecked);
        mocks
            .tickets
            .expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(Some(paid_ticket())) }));
        mocks.tickets.expect_mark_checked().never();

        let outcome = mocks
            .build()
            .validate_ticket(
                ROUTE,
                ValidateTicketRequest {
                    ticket_id: 9,
                    current_stop: "B".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome, CheckInOutcome::AlreadyUsed { ticket_id: 9 });
    }

    #[tokio::test]
    async fn unknown_current_stop_is_a_validation_error() {
        let mut mocks = Mocks::new();
        with_snapshot(&mut mocks, false);
        mocks.cache.expect_claim_check_in_snapshot().never();

        let err = mocks.build().check_in(ROUTE, scan("Z")).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn store_failure_after_claim_releases_the_snapshot() {
        let mut mocks = Mocks::new();
        claim_returns(&mut mocks, SnapshotClaim::Claimed);
        mocks
            .tickets
            .expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(Some(paid_ticket())) }));
        mocks
            .tickets
            .expect_mark_checked()
            .times(1)
            .returning(|_| Box::pin(async { Err(anyhow!("connection reset")) }));
        mocks
            .cache
            .expect_release_check_in_snapshot()
            .withf(|qr_code| qr_code == QR)
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));

        let err = mocks
            .build()
            .validate_ticket(
                ROUTE,
                ValidateTicketRequest {
                    ticket_id: 9,
                    current_stop: "B".to_string(),
                },
            )
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn store_failure_without_claim_leaves_cache_alone() {
        let mut mocks = Mocks::new();
        without_snapshot(&mut mocks);
        claim_returns(&mut mocks, SnapshotClaim::Missing);
        mocks
            .tickets
            .expect_find_by_qr_code()
            .returning(|_| Box::pin(async { Ok(Some(paid_ticket())) }));
        mocks
            .tickets
            .expect_mark_checked()
            .returning(|_| Box::pin(async { Err(anyhow!("connection reset")) }));
        mocks.cache.expect_release_check_in_snapshot().never();

        let err = mocks.build().check_in(ROUTE, scan("B")).await.unwrap_err();

        assert!(matches!(err, CheckInError::Internal(_)));
    }
}
