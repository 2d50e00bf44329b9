use std::sync::Arc;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use crates::{
    application::compensation::BalanceCompensator,
    domain::{
        entities::tickets::InsertTicketEntity,
        repositories::{
            job::JobRepository, routes::FareCalculator, tickets::TicketRepository,
            transactions::TransactionRepository, users::UserRepository,
        },
        value_objects::{
            balances::DebitOutcome,
            enums::{
                payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
                transaction_types::TransactionType,
            },
            fares::round_up_fare,
            ledger::{ledger_entry, rfid_trip_description},
            qr_codes::rfid_qr_code,
            rfid::{DUPLICATE_TAP_WINDOW_SECS, RfidPaymentResponse, RfidStatus, RfidTap},
            ticket_jobs::BalanceCompensation,
        },
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum RfidError {
    #[error("{0}")]
    Validation(String),
    #[error("rfid card is not registered")]
    CardNotFound,
    #[error("fare is unavailable for this trip")]
    FareUnavailable(#[source] anyhow::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError for RfidError {
    fn status_code(&self) -> StatusCode {
        match self {
            RfidError::Validation(_) => StatusCode::BAD_REQUEST,
            RfidError::CardNotFound => StatusCode::NOT_FOUND,
            RfidError::FareUnavailable(_) => StatusCode::BAD_GATEWAY,
            RfidError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, RfidError>;

pub struct RfidUseCase<U, T, X, F, J>
where
    U: UserRepository + Send + Sync,
    T: TicketRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    user_repository: Arc<U>,
    ticket_repository: Arc<T>,
    transaction_repository: Arc<X>,
    fare_calculator: Arc<F>,
    compensator: BalanceCompensator<U, J>,
}

impl<U, T, X, F, J> RfidUseCase<U, T, X, F, J>
where
    U: UserRepository + Send + Sync,
    T: TicketRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    pub fn new(
        user_repository: Arc<U>,
        ticket_repository: Arc<T>,
        transaction_repository: Arc<X>,
        fare_calculator: Arc<F>,
        job_repository: Arc<J>,
    ) -> Self {
        Self {
            compensator: BalanceCompensator::new(Arc::clone(&user_repository), job_repository),
            user_repository,
            ticket_repository,
            transaction_repository,
            fare_calculator,
        }
    }

    /// Payment and boarding in one tap.
    pub async fn pay(&self, tap: RfidTap) -> UseCaseResult<RfidPaymentResponse> {
        let rfid = tap.rfid.trim().to_string();
        let start_destination = tap.start_destination.trim().to_string();
        let end_destination = tap.end_destination.trim().to_string();
        if rfid.is_empty() || start_destination.is_empty() || end_destination.is_empty() {
            return Err(RfidError::Validation(
                "rfid, start_destination and end_destination are required".to_string(),
            ));
        }

        let user = self
            .user_repository
            .find_by_rfid(rfid)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "rfid: failed to look up card");
                RfidError::Internal(err)
            })?
            .ok_or(RfidError::CardNotFound)?;

        if !user.is_rfid_active {
            info!(user_id = user.id, "rfid: inactive card tapped");
            return Ok(RfidPaymentResponse {
                success: false,
                status: RfidStatus::Inactive,
                message: "RFID card is inactive".to_string(),
                balance: user.balance,
                fare: 0.0,
                ticket_id: None,
            });
        }

        let latest = self
            .ticket_repository
            .find_latest_on_route(user.id, tap.route_id)
            .await
            .map_err(|err| {
                error!(user_id = user.id, db_error = ?err, "rfid: failed to load latest ticket");
                RfidError::Internal(err)
            })?;
        if let Some(previous) = latest {
            let window = Duration::seconds(DUPLICATE_TAP_WINDOW_SECS);
            if previous.bus_name == tap.bus_name && Utc::now() - previous.created_at < window {
                info!(user_id = user.id, ticket_id = previous.id, "rfid: duplicate tap suppressed");
                return Ok(RfidPaymentResponse {
                    success: true,
                    status: RfidStatus::Duplicate,
                    message: "Already boarded on this bus".to_string(),
                    balance: user.balance,
                    fare: round_up_fare(previous.fare),
                    ticket_id: Some(previous.id),
                });
            }
        }

        let fare = self
            .fare_calculator
            .calculate_fare(
                tap.route_id,
                start_destination.clone(),
                end_destination.clone(),
            )
            .await
            .map_err(|err| {
                warn!(user_id = user.id, route_id = tap.route_id, error = ?err, "rfid: fare lookup failed");
                RfidError::FareUnavailable(err)
            })?;
        let fare = round_up_fare(fare);
        if fare <= 0.0 {
            return Err(RfidError::FareUnavailable(anyhow::anyhow!(
                "non-positive fare {fare}"
            )));
        }

        let balance = match self
            .user_repository
            .debit_balance(user.id, fare)
            .await
            .map_err(|err| {
                error!(user_id = user.id, fare, db_error = ?err, "rfid: debit failed");
                RfidError::Internal(err)
            })? {
            DebitOutcome::Debited { balance } => balance,
            DebitOutcome::Insufficient { balance } => {
                info!(user_id = user.id, fare, balance, "rfid: insufficient balance");
                return Ok(RfidPaymentResponse {
                    success: false,
                    status: RfidStatus::InsufficientBalance,
                    message: "Insufficient balance".to_string(),
                    balance,
                    fare,
                    ticket_id: None,
                });
            }
        };

        let ticket = InsertTicketEntity {
            user_id: user.id,
            route_id: tap.route_id,
            bus_name: tap.bus_name.clone(),
            start_destination,
            end_destination,
            fare,
            payment_method: PaymentMethod::Rfid.to_string(),
            payment_status: PaymentStatus::Paid.to_string(),
            paid_status: true,
            payment_used: true,
            batch_id: Uuid::new_v4(),
            qr_code: rfid_qr_code(),
            checked: true,
            created_at: Utc::now(),
        };

        let ticket = match self.ticket_repository.create(ticket).await {
            Ok(ticket) => ticket,
            Err(err) => {
                error!(user_id = user.id, fare, db_error = ?err, "rfid: ticket insert failed after debit");
                self.compensator
                    .compensate(BalanceCompensation {
                        user_id: user.id,
                        amount: fare,
                        reason: "rfid ticket insert failed".to_string(),
                    })
                    .await;
                return Err(RfidError::Internal(err));
            }
        };

        let entry = ledger_entry(
            user.id,
            fare,
            TransactionType::Purchase,
            rfid_trip_description(&tap.bus_name),
            PaymentMethod::Rfid,
        );
        if let Err(err) = self.transaction_repository.record(entry).await {
            error!(user_id = user.id, ticket_id = ticket.id, db_error = ?err, "rfid: failed to record ledger entry");
        }

        info!(user_id = user.id, ticket_id = ticket.id, fare, balance, "rfid: trip paid");
        Ok(RfidPaymentResponse {
            success: true,
            status: RfidStatus::Success,
            message: "Payment successful".to_string(),
            balance,
            fare,
            ticket_id: Some(ticket.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use crates::domain::{
        entities::{tickets::TicketEntity, users::UserEntity},
        repositories::{
            job::MockJobRepository, routes::MockFareCalculator, tickets::MockTicketRepository,
            transactions::MockTransactionRepository, users::MockUserRepository,
        },
    };
    use std::sync::Mutex;

    type TestUseCase = RfidUseCase<
        MockUserRepository,
        MockTicketRepository,
        MockTransactionRepository,
        MockFareCalculator,
        MockJobRepository,
    >;

    struct Mocks {
        users: MockUserRepository,
        tickets: MockTicketRepository,
        transactions: MockTransactionRepository,
        fares: MockFareCalculator,
        jobs: MockJobRepository,
    }

    impl Mocks {
        fn new(active: bool) -> Self {
            let mut users = MockUserRepository::new();
            users.expect_find_by_rfid().returning(move |rfid| {
                let user = UserEntity {
                    id: 5,
                    name: "Rina".to_string(),
                    email: "rina@example.com".to_string(),
                    balance: 50.0,
                    rfid: Some(rfid),
                    is_rfid_active: active,
                    created_at: Utc::now(),
                };
                Box::pin(async move { Ok(Some(user)) })
            });
            let mut fares = MockFareCalculator::new();
            fares
                .expect_calculate_fare()
                .returning(|_, _, _| Box::pin(async { Ok(19.4) }));
            Self {
                users,
                tickets: MockTicketRepository::new(),
                transactions: MockTransactionRepository::new(),
                fares,
                jobs: MockJobRepository::new(),
            }
        }

        fn build(self) -> TestUseCase {
            RfidUseCase::new(
                Arc::new(self.users),
                Arc::new(self.tickets),
                Arc::new(self.transactions),
                Arc::new(self.fares),
                Arc::new(self.jobs),
            )
        }
    }

    fn tap(bus_name: &str) -> RfidTap {
        RfidTap {
            rfid: "04A1B2C3".to_string(),
            route_id: 3,
            bus_name: bus_name.to_string(),
            start_destination: "A".to_string(),
            end_destination: "C".to_string(),
        }
    }

    fn stored(ticket: InsertTicketEntity, id: i64) -> TicketEntity {
        TicketEntity {
            id,
            user_id: ticket.user_id,
            route_id: ticket.route_id,
            bus_name: ticket.bus_name,
            start_destination: ticket.start_destination,
            end_destination: ticket.end_destination,
            fare: ticket.fare,
            payment_method: ticket.payment_method,
            payment_status: ticket.payment_status,
            paid_status: ticket.paid_status,
            payment_used: ticket.payment_used,
            batch_id: ticket.batch_id,
            qr_code: ticket.qr_code,
            checked: ticket.checked,
            cancelled_at: None,
            created_at: ticket.created_at,
            gateway_tran_id: None,
        }
    }

    #[tokio::test]
    async fn inactive_card_is_rejected_without_mutation() {
        let mut mocks = Mocks::new(false);
        mocks.users.expect_debit_balance().never();

        let response = mocks.build().pay(tap("Green Line")).await.unwrap();

        assert_eq!(response.status, RfidStatus::Inactive);
        assert!(!response.success);
    }

    #[tokio::test]
    async fn unknown_card_is_not_found() {
        let mut users = MockUserRepository::new();
        users
            .expect_find_by_rfid()
            .returning(|_| Box::pin(async { Ok(None) }));
        let mut mocks = Mocks::new(true);
        mocks.users = users;

        let err = mocks.build().pay(tap("Green Line")).await.unwrap_err();

        assert!(matches!(err, RfidError::CardNotFound));
    }

    #[tokio::test]
    async fn taps_within_window_return_the_same_ticket_and_charge_once() {
        let debits = Arc::new(Mutex::new(0));
        let latest: Arc<Mutex<Option<TicketEntity>>> = Arc::new(Mutex::new(None));
        let mut mocks = Mocks::new(true);

        let seen = Arc::clone(&latest);
        mocks
            .tickets
            .expect_find_latest_on_route()
            .returning(move |_, _| {
                let ticket = seen.lock().unwrap().clone();
                Box::pin(async move { Ok(ticket) })
            });
        let counter = Arc::clone(&debits);
        mocks.users.expect_debit_balance().returning(move |_, fare| {
            *counter.lock().unwrap() += 1;
            Box::pin(async move { Ok(DebitOutcome::Debited { balance: 50.0 - fare }) })
        });
        let store = Arc::clone(&latest);
        mocks.tickets.expect_create().returning(move |ticket| {
            let ticket = stored(ticket, 77);
            *store.lock().unwrap() = Some(ticket.clone());
            Box::pin(async move { Ok(ticket) })
        });
        mocks
            .transactions
            .expect_record()
            .withf(|entry| entry.type_ == "purchase" && entry.description == "RFID Trip - Green Line")
            .times(1)
            .returning(|_| Box::pin(async { Ok(1) }));

        let usecase = mocks.build();
        let first = usecase.pay(tap("Green Line")).await.unwrap();
        let second = usecase.pay(tap("Green Line")).await.unwrap();

        assert_eq!(first.status, RfidStatus::Success);
        assert_eq!(first.fare, 20.0);
        assert_eq!(first.balance, 30.0);
        assert_eq!(second.status, RfidStatus::Duplicate);
        assert_eq!(second.ticket_id, first.ticket_id);
        assert_eq!(*debits.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn recent_ticket_on_another_bus_is_not_a_duplicate() {
        let mut mocks = Mocks::new(true);
        mocks.tickets.expect_find_latest_on_route().returning(|_, _| {
            let ticket = stored(
                InsertTicketEntity {
                    user_id: 5,
                    route_id: 3,
                    bus_name: "Blue Line".to_string(),
                    start_destination: "A".to_string(),
                    end_destination: "C".to_string(),
                    fare: 20.0,
                    payment_method: "rfid".to_string(),
                    payment_status: "paid".to_string(),
                    paid_status: true,
                    payment_used: true,
                    batch_id: Uuid::new_v4(),
                    qr_code: "RFID-1".to_string(),
                    checked: true,
                    created_at: Utc::now(),
                },
                70,
            );
            Box::pin(async move { Ok(Some(ticket)) })
        });
        mocks
            .users
            .expect_debit_balance()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(DebitOutcome::Debited { balance: 30.0 }) }));
        mocks
            .tickets
            .expect_create()
            .withf(|ticket| ticket.checked && ticket.paid_status && ticket.qr_code.starts_with("RFID-"))
            .returning(|ticket| Box::pin(async move { Ok(stored(ticket, 71)) }));
        mocks
            .transactions
            .expect_record()
            .returning(|_| Box::pin(async { Ok(1) }));

        let response = mocks.build().pay(tap("Green Line")).await.unwrap();

        assert_eq!(response.ticket_id, Some(71));
    }

    #[tokio::test]
    async fn insufficient_balance_creates_nothing() {
        let mut mocks = Mocks::new(true);
        mocks
            .tickets
            .expect_find_latest_on_route()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        mocks
            .users
            .expect_debit_balance()
            .returning(|_, _| Box::pin(async { Ok(DebitOutcome::Insufficient { balance: 5.0 }) }));
        mocks.tickets.expect_create().never();

        let response = mocks.build().pay(tap("Green Line")).await.unwrap();

        assert_eq!(response.status, RfidStatus::InsufficientBalance);
        assert_eq!(response.balance, 5.0);
    }

    #[tokio::test]
    async fn failed_ticket_insert_is_compensated() {
        let mut mocks = Mocks::new(true);
        mocks
            .tickets
            .expect_find_latest_on_route()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        mocks
            .users
            .expect_debit_balance()
            .returning(|_, _| Box::pin(async { Ok(DebitOutcome::Debited { balance: 30.0 }) }));
        mocks
            .tickets
            .expect_create()
            .returning(|_| Box::pin(async { Err(anyhow!("insert failed")) }));
        mocks
            .users
            .expect_credit_balance()
            .withf(|user_id, amount| *user_id == 5 && *amount == 20.0)
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(50.0) }));
        mocks.transactions.expect_record().never();

        let err = mocks.build().pay(tap("Green Line")).await.unwrap_err();

        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
