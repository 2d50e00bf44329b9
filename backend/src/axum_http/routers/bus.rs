use crate::{
    auth::AuthBus,
    axum_http::error_responses::api_error_response,
    usecases::{
        check_in::CheckInUseCase, rfid::RfidUseCase, ticket_lifecycle::TicketLifecycleUseCase,
    },
};
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use crates::{
    domain::{
        repositories::{
            job::JobRepository,
            routes::{FareCalculator, RouteStopRepository},
            status_cache::StatusCache,
            tickets::TicketRepository,
            transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::{
            check_in::{CheckInRequest, CheckInResponse, ValidateTicketRequest},
            over_travel::OverTravelRequest,
            rfid::{RfidPaymentRequest, RfidTap},
        },
    },
    infra::{
        cache::redis_status_cache::RedisStatusCache,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                job::JobPostgres, routes::RoutePostgres, tickets::TicketPostgres,
                transactions::TransactionPostgres, users::UserPostgres,
            },
        },
    },
};
use std::sync::Arc;

pub fn routes(db_pool: Arc<PgPoolSquad>, status_cache: Arc<RedisStatusCache>) -> Router {
    let ticket_repository = Arc::new(TicketPostgres::new(Arc::clone(&db_pool)));
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let transaction_repository = Arc::new(TransactionPostgres::new(Arc::clone(&db_pool)));
    let job_repository = Arc::new(JobPostgres::new(Arc::clone(&db_pool)));
    let route_repository = Arc::new(RoutePostgres::new(Arc::clone(&db_pool)));

    let check_in_usecase = CheckInUseCase::new(
        Arc::clone(&ticket_repository),
        Arc::clone(&status_cache),
        Arc::clone(&job_repository),
        Arc::clone(&route_repository),
        Arc::clone(&route_repository),
    );
    let rfid_usecase = RfidUseCase::new(
        Arc::clone(&user_repository),
        Arc::clone(&ticket_repository),
        Arc::clone(&transaction_repository),
        Arc::clone(&route_repository),
        Arc::clone(&job_repository),
    );
    let lifecycle_usecase = TicketLifecycleUseCase::new(
        ticket_repository,
        user_repository,
        transaction_repository,
        status_cache,
        route_repository,
        job_repository,
    );

    let check_in_routes = Router::new()
        .route(
            "/check-ticket",
            post(
                check_ticket::<
                    TicketPostgres,
                    RedisStatusCache,
                    JobPostgres,
                    RoutePostgres,
                    RoutePostgres,
                >,
            ),
        )
        .route(
            "/validate-ticket",
            post(
                validate_ticket::<
                    TicketPostgres,
                    RedisStatusCache,
                    JobPostgres,
                    RoutePostgres,
                    RoutePostgres,
                >,
            ),
        )
        .with_state(Arc::new(check_in_usecase));

    let rfid_routes = Router::new()
        .route(
            "/rfid-payment",
            post(
                rfid_payment::<
                    UserPostgres,
                    TicketPostgres,
                    TransactionPostgres,
                    RoutePostgres,
                    JobPostgres,
                >,
            ),
        )
        .with_state(Arc::new(rfid_usecase));

    let over_travel_routes = Router::new()
        .route(
            "/over-travel",
            post(
                over_travel::<
                    TicketPostgres,
                    UserPostgres,
                    TransactionPostgres,
                    RedisStatusCache,
                    RoutePostgres,
                    JobPostgres,
                >,
            ),
        )
        .with_state(Arc::new(lifecycle_usecase));

    check_in_routes.merge(rfid_routes).merge(over_travel_routes)
}

pub async fn check_ticket<T, C, J, S, F>(
    State(check_in_usecase): State<Arc<CheckInUseCase<T, C, J, S, F>>>,
    AuthBus { route_id, .. }: AuthBus,
    Json(request): Json<CheckInRequest>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    S: RouteStopRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    match check_in_usecase.check_in(route_id, request).await {
        Ok(outcome) => (StatusCode::OK, Json(CheckInResponse::from(outcome))).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn validate_ticket<T, C, J, S, F>(
    State(check_in_usecase): State<Arc<CheckInUseCase<T, C, J, S, F>>>,
    AuthBus { route_id, .. }: AuthBus,
    Json(request): Json<ValidateTicketRequest>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    S: RouteStopRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    match check_in_usecase.validate_ticket(route_id, request).await {
        Ok(outcome) => (StatusCode::OK, Json(CheckInResponse::from(outcome))).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn over_travel<T, U, X, C, F, J>(
    State(lifecycle_usecase): State<Arc<TicketLifecycleUseCase<T, U, X, C, F, J>>>,
    AuthBus {
        route_id, bus_name, ..
    }: AuthBus,
    Json(request): Json<OverTravelRequest>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    match lifecycle_usecase
        .create_over_travel_ticket(route_id, bus_name, request)
        .await
    {
        Ok(ticket) => (StatusCode::CREATED, Json(ticket)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn rfid_payment<U, T, X, F, J>(
    State(rfid_usecase): State<Arc<RfidUseCase<U, T, X, F, J>>>,
    AuthBus {
        route_id, bus_name, ..
    }: AuthBus,
    Json(request): Json<RfidPaymentRequest>,
) -> impl IntoResponse
where
    U: UserRepository + Send + Sync,
    T: TicketRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    let tap = RfidTap {
        rfid: request.rfid,
        route_id,
        bus_name,
        start_destination: request.start_destination,
        end_destination: request.end_destination,
    };

    match rfid_usecase.pay(tap).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => api_error_response(&err),
    }
}
