use crate::{
    auth::AuthUser,
    axum_http::error_responses::api_error_response,
    usecases::{purchase::PurchaseUseCase, ticket_lifecycle::TicketLifecycleUseCase},
};
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use crates::{
    domain::{
        repositories::{
            job::JobRepository, routes::FareCalculator, status_cache::StatusCache,
            tickets::TicketRepository, transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::tickets::{BuyTicketRequest, TicketListQuery, TrackingStatusQuery},
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

    let purchase_usecase = PurchaseUseCase::new(
        Arc::clone(&ticket_repository),
        Arc::clone(&status_cache),
        Arc::clone(&job_repository),
        Arc::clone(&route_repository),
    );
    let lifecycle_usecase = TicketLifecycleUseCase::new(
        ticket_repository,
        user_repository,
        transaction_repository,
        status_cache,
        route_repository,
        job_repository,
    );

    let purchase_routes = Router::new()
        .route(
            "/buy",
            post(buy::<TicketPostgres, RedisStatusCache, JobPostgres, RoutePostgres>),
        )
        .route(
            "/status",
            get(tracking_status::<TicketPostgres, RedisStatusCache, JobPostgres, RoutePostgres>),
        )
        .with_state(Arc::new(purchase_usecase));

    let lifecycle_routes = Router::new()
        .route(
            "/",
            get(list_tickets::<
                TicketPostgres,
                UserPostgres,
                TransactionPostgres,
                RedisStatusCache,
                RoutePostgres,
                JobPostgres,
            >),
        )
        .route(
            "/:id/payment-status",
            get(payment_status::<
                TicketPostgres,
                UserPostgres,
                TransactionPostgres,
                RedisStatusCache,
                RoutePostgres,
                JobPostgres,
            >),
        )
        .route(
            "/:id/cancel",
            post(cancel_ticket::<
                TicketPostgres,
                UserPostgres,
                TransactionPostgres,
                RedisStatusCache,
                RoutePostgres,
                JobPostgres,
            >),
        )
        .with_state(Arc::new(lifecycle_usecase));

    purchase_routes.merge(lifecycle_routes)
}

pub async fn buy<T, C, J, F>(
    State(purchase_usecase): State<Arc<PurchaseUseCase<T, C, J, F>>>,
    AuthUser { user_id }: AuthUser,
    Json(request): Json<BuyTicketRequest>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    match purchase_usecase.buy(user_id, request).await {
        Ok(accepted) => (StatusCode::ACCEPTED, Json(accepted)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn tracking_status<T, C, J, F>(
    State(purchase_usecase): State<Arc<PurchaseUseCase<T, C, J, F>>>,
    _auth: AuthUser,
    Query(query): Query<TrackingStatusQuery>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    J: JobRepository + Send + Sync,
    F: FareCalculator + Send + Sync,
{
    match purchase_usecase.tracking_status(query.tracking_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn list_tickets<T, U, X, C, F, J>(
    State(lifecycle_usecase): State<Arc<TicketLifecycleUseCase<T, U, X, C, F, J>>>,
    AuthUser { user_id }: AuthUser,
    Query(query): Query<TicketListQuery>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    match lifecycle_usecase.list_tickets(user_id, query).await {
        Ok(tickets) => (StatusCode::OK, Json(tickets)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn payment_status<T, U, X, C, F, J>(
    State(lifecycle_usecase): State<Arc<TicketLifecycleUseCase<T, U, X, C, F, J>>>,
    AuthUser { user_id }: AuthUser,
    Path(ticket_id): Path<i64>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    match lifecycle_usecase.get_payment_status(user_id, ticket_id).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn cancel_ticket<T, U, X, C, F, J>(
    State(lifecycle_usecase): State<Arc<TicketLifecycleUseCase<T, U, X, C, F, J>>>,
    AuthUser { user_id }: AuthUser,
    Path(ticket_id): Path<i64>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    F: FareCalculator + Send + Sync,
    J: JobRepository + Send + Sync,
{
    match lifecycle_usecase.cancel_ticket(user_id, ticket_id).await {
        Ok(cancelled) => (StatusCode::OK, Json(cancelled)).into_response(),
        Err(err) => api_error_response(&err),
    }
}
