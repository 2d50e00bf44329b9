use crate::{
    axum_http::error_responses::{api_error_response, error_response},
    usecases::{
        payment_reconciliation::{PaymentReconciliationUseCase, parse_notification},
        recharge::RechargeUseCase,
    },
};
use axum::{
    Form, Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use crates::{
    domain::{
        repositories::{
            payment_gateway::PaymentGateway, status_cache::StatusCache,
            tickets::TicketRepository, transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::{
            enums::payment_statuses::PaymentStatus, payment_gateway::PaymentNotification,
        },
    },
    infra::{
        cache::redis_status_cache::RedisStatusCache,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                tickets::TicketPostgres, transactions::TransactionPostgres, users::UserPostgres,
            },
        },
    },
    payments::sslcommerz_client::SslCommerzClient,
};
use std::sync::Arc;
use tracing::{error, warn};

type Reconciliation = PaymentReconciliationUseCase<
    TicketPostgres,
    RedisStatusCache,
    SslCommerzClient,
    UserPostgres,
    TransactionPostgres,
>;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    status_cache: Arc<RedisStatusCache>,
    payment_gateway: Arc<SslCommerzClient>,
    public_base_url: &str,
) -> Router {
    let ticket_repository = Arc::new(TicketPostgres::new(Arc::clone(&db_pool)));
    let user_repository = Arc::new(UserPostgres::new(Arc::clone(&db_pool)));
    let transaction_repository = Arc::new(TransactionPostgres::new(Arc::clone(&db_pool)));

    let recharge_usecase = RechargeUseCase::new(
        Arc::clone(&status_cache),
        Arc::clone(&payment_gateway),
        user_repository,
        transaction_repository,
        public_base_url,
    );
    let reconciliation_usecase: Reconciliation = PaymentReconciliationUseCase::new(
        ticket_repository,
        status_cache,
        payment_gateway,
        Arc::new(recharge_usecase),
    );

    Router::new()
        .route(
            "/ipn",
            post(
                ipn::<
                    TicketPostgres,
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .route(
            "/success",
            post(
                success::<
                    TicketPostgres,
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .route(
            "/fail",
            post(
                fail::<
                    TicketPostgres,
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .route(
            "/cancel",
            post(
                cancel::<
                    TicketPostgres,
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .with_state(Arc::new(reconciliation_usecase))
}

/// Gateway server-to-server notification. Non-2xx only for malformed payloads (400)
/// and transient failures (500) so the gateway retries what can still succeed.
pub async fn ipn<T, C, G, U, X>(
    State(reconciliation_usecase): State<Arc<PaymentReconciliationUseCase<T, C, G, U, X>>>,
    Form(notification): Form<PaymentNotification>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    match reconciliation_usecase.handle_notification(notification).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) if err.is_malformed() => {
            warn!(error = %err, "payments: malformed ipn rejected");
            error_response(StatusCode::BAD_REQUEST, err.to_string())
        }
        Err(err) => {
            error!(error = ?err, "payments: ipn processing failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

pub async fn success<T, C, G, U, X>(
    State(reconciliation_usecase): State<Arc<PaymentReconciliationUseCase<T, C, G, U, X>>>,
    Form(notification): Form<PaymentNotification>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    let confirmation = match parse_notification(&notification) {
        Ok(confirmation) => confirmation,
        Err(err) => return api_error_response(&err),
    };

    match reconciliation_usecase.confirm(confirmation).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn fail<T, C, G, U, X>(
    State(reconciliation_usecase): State<Arc<PaymentReconciliationUseCase<T, C, G, U, X>>>,
    Form(notification): Form<PaymentNotification>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    record_outcome(&reconciliation_usecase, notification, PaymentStatus::Failed).await
}

pub async fn cancel<T, C, G, U, X>(
    State(reconciliation_usecase): State<Arc<PaymentReconciliationUseCase<T, C, G, U, X>>>,
    Form(notification): Form<PaymentNotification>,
) -> impl IntoResponse
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    record_outcome(&reconciliation_usecase, notification, PaymentStatus::Cancelled).await
}

async fn record_outcome<T, C, G, U, X>(
    reconciliation_usecase: &PaymentReconciliationUseCase<T, C, G, U, X>,
    notification: PaymentNotification,
    status: PaymentStatus,
) -> Response
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    let Some(tran_id) = notification
        .tran_id
        .map(|tran_id| tran_id.trim().to_string())
        .filter(|tran_id| !tran_id.is_empty())
    else {
        return error_response(StatusCode::BAD_REQUEST, "tran_id is required");
    };

    match reconciliation_usecase
        .record_payment_outcome(tran_id, status)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(err) => api_error_response(&err),
    }
}
