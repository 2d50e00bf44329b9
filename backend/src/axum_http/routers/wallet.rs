use crate::{
    auth::AuthUser,
    axum_http::error_responses::{api_error_response, error_response},
    usecases::recharge::RechargeUseCase,
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
            transactions::TransactionRepository, users::UserRepository,
        },
        value_objects::{payment_gateway::PaymentNotification, recharge::InitRechargeRequest},
    },
    infra::{
        cache::redis_status_cache::RedisStatusCache,
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{transactions::TransactionPostgres, users::UserPostgres},
        },
    },
    payments::sslcommerz_client::SslCommerzClient,
};
use serde_json::json;
use std::sync::Arc;

pub fn routes(
    db_pool: Arc<PgPoolSquad>,
    status_cache: Arc<RedisStatusCache>,
    payment_gateway: Arc<SslCommerzClient>,
    public_base_url: &str,
) -> Router {
    let user_repository = UserPostgres::new(Arc::clone(&db_pool));
    let transaction_repository = TransactionPostgres::new(Arc::clone(&db_pool));

    let recharge_usecase = RechargeUseCase::new(
        status_cache,
        payment_gateway,
        Arc::new(user_repository),
        Arc::new(transaction_repository),
        public_base_url,
    );

    Router::new()
        .route(
            "/recharge",
            post(
                init_recharge::<
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .route(
            "/recharge/success",
            post(
                recharge_success::<
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .route(
            "/recharge/fail",
            post(
                recharge_closed::<
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .route(
            "/recharge/cancel",
            post(
                recharge_closed::<
                    RedisStatusCache,
                    SslCommerzClient,
                    UserPostgres,
                    TransactionPostgres,
                >,
            ),
        )
        .with_state(Arc::new(recharge_usecase))
}

pub async fn init_recharge<C, G, U, X>(
    State(recharge_usecase): State<Arc<RechargeUseCase<C, G, U, X>>>,
    AuthUser { user_id }: AuthUser,
    Json(request): Json<InitRechargeRequest>,
) -> impl IntoResponse
where
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    match recharge_usecase.init_recharge(user_id, request.amount).await {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

pub async fn recharge_success<C, G, U, X>(
    State(recharge_usecase): State<Arc<RechargeUseCase<C, G, U, X>>>,
    Form(notification): Form<PaymentNotification>,
) -> impl IntoResponse
where
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    let (Some(val_id), Some(tran_id)) = (
        required_field(notification.val_id),
        required_field(notification.tran_id),
    ) else {
        return error_response(StatusCode::BAD_REQUEST, "val_id and tran_id are required");
    };

    match recharge_usecase.complete_recharge(val_id, tran_id).await {
        Ok(completed) => (StatusCode::OK, Json(completed)).into_response(),
        Err(err) => api_error_response(&err),
    }
}

/// Fail and cancel redirects both drop the pending session.
pub async fn recharge_closed<C, G, U, X>(
    State(recharge_usecase): State<Arc<RechargeUseCase<C, G, U, X>>>,
    Form(notification): Form<PaymentNotification>,
) -> Response
where
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    let Some(tran_id) = required_field(notification.tran_id) else {
        return error_response(StatusCode::BAD_REQUEST, "tran_id is required");
    };

    match recharge_usecase.cancel_recharge(tran_id.clone()).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "tran_id": tran_id, "status": "cancelled" })),
        )
            .into_response(),
        Err(err) => api_error_response(&err),
    }
}

fn required_field(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
