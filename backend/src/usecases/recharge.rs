use std::sync::Arc;

use axum::http::StatusCode;
use crates::domain::{
    repositories::{
        payment_gateway::PaymentGateway, status_cache::StatusCache,
        transactions::TransactionRepository, users::UserRepository,
    },
    value_objects::{
        enums::{payment_methods::PaymentMethod, transaction_types::TransactionType},
        ledger::{RECHARGE_DESCRIPTION, ledger_entry},
        payment_gateway::{CallbackUrls, PaymentInitRequest},
        recharge::{
            ALLOWED_RECHARGE_AMOUNTS, RechargeCompletedDto, RechargeInitDto, RechargeSession,
        },
        transaction_ids::recharge_transaction_id,
    },
};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::axum_http::error_responses::ApiError;

#[derive(Debug, Error)]
pub enum RechargeError {
    #[error("recharge amount must be one of 50, 100, 200, 300, 400 or 500")]
    InvalidAmount,
    #[error("user not found")]
    UserNotFound,
    #[error("recharge session expired or not found")]
    SessionNotFound,
    #[error("payment validation failed: {0}")]
    ValidationRejected(String),
    #[error("validated payment does not match the recharge")]
    Mismatch,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RechargeError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RechargeError::Internal(_))
    }
}

impl ApiError for RechargeError {
    fn status_code(&self) -> StatusCode {
        match self {
            RechargeError::InvalidAmount
            | RechargeError::ValidationRejected(_)
            | RechargeError::Mismatch => StatusCode::BAD_REQUEST,
            RechargeError::UserNotFound | RechargeError::SessionNotFound => StatusCode::NOT_FOUND,
            RechargeError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, RechargeError>;

pub struct RechargeUseCase<C, G, U, X>
where
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    status_cache: Arc<C>,
    payment_gateway: Arc<G>,
    user_repository: Arc<U>,
    transaction_repository: Arc<X>,
    callback_urls: CallbackUrls,
}

impl<C, G, U, X> RechargeUseCase<C, G, U, X>
where
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    pub fn new(
        status_cache: Arc<C>,
        payment_gateway: Arc<G>,
        user_repository: Arc<U>,
        transaction_repository: Arc<X>,
        public_base_url: &str,
    ) -> Self {
        Self {
            status_cache,
            payment_gateway,
            user_repository,
            transaction_repository,
            callback_urls: CallbackUrls::recharge(public_base_url),
        }
    }

    pub async fn init_recharge(&self, user_id: i64, amount: i64) -> UseCaseResult<RechargeInitDto> {
        if !ALLOWED_RECHARGE_AMOUNTS.contains(&amount) {
            return Err(RechargeError::InvalidAmount);
        }

        let user = self
            .user_repository
            .find_by_id(user_id)
            .await
            .map_err(|err| {
                error!(user_id, db_error = ?err, "recharge: failed to load user");
                RechargeError::Internal(err)
            })?
            .ok_or(RechargeError::UserNotFound)?;

        let tran_id = recharge_transaction_id(user_id);
        let amount = amount as f64;

        self.status_cache
            .put_recharge_session(tran_id.clone(), RechargeSession { user_id, amount })
            .await
            .map_err(|err| {
                error!(user_id, %tran_id, cache_error = ?err, "recharge: failed to store session");
                RechargeError::Internal(err)
            })?;

        let request = PaymentInitRequest {
            tran_id: tran_id.clone(),
            total_amount: amount,
            product_name: "Wallet Recharge".to_string(),
            customer_name: user.name,
            customer_email: user.email,
            success_url: self.callback_urls.success_url.clone(),
            fail_url: self.callback_urls.fail_url.clone(),
            cancel_url: self.callback_urls.cancel_url.clone(),
            ipn_url: self.callback_urls.ipn_url.clone(),
        };

        let payment_url = match self.payment_gateway.init_payment(request).await {
            Ok(url) => url,
            Err(err) => {
                error!(user_id, %tran_id, error = ?err, "recharge: gateway init failed");
                self.discard_session(&tran_id).await;
                return Err(RechargeError::Internal(err));
            }
        };

        info!(user_id, %tran_id, amount, "recharge: initiated");
        Ok(RechargeInitDto {
            payment_url,
            tran_id,
        })
    }

    /// Credits the wallet once per session. The session is claimed before the
    /// gateway is asked, so a concurrent IPN and success redirect cannot both credit.
    pub async fn complete_recharge(
        &self,
        val_id: String,
        tran_id: String,
    ) -> UseCaseResult<RechargeCompletedDto> {
        let session = self
            .status_cache
            .take_recharge_session(tran_id.clone())
            .await
            .map_err(|err| {
                error!(%tran_id, cache_error = ?err, "recharge: failed to claim session");
                RechargeError::Internal(err)
            })?
            .ok_or(RechargeError::SessionNotFound)?;

        let balance = match self.credit_session(val_id, &tran_id, &session).await {
            Ok(balance) => balance,
            Err(err) => {
                self.restore_session(&tran_id, session).await;
                return Err(err);
            }
        };

        let entry = ledger_entry(
            session.user_id,
            session.amount,
            TransactionType::Credit,
            RECHARGE_DESCRIPTION.to_string(),
            PaymentMethod::Gateway,
        );
        if let Err(err) = self.transaction_repository.record(entry).await {
            error!(user_id = session.user_id, %tran_id, db_error = ?err, "recharge: failed to record ledger entry");
        }

        info!(user_id = session.user_id, %tran_id, amount = session.amount, balance, "recharge: completed");
        Ok(RechargeCompletedDto {
            user_id: session.user_id,
            amount: session.amount,
            balance,
        })
    }

    async fn credit_session(
        &self,
        val_id: String,
        tran_id: &str,
        session: &RechargeSession,
    ) -> UseCaseResult<f64> {
        let validation = self
            .payment_gateway
            .validate_transaction(val_id)
            .await
            .map_err(|err| {
                error!(%tran_id, error = ?err, "recharge: gateway validation call failed");
                RechargeError::Internal(err)
            })?;

        if !validation.is_valid() {
            warn!(%tran_id, status = %validation.status, "recharge: gateway rejected payment");
            return Err(RechargeError::ValidationRejected(validation.status));
        }
        if validation.tran_id != tran_id || validation.parsed_amount() != Some(session.amount) {
            warn!(
                %tran_id,
                validated_tran_id = %validation.tran_id,
                validated_amount = %validation.amount,
                expected_amount = session.amount,
                "recharge: validated payment does not match session"
            );
            return Err(RechargeError::Mismatch);
        }

        self.user_repository
            .credit_balance(session.user_id, session.amount)
            .await
            .map_err(|err| {
                error!(user_id = session.user_id, %tran_id, db_error = ?err, "recharge: failed to credit balance");
                RechargeError::Internal(err)
            })
    }

    // Puts an uncredited session back so a later confirmation can still settle it.
    async fn restore_session(&self, tran_id: &str, session: RechargeSession) {
        if let Err(err) = self
            .status_cache
            .put_recharge_session(tran_id.to_string(), session)
            .await
        {
            error!(%tran_id, cache_error = ?err, "recharge: failed to restore session");
        }
    }

    pub async fn cancel_recharge(&self, tran_id: String) -> UseCaseResult<()> {
        self.status_cache
            .delete_recharge_session(tran_id.clone())
            .await
            .map_err(|err| {
                error!(%tran_id, cache_error = ?err, "recharge: failed to drop session");
                RechargeError::Internal(err)
            })?;
        info!(%tran_id, "recharge: cancelled");
        Ok(())
    }

    async fn discard_session(&self, tran_id: &str) {
        if let Err(err) = self
            .status_cache
            .delete_recharge_session(tran_id.to_string())
            .await
        {
            warn!(%tran_id, cache_error = ?err, "recharge: failed to drop session");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use anyhow::anyhow;
    use chrono::Utc;
    use crates::domain::{
        entities::users::UserEntity,
        repositories::{
            payment_gateway::MockPaymentGateway, status_cache::MockStatusCache,
            transactions::MockTransactionRepository, users::MockUserRepository,
        },
        value_objects::payment_gateway::GatewayValidation,
    };

    type TestUseCase = RechargeUseCase<
        MockStatusCache,
        MockPaymentGateway,
        MockUserRepository,
        MockTransactionRepository,
    >;

    fn usecase(
        cache: MockStatusCache,
        gateway: MockPaymentGateway,
        users: MockUserRepository,
        transactions: MockTransactionRepository,
    ) -> TestUseCase {
        RechargeUseCase::new(
            Arc::new(cache),
            Arc::new(gateway),
            Arc::new(users),
            Arc::new(transactions),
            "https://transit.example",
        )
    }

    fn rider() -> UserEntity {
        UserEntity {
            id: 5,
            name: "Rina".to_string(),
            email: "rina@example.com".to_string(),
            balance: 10.0,
            rfid: None,
            is_rfid_active: false,
            created_at: Utc::now(),
        }
    }

    fn session_cache(amount: f64) -> MockStatusCache {
        let mut cache = MockStatusCache::new();
        cache.expect_take_recharge_session().returning(move |_| {
            Box::pin(async move { Ok(Some(RechargeSession { user_id: 5, amount })) })
        });
        cache
    }

    fn validation(status: &str, tran_id: &str, amount: &str) -> GatewayValidation {
        GatewayValidation {
            status: status.to_string(),
            tran_id: tran_id.to_string(),
            amount: amount.to_string(),
            risk_level: Some("0".to_string()),
        }
    }

    #[tokio::test]
    async fn rejects_amounts_outside_the_allowed_set() {
        let err = usecase(
            MockStatusCache::new(),
            MockPaymentGateway::new(),
            MockUserRepository::new(),
            MockTransactionRepository::new(),
        )
        .init_recharge(5, 75)
        .await
        .unwrap_err();

        assert!(matches!(err, RechargeError::InvalidAmount));
    }

    #[tokio::test]
    async fn init_stores_session_and_returns_gateway_url() {
        let mut cache = MockStatusCache::new();
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();

        users
            .expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(Some(rider())) }));
        cache
            .expect_put_recharge_session()
            .withf(|tran_id, session| {
                tran_id.starts_with("RECHARGE-5-")
                    && *session == RechargeSession { user_id: 5, amount: 200.0 }
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        gateway
            .expect_init_payment()
            .withf(|request| {
                request.total_amount == 200.0
                    && request.success_url == "https://transit.example/api/v1/wallet/recharge/success"
                    && request.ipn_url == "https://transit.example/api/v1/tickets/payment/ipn"
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok("https://pay.example/recharge".to_string()) }));

        let dto = usecase(cache, gateway, users, MockTransactionRepository::new())
            .init_recharge(5, 200)
            .await
            .unwrap();

        assert_eq!(dto.payment_url, "https://pay.example/recharge");
        assert!(dto.tran_id.starts_with("RECHARGE-5-"));
    }

    #[tokio::test]
    async fn gateway_failure_drops_the_session() {
        let mut cache = MockStatusCache::new();
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();

        users
            .expect_find_by_id()
            .returning(|_| Box::pin(async { Ok(Some(rider())) }));
        cache
            .expect_put_recharge_session()
            .returning(|_, _| Box::pin(async { Ok(()) }));
        cache
            .expect_delete_recharge_session()
            .times(1)
            .returning(|_| Box::pin(async { Ok(()) }));
        gateway
            .expect_init_payment()
            .returning(|_| Box::pin(async { Err(anyhow!("gateway down")) }));

        let err = usecase(cache, gateway, users, MockTransactionRepository::new())
            .init_recharge(5, 100)
            .await
            .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn completes_recharge_with_credit_and_ledger_entry() {
        let tran_id = "RECHARGE-5-abcd1234".to_string();
        let mut cache = session_cache(100.0);
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();
        let mut transactions = MockTransactionRepository::new();

        let validated_tran_id = tran_id.clone();
        gateway.expect_validate_transaction().returning(move |_| {
            let validation = validation("VALID", &validated_tran_id, "100.00");
            Box::pin(async move { Ok(validation) })
        });
        users
            .expect_credit_balance()
            .withf(|user_id, amount| *user_id == 5 && *amount == 100.0)
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(110.0) }));
        transactions
            .expect_record()
            .withf(|entry| {
                entry.type_ == "credit"
                    && entry.amount == 100.0
                    && entry.description == RECHARGE_DESCRIPTION
            })
            .times(1)
            .returning(|_| Box::pin(async { Ok(1) }));
        cache.expect_put_recharge_session().never();

        let dto = usecase(cache, gateway, users, transactions)
            .complete_recharge("val-1".to_string(), tran_id)
            .await
            .unwrap();

        assert_eq!(
            dto,
            RechargeCompletedDto {
                user_id: 5,
                amount: 100.0,
                balance: 110.0
            }
        );
    }

    #[tokio::test]
    async fn missing_session_is_reported() {
        let mut cache = MockStatusCache::new();
        cache
            .expect_take_recharge_session()
            .returning(|_| Box::pin(async { Ok(None) }));

        let err = usecase(
            cache,
            MockPaymentGateway::new(),
            MockUserRepository::new(),
            MockTransactionRepository::new(),
        )
        .complete_recharge("val-1".to_string(), "RECHARGE-5-abcd1234".to_string())
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "recharge session expired or not found");
    }

    fn restoring_cache(amount: f64) -> MockStatusCache {
        let mut cache = session_cache(amount);
        cache
            .expect_put_recharge_session()
            .withf(move |tran_id, session| {
                tran_id == "RECHARGE-5-abcd1234"
                    && *session == RechargeSession { user_id: 5, amount }
            })
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(()) }));
        cache
    }

    #[tokio::test]
    async fn amount_mismatch_does_not_credit() {
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();

        gateway.expect_validate_transaction().returning(|_| {
            Box::pin(async { Ok(validation("VALIDATED", "RECHARGE-5-abcd1234", "50.00")) })
        });
        users.expect_credit_balance().never();

        let err = usecase(
            restoring_cache(100.0),
            gateway,
            users,
            MockTransactionRepository::new(),
        )
        .complete_recharge("val-1".to_string(), "RECHARGE-5-abcd1234".to_string())
        .await
        .unwrap_err();

        assert!(matches!(err, RechargeError::Mismatch));
    }

    #[tokio::test]
    async fn failed_validation_does_not_credit() {
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();

        gateway.expect_validate_transaction().returning(|_| {
            Box::pin(async { Ok(validation("FAILED", "RECHARGE-5-abcd1234", "100.00")) })
        });
        users.expect_credit_balance().never();

        let err = usecase(
            restoring_cache(100.0),
            gateway,
            users,
            MockTransactionRepository::new(),
        )
        .complete_recharge("val-1".to_string(), "RECHARGE-5-abcd1234".to_string())
        .await
        .unwrap_err();

        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn credit_failure_restores_session_for_retry() {
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();

        gateway.expect_validate_transaction().returning(|_| {
            Box::pin(async { Ok(validation("VALID", "RECHARGE-5-abcd1234", "100.00")) })
        });
        users
            .expect_credit_balance()
            .times(1)
            .returning(|_, _| Box::pin(async { Err(anyhow!("connection reset")) }));

        let err = usecase(
            restoring_cache(100.0),
            gateway,
            users,
            MockTransactionRepository::new(),
        )
        .complete_recharge("val-1".to_string(), "RECHARGE-5-abcd1234".to_string())
        .await
        .unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn second_completion_of_the_same_session_does_not_credit() {
        let mut cache = MockStatusCache::new();
        let mut gateway = MockPaymentGateway::new();
        let mut users = MockUserRepository::new();
        let mut transactions = MockTransactionRepository::new();

        let takes = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&takes);
        cache.expect_take_recharge_session().returning(move |_| {
            let first = counter.fetch_add(1, Ordering::SeqCst) == 0;
            Box::pin(async move {
                Ok(first.then_some(RechargeSession {
                    user_id: 5,
                    amount: 100.0,
                }))
            })
        });
        cache.expect_put_recharge_session().never();
        gateway.expect_validate_transaction().times(1).returning(|_| {
            Box::pin(async { Ok(validation("VALID", "RECHARGE-5-abcd1234", "100.00")) })
        });
        users
            .expect_credit_balance()
            .times(1)
            .returning(|_, _| Box::pin(async { Ok(110.0) }));
        transactions
            .expect_record()
            .times(1)
            .returning(|_| Box::pin(async { Ok(1) }));

        let usecase = usecase(cache, gateway, users, transactions);
        let (first, second) = tokio::join!(
            usecase.complete_recharge("val-1".to_string(), "RECHARGE-5-abcd1234".to_string()),
            usecase.complete_recharge("val-1".to_string(), "RECHARGE-5-abcd1234".to_string()),
        );

        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results.iter().any(|r| matches!(r, Err(RechargeError::SessionNotFound))));
        assert_eq!(takes.load(Ordering::SeqCst), 2);
    }
}
