use std::sync::Arc;

use axum::http::StatusCode;
use crates::{
    application::settlement::{BatchSettlement, SettlementOutcome},
    domain::{
        entities::tickets::TicketEntity,
        repositories::{
            payment_gateway::PaymentGateway, status_cache::StatusCache,
            tickets::TicketRepository, transactions::TransactionRepository,
            users::UserRepository,
        },
        value_objects::{
            enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
            payment_gateway::{PaymentConfirmation, PaymentNotification, is_valid_status},
            recharge::RechargeCompletedDto,
            transaction_ids::{MalformedTransactionId, TransactionRef},
        },
    },
};
use serde::Serialize;
use thiserror::Error;
use tracing::{error, info, warn};

use super::recharge::{RechargeError, RechargeUseCase};
use crate::axum_http::error_responses::ApiError;

const HIGH_RISK_LEVEL: &str = "1";

#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("malformed payment notification: {0}")]
    MalformedPayload(String),
    #[error(transparent)]
    MalformedTransactionId(#[from] MalformedTransactionId),
    #[error("payment validation failed: {0}")]
    ValidationRejected(String),
    #[error("validated transaction does not match the notification")]
    TransactionMismatch,
    #[error("amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: f64, received: f64 },
    #[error("transaction was not issued for this ticket")]
    UnissuedTransaction,
    #[error("ticket not found")]
    TicketNotFound,
    #[error("payment link already used")]
    PaymentLinkUsed,
    #[error(transparent)]
    Recharge(#[from] RechargeError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ReconciliationError {
    /// Payload could not be understood; the gateway should resend it.
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            ReconciliationError::MalformedPayload(_)
                | ReconciliationError::MalformedTransactionId(_)
        )
    }

    /// Store or upstream outage; settlement is idempotent so a resend is safe.
    pub fn is_retryable(&self) -> bool {
        match self {
            ReconciliationError::Internal(_) => true,
            ReconciliationError::Recharge(err) => err.is_retryable(),
            _ => false,
        }
    }
}

impl ApiError for ReconciliationError {
    fn status_code(&self) -> StatusCode {
        match self {
            ReconciliationError::MalformedPayload(_)
            | ReconciliationError::MalformedTransactionId(_)
            | ReconciliationError::ValidationRejected(_)
            | ReconciliationError::TransactionMismatch
            | ReconciliationError::UnissuedTransaction
            | ReconciliationError::AmountMismatch { .. } => StatusCode::BAD_REQUEST,
            ReconciliationError::TicketNotFound => StatusCode::NOT_FOUND,
            ReconciliationError::PaymentLinkUsed => StatusCode::CONFLICT,
            ReconciliationError::Recharge(err) => err.status_code(),
            ReconciliationError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, ReconciliationError>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconciliationOutcome {
    Settled { ticket_ids: Vec<i64>, amount: f64 },
    AlreadySettled { ticket_id: i64 },
    RechargeCompleted(RechargeCompletedDto),
}

/// What an IPN call should answer. Everything here is a 2xx.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IpnAck {
    Processed { outcome: ReconciliationOutcome },
    Held { reason: String },
    Acknowledged { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentOutcomeDto {
    pub tran_id: String,
    pub status: PaymentStatus,
}

/// Turns raw gateway form fields into a confirmation call.
pub fn parse_notification(
    notification: &PaymentNotification,
) -> UseCaseResult<PaymentConfirmation> {
    let field = |value: &Option<String>, name: &str| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ReconciliationError::MalformedPayload(format!("{name} is required")))
    };

    let tran_id = field(&notification.tran_id, "tran_id")?;
    let val_id = field(&notification.val_id, "val_id")?;
    let amount = field(&notification.amount, "amount")?
        .parse::<f64>()
        .map_err(|_| ReconciliationError::MalformedPayload("amount is not a number".to_string()))?;

    Ok(PaymentConfirmation {
        val_id,
        tran_id,
        amount,
    })
}

pub struct PaymentReconciliationUseCase<T, C, G, U, X>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    ticket_repository: Arc<T>,
    payment_gateway: Arc<G>,
    settlement: BatchSettlement<T, C>,
    recharge: Arc<RechargeUseCase<C, G, U, X>>,
}

impl<T, C, G, U, X> PaymentReconciliationUseCase<T, C, G, U, X>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
    U: UserRepository + Send + Sync,
    X: TransactionRepository + Send + Sync,
{
    pub fn new(
        ticket_repository: Arc<T>,
        status_cache: Arc<C>,
        payment_gateway: Arc<G>,
        recharge: Arc<RechargeUseCase<C, G, U, X>>,
    ) -> Self {
        Self {
            settlement: BatchSettlement::new(Arc::clone(&ticket_repository), status_cache),
            ticket_repository,
            payment_gateway,
            recharge,
        }
    }

    /// IPN entry point. Only malformed payloads and transient failures come back as `Err`;
    /// business rule failures are acknowledged so the gateway stops retrying.
    pub async fn handle_notification(
        &self,
        notification: PaymentNotification,
    ) -> UseCaseResult<IpnAck> {
        let confirmation = parse_notification(&notification)?;
        let tran_id = confirmation.tran_id.clone();

        let status = notification.status.as_deref().unwrap_or_default().trim();
        if !is_valid_status(status) {
            info!(%tran_id, status, "reconciliation: non-valid notification acknowledged");
            return Ok(IpnAck::Acknowledged {
                reason: format!("status {status}"),
            });
        }

        if notification.risk_level.as_deref().map(str::trim) == Some(HIGH_RISK_LEVEL) {
            warn!(%tran_id, "reconciliation: high-risk payment held for review");
            return Ok(IpnAck::Held {
                reason: "payment flagged as high risk".to_string(),
            });
        }

        match self.confirm(confirmation).await {
            Ok(outcome) => Ok(IpnAck::Processed { outcome }),
            Err(err) if err.is_malformed() || err.is_retryable() => Err(err),
            Err(err) => {
                warn!(%tran_id, error = %err, "reconciliation: business rule failed; acknowledged");
                Ok(IpnAck::Acknowledged {
                    reason: err.to_string(),
                })
            }
        }
    }

    /// Explicit confirmation (success redirect). Routes recharges by `tran_id` prefix.
    pub async fn confirm(
        &self,
        confirmation: PaymentConfirmation,
    ) -> UseCaseResult<ReconciliationOutcome> {
        match TransactionRef::parse(&confirmation.tran_id)? {
            TransactionRef::Recharge { .. } => {
                let completed = self
                    .recharge
                    .complete_recharge(confirmation.val_id, confirmation.tran_id)
                    .await?;
                Ok(ReconciliationOutcome::RechargeCompleted(completed))
            }
            TransactionRef::Ticket { .. } => self.reconcile(confirmation).await,
        }
    }

    /// Settles the batch behind a `TICKET-` transaction exactly once.
    pub async fn reconcile(
        &self,
        confirmation: PaymentConfirmation,
    ) -> UseCaseResult<ReconciliationOutcome> {
        let PaymentConfirmation {
            val_id,
            tran_id,
            amount,
        } = confirmation;

        let validation = self
            .payment_gateway
            .validate_transaction(val_id)
            .await
            .map_err(|err| {
                error!(%tran_id, error = ?err, "reconciliation: gateway validation call failed");
                ReconciliationError::Internal(err)
            })?;
        if !validation.is_valid() {
            return Err(ReconciliationError::ValidationRejected(validation.status));
        }
        if !validation.tran_id.is_empty() && validation.tran_id != tran_id {
            return Err(ReconciliationError::TransactionMismatch);
        }

        let ticket_id = match TransactionRef::parse(&tran_id)? {
            TransactionRef::Ticket { ticket_id } => ticket_id,
            TransactionRef::Recharge { .. } => {
                return Err(MalformedTransactionId(tran_id).into());
            }
        };

        let validated_amount = validation.parsed_amount().ok_or_else(|| {
            ReconciliationError::ValidationRejected("validated amount is not a number".to_string())
        })?;
        if validated_amount != amount {
            return Err(ReconciliationError::AmountMismatch {
                expected: validated_amount,
                received: amount,
            });
        }

        let ticket = self.load_issued_ticket(ticket_id, &tran_id).await?;

        if ticket.payment_used {
            return if ticket.paid_status {
                info!(ticket_id, %tran_id, "reconciliation: batch already settled");
                Ok(ReconciliationOutcome::AlreadySettled { ticket_id })
            } else {
                Err(ReconciliationError::PaymentLinkUsed)
            };
        }

        let batch = self
            .ticket_repository
            .find_by_batch(ticket.batch_id)
            .await
            .map_err(|err| {
                error!(ticket_id, batch_id = %ticket.batch_id, db_error = ?err, "reconciliation: failed to load batch");
                ReconciliationError::Internal(err)
            })?;
        let expected = ticket.fare * batch.len() as f64;
        if amount != expected {
            return Err(ReconciliationError::AmountMismatch {
                expected,
                received: amount,
            });
        }

        let outcome = self
            .settlement
            .settle(ticket.batch_id, PaymentMethod::Gateway)
            .await
            .map_err(|err| {
                error!(ticket_id, batch_id = %ticket.batch_id, db_error = ?err, "reconciliation: settlement failed");
                ReconciliationError::Internal(err)
            })?;

        match outcome {
            SettlementOutcome::Settled(settled) => {
                info!(ticket_id, %tran_id, amount = settled.amount, "reconciliation: batch settled");
                Ok(ReconciliationOutcome::Settled {
                    ticket_ids: settled.ticket_ids(),
                    amount: settled.amount,
                })
            }
            // Lost a race with another notification or a fail redirect.
            SettlementOutcome::AlreadySettled => {
                let ticket = self.load_ticket(ticket_id).await?;
                if ticket.paid_status {
                    Ok(ReconciliationOutcome::AlreadySettled { ticket_id })
                } else {
                    Err(ReconciliationError::PaymentLinkUsed)
                }
            }
        }
    }

    /// Fail and cancel redirects. A batch that was already settled is left alone.
    pub async fn record_payment_outcome(
        &self,
        tran_id: String,
        status: PaymentStatus,
    ) -> UseCaseResult<PaymentOutcomeDto> {
        match TransactionRef::parse(&tran_id)? {
            TransactionRef::Recharge { .. } => {
                self.recharge.cancel_recharge(tran_id.clone()).await?;
                Ok(PaymentOutcomeDto { tran_id, status })
            }
            TransactionRef::Ticket { ticket_id } => {
                // The redirect is unauthenticated; only the exact issued transaction may void.
                let ticket = self.load_issued_ticket(ticket_id, &tran_id).await?;
                if ticket.payment_used {
                    info!(ticket_id, %status, "reconciliation: outcome ignored for settled batch");
                    return Ok(PaymentOutcomeDto {
                        tran_id,
                        status: PaymentStatus::parse(&ticket.payment_status),
                    });
                }

                self.settlement
                    .void(ticket.batch_id, status)
                    .await
                    .map_err(|err| {
                        error!(ticket_id, batch_id = %ticket.batch_id, db_error = ?err, "reconciliation: failed to void batch");
                        ReconciliationError::Internal(err)
                    })?;
                Ok(PaymentOutcomeDto { tran_id, status })
            }
        }
    }

    async fn load_issued_ticket(
        &self,
        ticket_id: i64,
        tran_id: &str,
    ) -> UseCaseResult<TicketEntity> {
        let ticket = self.load_ticket(ticket_id).await?;
        if ticket.gateway_tran_id.as_deref() != Some(tran_id) {
            warn!(ticket_id, %tran_id, "reconciliation: transaction id was never issued for this batch");
            return Err(ReconciliationError::UnissuedTransaction);
        }
        Ok(ticket)
    }

    async fn load_ticket(
        &self,
        ticket_id: i64,
    ) -> UseCaseResult<TicketEntity> {
        self.ticket_repository
            .find_by_id(ticket_id)
            .await
            .map_err(|err| {
                error!(ticket_id, db_error = ?err, "reconciliation: failed to load ticket");
                ReconciliationError::Internal(err)
            })?
            .ok_or(ReconciliationError::TicketNotFound)
    }
}
