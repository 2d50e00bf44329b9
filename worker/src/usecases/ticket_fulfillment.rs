use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use crates::{
    application::settlement::BatchSettlement,
    domain::{
        entities::{
            jobs::JobEntity,
            tickets::{InsertTicketEntity, TicketEntity},
        },
        repositories::{
            payment_gateway::PaymentGateway, status_cache::StatusCache,
            tickets::TicketRepository, users::UserRepository,
        },
        value_objects::{
            enums::{
                job_types::JobType, payment_methods::PaymentMethod,
                payment_statuses::PaymentStatus,
            },
            payment_gateway::{CallbackUrls, PaymentInitRequest},
            qr_codes::ticket_qr_code,
            settlements::WalletSettlement,
            ticket_jobs::TicketPurchaseMessage,
            tickets::download_url,
            tracking_sessions::TrackingSession,
            transaction_ids::ticket_transaction_id,
        },
    },
};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::services::job_loop::JobHandler;

/// Turns a queued purchase into ticket rows and either a settled wallet payment or a
/// hosted-checkout link. Safe to run again for the same batch.
pub struct TicketFulfillmentUseCase<T, U, C, G>
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
{
    ticket_repository: Arc<T>,
    user_repository: Arc<U>,
    status_cache: Arc<C>,
    payment_gateway: Arc<G>,
    settlement: BatchSettlement<T, C>,
    public_base_url: String,
    callback_urls: CallbackUrls,
}

impl<T, U, C, G> TicketFulfillmentUseCase<T, U, C, G>
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
{
    pub fn new(
        ticket_repository: Arc<T>,
        user_repository: Arc<U>,
        status_cache: Arc<C>,
        payment_gateway: Arc<G>,
        public_base_url: &str,
    ) -> Self {
        Self {
            settlement: BatchSettlement::new(
                Arc::clone(&ticket_repository),
                Arc::clone(&status_cache),
            ),
            ticket_repository,
            user_repository,
            status_cache,
            payment_gateway,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            callback_urls: CallbackUrls::tickets(public_base_url),
        }
    }

    pub async fn fulfill(&self, tracking_id: &str, message: TicketPurchaseMessage) -> Result<()> {
        let batch_id = message.batch_id;
        let tickets = self.ensure_tickets(&message).await?;
        let ticket_ids: Vec<i64> = tickets.iter().map(|t| t.id).collect();

        // Redelivery after a terminal outcome only re-reports it.
        if tickets.first().is_some_and(|t| t.payment_used) {
            info!(tracking_id, %batch_id, "fulfillment: batch already closed; re-reporting");
            return self.report(tracking_id, self.closed_session(&tickets)).await;
        }

        match message.payment_method {
            PaymentMethod::Wallet => self.pay_from_wallet(tracking_id, &message, ticket_ids).await,
            PaymentMethod::Gateway => {
                self.open_checkout(tracking_id, &message, &tickets, ticket_ids)
                    .await
            }
            other => {
                warn!(tracking_id, %batch_id, payment_method = %other, "fulfillment: unsupported payment method");
                self.fail(tracking_id, &message, "unsupported payment method")
                    .await
            }
        }
    }

    /// Terminal failure after retries: the poller must not stay on `processing` forever.
    pub async fn abandon(&self, tracking_id: &str, message: &TicketPurchaseMessage, reason: &str) {
        error!(tracking_id, batch_id = %message.batch_id, reason, "fulfillment: purchase abandoned");
        if let Err(err) = self.fail(tracking_id, message, "ticket purchase failed").await {
            error!(tracking_id, batch_id = %message.batch_id, error = ?err, "fulfillment: failed to record abandoned purchase");
        }
    }

    async fn ensure_tickets(&self, message: &TicketPurchaseMessage) -> Result<Vec<TicketEntity>> {
        let batch_id = message.batch_id;
        let existing = self
            .ticket_repository
            .find_by_batch(batch_id)
            .await
            .context("failed to load batch")?;
        if !existing.is_empty() {
            info!(%batch_id, tickets = existing.len(), "fulfillment: reusing batch rows");
            return Ok(existing);
        }

        let created_at = Utc::now();
        let rows = (0..message.quantity)
            .map(|_| InsertTicketEntity {
                user_id: message.user_id,
                route_id: message.route_id,
                bus_name: message.bus_name.clone(),
                start_destination: message.start_destination.clone(),
                end_destination: message.end_destination.clone(),
                fare: message.fare,
                payment_method: message.payment_method.to_string(),
                payment_status: PaymentStatus::Unpaid.to_string(),
                paid_status: false,
                payment_used: false,
                batch_id,
                qr_code: ticket_qr_code(),
                checked: false,
                created_at,
            })
            .collect();

        let tickets = self
            .ticket_repository
            .create_batch(rows)
            .await
            .context("failed to create batch")?;
        info!(%batch_id, tickets = tickets.len(), "fulfillment: batch created");
        Ok(tickets)
    }

    async fn pay_from_wallet(
        &self,
        tracking_id: &str,
        message: &TicketPurchaseMessage,
        ticket_ids: Vec<i64>,
    ) -> Result<()> {
        let batch_id = message.batch_id;
        let outcome = self
            .settlement
            .settle_from_wallet(batch_id)
            .await
            .context("failed to settle wallet batch")?;

        match outcome {
            WalletSettlement::Settled(_) => {
                self.report(tracking_id, self.paid_session(ticket_ids))
                    .await
            }
            WalletSettlement::AlreadySettled => {
                let tickets = self
                    .ticket_repository
                    .find_by_batch(batch_id)
                    .await
                    .context("failed to reload batch")?;
                info!(tracking_id, %batch_id, "fulfillment: batch closed concurrently; re-reporting");
                self.report(tracking_id, self.closed_session(&tickets)).await
            }
            WalletSettlement::Insufficient { balance } => {
                info!(tracking_id, %batch_id, balance, total_fare = message.total_fare, "fulfillment: insufficient balance");
                self.fail(tracking_id, message, "insufficient balance").await
            }
        }
    }

    async fn open_checkout(
        &self,
        tracking_id: &str,
        message: &TicketPurchaseMessage,
        tickets: &[TicketEntity],
        ticket_ids: Vec<i64>,
    ) -> Result<()> {
        let batch_id = message.batch_id;
        let Some(first) = tickets.first() else {
            return self.fail(tracking_id, message, "no tickets were created").await;
        };

        let user = self
            .user_repository
            .find_by_id(message.user_id)
            .await
            .context("failed to load rider")?;
        let Some(user) = user else {
            warn!(tracking_id, user_id = message.user_id, "fulfillment: rider not found");
            return self.fail(tracking_id, message, "user not found").await;
        };

        // A redelivered job keeps the transaction it already issued.
        let tran_id = match &first.gateway_tran_id {
            Some(tran_id) => tran_id.clone(),
            None => {
                let tran_id = ticket_transaction_id(first.id);
                self.ticket_repository
                    .assign_gateway_transaction(batch_id, tran_id.clone())
                    .await
                    .context("failed to record checkout transaction")?;
                tran_id
            }
        };

        let request = PaymentInitRequest {
            tran_id: tran_id.clone(),
            total_amount: message.total_fare,
            product_name: format!("Bus Ticket - {} (x{})", message.bus_name, tickets.len()),
            customer_name: user.name,
            customer_email: user.email,
            success_url: self.callback_urls.success_url.clone(),
            fail_url: self.callback_urls.fail_url.clone(),
            cancel_url: self.callback_urls.cancel_url.clone(),
            ipn_url: self.callback_urls.ipn_url.clone(),
        };

        match self.payment_gateway.init_payment(request).await {
            Ok(url) => {
                info!(tracking_id, %batch_id, %tran_id, "fulfillment: checkout opened");
                self.report(tracking_id, TrackingSession::Ready { url, ticket_ids })
                    .await
            }
            Err(err) => {
                warn!(tracking_id, %batch_id, error = ?err, "fulfillment: payment initialization failed");
                self.fail(tracking_id, message, "payment initialization failed")
                    .await
            }
        }
    }

    /// Closes the batch and reports `failed`.
    async fn fail(
        &self,
        tracking_id: &str,
        message: &TicketPurchaseMessage,
        reason: &str,
    ) -> Result<()> {
        self.settlement
            .void(message.batch_id, PaymentStatus::Failed)
            .await
            .context("failed to void batch")?;
        self.report(
            tracking_id,
            TrackingSession::Failed {
                error: reason.to_string(),
            },
        )
        .await
    }

    fn closed_session(&self, tickets: &[TicketEntity]) -> TrackingSession {
        if tickets.first().is_some_and(|t| t.paid_status) {
            self.paid_session(tickets.iter().map(|t| t.id).collect())
        } else {
            TrackingSession::Failed {
                error: "payment failed or was cancelled".to_string(),
            }
        }
    }

    fn paid_session(&self, ticket_ids: Vec<i64>) -> TrackingSession {
        let url = download_url(&self.public_base_url, ticket_ids.first().copied().unwrap_or_default());
        TrackingSession::Paid { url, ticket_ids }
    }

    async fn report(&self, tracking_id: &str, session: TrackingSession) -> Result<()> {
        self.status_cache
            .put_tracking_session(tracking_id.to_string(), session)
            .await
            .context("failed to write tracking session")
    }
}

fn purchase_message(job: &JobEntity) -> Result<(String, TicketPurchaseMessage)> {
    let message: TicketPurchaseMessage =
        serde_json::from_value(job.payload.clone()).context("malformed purchase payload")?;
    let tracking_id = job.correlation_id.clone().unwrap_or_default();
    Ok((tracking_id, message))
}

#[async_trait]
impl<T, U, C, G> JobHandler for TicketFulfillmentUseCase<T, U, C, G>
where
    T: TicketRepository + Send + Sync,
    U: UserRepository + Send + Sync,
    C: StatusCache + Send + Sync,
    G: PaymentGateway + Send + Sync,
{
    fn job_type(&self) -> JobType {
        JobType::TicketPurchase
    }

    async fn handle(&self, job: &JobEntity) -> Result<()> {
        let (tracking_id, message) = purchase_message(job)?;
        if tracking_id.is_empty() {
            warn!(job_id = %job.id, "fulfillment: purchase job has no tracking id");
        }
        self.fulfill(&tracking_id, message).await
    }

    async fn on_dead(&self, job: &JobEntity, reason: &str) {
        match purchase_message(job) {
            Ok((tracking_id, message)) => self.abandon(&tracking_id, &message, reason).await,
            Err(err) => {
                error!(job_id = %job.id, error = ?err, "fulfillment: dead job has unreadable payload")
            }
        }
    }
}
