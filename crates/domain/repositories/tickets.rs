use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::tickets::{InsertTicketEntity, TicketEntity},
    value_objects::{
        enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
        settlements::{SettledBatch, WalletSettlement},
    },
};

#[async_trait]
#[automock]
pub trait TicketRepository {
    /// Tickets that are neither checked nor cancelled.
    async fn count_active_on_route(&self, user_id: i64, route_id: i64) -> Result<i64>;
    async fn find_by_id(&self, ticket_id: i64) -> Result<Option<TicketEntity>>;
    async fn find_by_qr_code(&self, qr_code: String) -> Result<Option<TicketEntity>>;
    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Vec<TicketEntity>>;
    async fn find_latest_on_route(&self, user_id: i64, route_id: i64)
    -> Result<Option<TicketEntity>>;
    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketEntity>, i64)>;

    async fn create(&self, ticket: InsertTicketEntity) -> Result<TicketEntity>;
    /// Inserts every row or none.
    async fn create_batch(&self, tickets: Vec<InsertTicketEntity>) -> Result<Vec<TicketEntity>>;

    /// Flips an unsettled batch to paid and posts one purchase ledger entry in the same
    /// transaction. `None` when the batch was already settled.
    async fn settle_paid_batch(
        &self,
        batch_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<Option<SettledBatch>>;
    /// Locks the rider's balance, debits the batch total, flips the batch and posts the
    /// purchase ledger entry in one transaction. Nothing is debited for a settled batch.
    async fn settle_wallet_batch(&self, batch_id: Uuid) -> Result<WalletSettlement>;
    /// Records the checkout transaction on every unsettled row of the batch.
    async fn assign_gateway_transaction(&self, batch_id: Uuid, tran_id: String) -> Result<usize>;
    /// Closes an unsettled batch as failed or cancelled. Returns the number of rows touched.
    async fn close_unpaid_batch(&self, batch_id: Uuid, status: PaymentStatus) -> Result<usize>;

    /// Sets `checked` on a paid, uncancelled, unchecked row. `false` when nothing changed.
    async fn mark_checked(&self, ticket_id: i64) -> Result<bool>;
    /// Cancels a paid, unchecked, uncancelled row. `false` when nothing changed.
    async fn cancel(&self, ticket_id: i64, cancelled_at: DateTime<Utc>) -> Result<bool>;
}
