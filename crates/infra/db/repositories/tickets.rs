use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{pg::PgConnection, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::{
        entities::tickets::{InsertTicketEntity, TicketEntity},
        repositories::tickets::TicketRepository,
        value_objects::{
            enums::{
                payment_methods::PaymentMethod, payment_statuses::PaymentStatus,
                transaction_types::TransactionType,
            },
            ledger::{ledger_entry, purchase_description},
            settlements::{SettledBatch, WalletSettlement},
        },
    },
    infra::db::postgres::{
        postgres_connection::PgPoolSquad,
        schema::{tickets, transactions, users},
    },
};

pub struct TicketPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TicketPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TicketRepository for TicketPostgres {
    async fn count_active_on_route(&self, user_id: i64, route_id: i64) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let count = tickets::table
            .filter(tickets::user_id.eq(user_id))
            .filter(tickets::route_id.eq(route_id))
            .filter(tickets::cancelled_at.is_null())
            .filter(tickets::checked.eq(false))
            .count()
            .get_result::<i64>(&mut conn)?;

        Ok(count)
    }

    async fn find_by_id(&self, ticket_id: i64) -> Result<Option<TicketEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let ticket = tickets::table
            .find(ticket_id)
            .select(TicketEntity::as_select())
            .first::<TicketEntity>(&mut conn)
            .optional()?;

        Ok(ticket)
    }

    async fn find_by_qr_code(&self, qr_code: String) -> Result<Option<TicketEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let ticket = tickets::table
            .filter(tickets::qr_code.eq(qr_code))
            .select(TicketEntity::as_select())
            .first::<TicketEntity>(&mut conn)
            .optional()?;

        Ok(ticket)
    }

    async fn find_by_batch(&self, batch_id: Uuid) -> Result<Vec<TicketEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = tickets::table
            .filter(tickets::batch_id.eq(batch_id))
            .order(tickets::id.asc())
            .select(TicketEntity::as_select())
            .load::<TicketEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn find_latest_on_route(
        &self,
        user_id: i64,
        route_id: i64,
    ) -> Result<Option<TicketEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let ticket = tickets::table
            .filter(tickets::user_id.eq(user_id))
            .filter(tickets::route_id.eq(route_id))
            .order(tickets::created_at.desc())
            .select(TicketEntity::as_select())
            .first::<TicketEntity>(&mut conn)
            .optional()?;

        Ok(ticket)
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<TicketEntity>, i64)> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let total = tickets::table
            .filter(tickets::user_id.eq(user_id))
            .count()
            .get_result::<i64>(&mut conn)?;

        let rows = tickets::table
            .filter(tickets::user_id.eq(user_id))
            .order(tickets::created_at.desc())
            .limit(limit)
            .offset(offset)
            .select(TicketEntity::as_select())
            .load::<TicketEntity>(&mut conn)?;

        Ok((rows, total))
    }

    async fn create(&self, ticket: InsertTicketEntity) -> Result<TicketEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let created = diesel::insert_into(tickets::table)
            .values(&ticket)
            .returning(TicketEntity::as_select())
            .get_result::<TicketEntity>(&mut conn)?;

        Ok(created)
    }

    async fn create_batch(&self, rows: Vec<InsertTicketEntity>) -> Result<Vec<TicketEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut created = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            diesel::insert_into(tickets::table)
                .values(&rows)
                .returning(TicketEntity::as_select())
                .get_results::<TicketEntity>(conn)
        })?;
        created.sort_by_key(|t| t.id);

        Ok(created)
    }

    async fn settle_paid_batch(
        &self,
        batch_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<Option<SettledBatch>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let settled = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            flip_batch(conn, batch_id, payment_method)
        })?;

        Ok(settled)
    }

    async fn settle_wallet_batch(&self, batch_id: Uuid) -> Result<WalletSettlement> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            // Ticket rows first, then the rider; a redelivered job blocks here until the
            // first attempt commits and then sees the batch as settled.
            let pending = tickets::table
                .filter(tickets::batch_id.eq(batch_id))
                .filter(tickets::payment_used.eq(false))
                .order(tickets::id.asc())
                .select(TicketEntity::as_select())
                .for_update()
                .load::<TicketEntity>(conn)?;

            let Some(first) = pending.first() else {
                return Ok(WalletSettlement::AlreadySettled);
            };
            let user_id = first.user_id;
            let amount = first.fare * pending.len() as f64;

            let balance = users::table
                .find(user_id)
                .select(users::balance)
                .for_update()
                .first::<f64>(conn)?;
            if balance < amount {
                return Ok(WalletSettlement::Insufficient { balance });
            }

            diesel::update(users::table.find(user_id))
                .set(users::balance.eq(users::balance - amount))
                .execute(conn)?;

            match flip_batch(conn, batch_id, PaymentMethod::Wallet)? {
                Some(settled) => Ok(WalletSettlement::Settled(settled)),
                None => Err(diesel::result::Error::RollbackTransaction),
            }
        })?;

        Ok(outcome)
    }

    async fn assign_gateway_transaction(&self, batch_id: Uuid, tran_id: String) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = diesel::update(
            tickets::table
                .filter(tickets::batch_id.eq(batch_id))
                .filter(tickets::payment_used.eq(false)),
        )
        .set(tickets::gateway_tran_id.eq(Some(tran_id)))
        .execute(&mut conn)?;

        Ok(affected)
    }

    async fn close_unpaid_batch(&self, batch_id: Uuid, status: PaymentStatus) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = diesel::update(
            tickets::table
                .filter(tickets::batch_id.eq(batch_id))
                .filter(tickets::payment_used.eq(false)),
        )
        .set((
            tickets::payment_used.eq(true),
            tickets::payment_status.eq(status.as_str()),
            tickets::paid_status.eq(false),
            tickets::cancelled_at.eq(Some(Utc::now())),
        ))
        .execute(&mut conn)?;

        Ok(affected)
    }

    async fn mark_checked(&self, ticket_id: i64) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = diesel::update(
            tickets::table
                .filter(tickets::id.eq(ticket_id))
                .filter(tickets::checked.eq(false))
                .filter(tickets::paid_status.eq(true))
                .filter(tickets::cancelled_at.is_null()),
        )
        .set(tickets::checked.eq(true))
        .execute(&mut conn)?;

        Ok(affected == 1)
    }

    async fn cancel(&self, ticket_id: i64, cancelled_at: DateTime<Utc>) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let affected = diesel::update(
            tickets::table
                .filter(tickets::id.eq(ticket_id))
                .filter(tickets::checked.eq(false))
                .filter(tickets::paid_status.eq(true))
                .filter(tickets::cancelled_at.is_null()),
        )
        .set((
            tickets::cancelled_at.eq(Some(cancelled_at)),
            tickets::payment_status.eq(PaymentStatus::Cancelled.as_str()),
            tickets::paid_status.eq(false),
        ))
        .execute(&mut conn)?;

        Ok(affected == 1)
    }
}

/// Flips an unsettled batch to paid and posts its single purchase ledger entry.
/// Must run inside a transaction.
fn flip_batch(
    conn: &mut PgConnection,
    batch_id: Uuid,
    payment_method: PaymentMethod,
) -> QueryResult<Option<SettledBatch>> {
    // `payment_used = false` is the single-use guard; a second settlement matches nothing.
    let mut rows = diesel::update(
        tickets::table
            .filter(tickets::batch_id.eq(batch_id))
            .filter(tickets::payment_used.eq(false)),
    )
    .set((
        tickets::payment_used.eq(true),
        tickets::payment_status.eq(PaymentStatus::Paid.as_str()),
        tickets::paid_status.eq(true),
    ))
    .returning(TicketEntity::as_select())
    .get_results::<TicketEntity>(conn)?;

    if rows.is_empty() {
        return Ok(None);
    }
    rows.sort_by_key(|t| t.id);

    let first = &rows[0];
    let count = rows.len();
    let amount = first.fare * count as f64;
    let entry = ledger_entry(
        first.user_id,
        amount,
        TransactionType::Purchase,
        purchase_description(&first.bus_name, count),
        payment_method,
    );

    let transaction_id = diesel::insert_into(transactions::table)
        .values(&entry)
        .returning(transactions::id)
        .get_result::<i64>(conn)?;

    Ok(Some(SettledBatch {
        tickets: rows,
        amount,
        transaction_id,
    }))
}
