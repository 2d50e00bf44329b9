use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::{
    repositories::{status_cache::StatusCache, tickets::TicketRepository},
    value_objects::{
        check_in::CheckInSnapshot,
        enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
        settlements::{SettledBatch, WalletSettlement},
    },
};

#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Settled(SettledBatch),
    /// Another caller already consumed the batch; nothing was written.
    AlreadySettled,
}

/// Flips a purchase batch to paid exactly once and primes the check-in cache.
pub struct BatchSettlement<T, C>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
{
    ticket_repository: Arc<T>,
    status_cache: Arc<C>,
}

impl<T, C> BatchSettlement<T, C>
where
    T: TicketRepository + Send + Sync,
    C: StatusCache + Send + Sync,
{
    pub fn new(ticket_repository: Arc<T>, status_cache: Arc<C>) -> Self {
        Self {
            ticket_repository,
            status_cache,
        }
    }

    pub async fn settle(
        &self,
        batch_id: Uuid,
        payment_method: PaymentMethod,
    ) -> Result<SettlementOutcome> {
        let Some(settled) = self
            .ticket_repository
            .settle_paid_batch(batch_id, payment_method)
            .await?
        else {
            info!(%batch_id, "settlement: batch already settled");
            return Ok(SettlementOutcome::AlreadySettled);
        };

        self.prime_snapshots(batch_id, &settled).await;
        Ok(SettlementOutcome::Settled(settled))
    }

    /// Pays the batch from the rider's wallet. The debit and the flip commit together,
    /// so a redelivered job never charges twice.
    pub async fn settle_from_wallet(&self, batch_id: Uuid) -> Result<WalletSettlement> {
        let outcome = self.ticket_repository.settle_wallet_batch(batch_id).await?;
        match &outcome {
            WalletSettlement::Settled(settled) => self.prime_snapshots(batch_id, settled).await,
            WalletSettlement::AlreadySettled => {
                info!(%batch_id, "settlement: wallet batch already settled")
            }
            WalletSettlement::Insufficient { balance } => {
                info!(%batch_id, balance, "settlement: insufficient wallet balance")
            }
        }
        Ok(outcome)
    }

    async fn prime_snapshots(&self, batch_id: Uuid, settled: &SettledBatch) {
        // A missing snapshot only costs the fast path; check-in falls back to the row.
        for ticket in &settled.tickets {
            if let Err(err) = self
                .status_cache
                .put_check_in_snapshot(ticket.qr_code.clone(), CheckInSnapshot::from(ticket))
                .await
            {
                warn!(
                    %batch_id,
                    ticket_id = ticket.id,
                    error = ?err,
                    "settlement: failed to write check-in snapshot"
                );
            }
        }

        info!(
            %batch_id,
            tickets = settled.tickets.len(),
            amount = settled.amount,
            transaction_id = settled.transaction_id,
            "settlement: batch settled"
        );
    }

    /// Closes a batch that will never be paid. Already settled rows are left alone.
    pub async fn void(&self, batch_id: Uuid, status: PaymentStatus) -> Result<usize> {
        let closed = self
            .ticket_repository
            .close_unpaid_batch(batch_id, status)
            .await?;
        info!(%batch_id, %status, closed, "settlement: batch voided");
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        entities::tickets::TicketEntity,
        repositories::{status_cache::MockStatusCache, tickets::MockTicketRepository},
    };
    use anyhow::anyhow;
    use chrono::Utc;

    fn paid_ticket(id: i64, batch_id: Uuid) -> TicketEntity {
        TicketEntity {
            id,
            user_id: 1,
            route_id: 2,
            bus_name: "Green Line".to_string(),
            start_destination: "A".to_string(),
            end_destination: "C".to_string(),
            fare: 20.0,
            payment_method: "gateway".to_string(),
            payment_status: "paid".to_string(),
            paid_status: true,
            payment_used: true,
            batch_id,
            qr_code: format!("QR-{id}"),
            checked: false,
            cancelled_at: None,
            created_at: Utc::now(),
            gateway_tran_id: None,
        }
    }

    #[tokio::test]
    async fn settles_batch_and_writes_snapshot_per_ticket() {
        let batch_id = Uuid::new_v4();
        let mut tickets = MockTicketRepository::new();
        let mut cache = MockStatusCache::new();

        tickets
            .expect_settle_paid_batch()
            .withf(move |id, method| *id == batch_id && *method == PaymentMethod::Gateway)
            .times(1)
            .returning(move |_, _| {
                let settled = SettledBatch {
                    tickets: vec![paid_ticket(11, batch_id), paid_ticket(12, batch_id)],
                    amount: 40.0,
                    transaction_id: 7,
                };
                Box::pin(async move { Ok(Some(settled)) })
            });
        cache
            .expect_put_check_in_snapshot()
            .withf(|qr, snapshot| qr == &format!("QR-{}", snapshot.ticket_id) && !snapshot.checked)
            .times(2)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let settlement = BatchSettlement::new(Arc::new(tickets), Arc::new(cache));
        let outcome = settlement
            .settle(batch_id, PaymentMethod::Gateway)
            .await
            .unwrap();

        match outcome {
            SettlementOutcome::Settled(batch) => assert_eq!(batch.ticket_ids(), vec![11, 12]),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn second_settlement_is_a_no_op() {
        let mut tickets = MockTicketRepository::new();
        let mut cache = MockStatusCache::new();

        tickets
            .expect_settle_paid_batch()
            .returning(|_, _| Box::pin(async { Ok(None) }));
        cache.expect_put_check_in_snapshot().never();

        let settlement = BatchSettlement::new(Arc::new(tickets), Arc::new(cache));
        let outcome = settlement
            .settle(Uuid::new_v4(), PaymentMethod::Wallet)
            .await
            .unwrap();

        assert_eq!(outcome, SettlementOutcome::AlreadySettled);
    }

    #[tokio::test]
    async fn snapshot_failure_does_not_undo_settlement() {
        let batch_id = Uuid::new_v4();
        let mut tickets = MockTicketRepository::new();
        let mut cache = MockStatusCache::new();

        tickets.expect_settle_paid_batch().returning(move |_, _| {
            let settled = SettledBatch {
                tickets: vec![paid_ticket(11, batch_id)],
                amount: 20.0,
                transaction_id: 3,
            };
            Box::pin(async move { Ok(Some(settled)) })
        });
        cache
            .expect_put_check_in_snapshot()
            .returning(|_, _| Box::pin(async { Err(anyhow!("redis down")) }));

        let settlement = BatchSettlement::new(Arc::new(tickets), Arc::new(cache));
        let outcome = settlement.settle(batch_id, PaymentMethod::Gateway).await;

        assert!(matches!(outcome, Ok(SettlementOutcome::Settled(_))));
    }

    #[tokio::test]
    async fn insufficient_wallet_leaves_cache_untouched() {
        let batch_id = Uuid::new_v4();
        let mut tickets = MockTicketRepository::new();
        let mut cache = MockStatusCache::new();

        tickets
            .expect_settle_wallet_batch()
            .withf(move |id| *id == batch_id)
            .times(1)
            .returning(|_| Box::pin(async { Ok(WalletSettlement::Insufficient { balance: 5.0 }) }));
        cache.expect_put_check_in_snapshot().never();

        let settlement = BatchSettlement::new(Arc::new(tickets), Arc::new(cache));
        let outcome = settlement.settle_from_wallet(batch_id).await.unwrap();

        assert_eq!(outcome, WalletSettlement::Insufficient { balance: 5.0 });
    }

    #[tokio::test]
    async fn wallet_settlement_primes_snapshots() {
        let batch_id = Uuid::new_v4();
        let mut tickets = MockTicketRepository::new();
        let mut cache = MockStatusCache::new();

        tickets.expect_settle_wallet_batch().returning(move |_| {
            let settled = SettledBatch {
                tickets: vec![paid_ticket(11, batch_id), paid_ticket(12, batch_id)],
                amount: 40.0,
                transaction_id: 9,
            };
            Box::pin(async move { Ok(WalletSettlement::Settled(settled)) })
        });
        cache
            .expect_put_check_in_snapshot()
            .times(2)
            .returning(|_, _| Box::pin(async { Ok(()) }));

        let settlement = BatchSettlement::new(Arc::new(tickets), Arc::new(cache));
        let outcome = settlement.settle_from_wallet(batch_id).await.unwrap();

        assert!(matches!(outcome, WalletSettlement::Settled(_)));
    }
}
