use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::transactions::InsertTransactionEntity;

#[async_trait]
#[automock]
pub trait TransactionRepository {
    async fn record(&self, transaction: InsertTransactionEntity) -> Result<i64>;
}
