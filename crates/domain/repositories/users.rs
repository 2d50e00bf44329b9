use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{entities::users::UserEntity, value_objects::balances::DebitOutcome};

#[async_trait]
#[automock]
pub trait UserRepository {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserEntity>>;
    async fn find_by_rfid(&self, rfid: String) -> Result<Option<UserEntity>>;
    /// Row-locked read-then-write; never drives the balance negative.
    async fn debit_balance(&self, user_id: i64, amount: f64) -> Result<DebitOutcome>;
    /// Returns the new balance.
    async fn credit_balance(&self, user_id: i64, amount: f64) -> Result<f64>;
}
