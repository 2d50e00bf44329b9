use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use crate::{
    domain::{
        entities::users::UserEntity, repositories::users::UserRepository,
        value_objects::balances::DebitOutcome,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::users},
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .find(user_id)
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn find_by_rfid(&self, rfid: String) -> Result<Option<UserEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let user = users::table
            .filter(users::rfid.eq(rfid))
            .select(UserEntity::as_select())
            .first::<UserEntity>(&mut conn)
            .optional()?;

        Ok(user)
    }

    async fn debit_balance(&self, user_id: i64, amount: f64) -> Result<DebitOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let outcome = conn.transaction::<_, diesel::result::Error, _>(|conn| {
            // Row lock serializes concurrent taps and wallet purchases for one rider.
            let balance = users::table
                .find(user_id)
                .select(users::balance)
                .for_update()
                .first::<f64>(conn)?;

            if balance < amount {
                return Ok(DebitOutcome::Insufficient { balance });
            }

            let balance = diesel::update(users::table.find(user_id))
                .set(users::balance.eq(users::balance - amount))
                .returning(users::balance)
                .get_result::<f64>(conn)?;

            Ok(DebitOutcome::Debited { balance })
        })?;

        Ok(outcome)
    }

    async fn credit_balance(&self, user_id: i64, amount: f64) -> Result<f64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let balance = diesel::update(users::table.find(user_id))
            .set(users::balance.eq(users::balance + amount))
            .returning(users::balance)
            .get_result::<f64>(&mut conn)?;

        Ok(balance)
    }
}
