use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;

use crate::{
    domain::{
        entities::transactions::InsertTransactionEntity,
        repositories::transactions::TransactionRepository,
    },
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::transactions},
};

pub struct TransactionPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl TransactionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl TransactionRepository for TransactionPostgres {
    async fn record(&self, transaction: InsertTransactionEntity) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let id = diesel::insert_into(transactions::table)
            .values(&transaction)
            .returning(transactions::id)
            .get_result::<i64>(&mut conn)?;

        Ok(id)
    }
}
