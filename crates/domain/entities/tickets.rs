use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::tickets;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = tickets)]
pub struct TicketEntity {
    pub id: i64,
    pub user_id: i64,
    pub route_id: i64,
    pub bus_name: String,
    pub start_destination: String,
    pub end_destination: String,
    pub fare: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub paid_status: bool,
    pub payment_used: bool,
    pub batch_id: Uuid,
    pub qr_code: String,
    pub checked: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Checkout transaction issued for the batch; only set on gateway purchases.
    #[serde(skip_serializing)]
    pub gateway_tran_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Insertable)]
#[diesel(table_name = tickets)]
pub struct InsertTicketEntity {
    pub user_id: i64,
    pub route_id: i64,
    pub bus_name: String,
    pub start_destination: String,
    pub end_destination: String,
    pub fare: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub paid_status: bool,
    pub payment_used: bool,
    pub batch_id: Uuid,
    pub qr_code: String,
    pub checked: bool,
    pub created_at: DateTime<Utc>,
}
