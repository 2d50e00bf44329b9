use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::value_objects::enums::payment_methods::PaymentMethod;

/// Purchase work item; the job row's correlation id carries the tracking id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketPurchaseMessage {
    pub user_id: i64,
    pub route_id: i64,
    pub bus_name: String,
    pub start_destination: String,
    pub end_destination: String,
    pub fare: f64,
    pub total_fare: f64,
    pub quantity: i32,
    pub batch_id: Uuid,
    pub payment_method: PaymentMethod,
}

/// Emitted by the fast check-in path so the ticket row catches up with the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckEvent {
    pub ticket_id: i64,
    pub qr_code: String,
    pub current_stop: String,
    pub checked_at: DateTime<Utc>,
}

/// Credit owed back to a rider after a debit whose follow-up step failed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceCompensation {
    pub user_id: i64,
    pub amount: f64,
    pub reason: String,
}
