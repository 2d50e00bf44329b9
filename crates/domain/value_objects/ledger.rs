use chrono::Utc;

use crate::domain::{
    entities::transactions::InsertTransactionEntity,
    value_objects::enums::{payment_methods::PaymentMethod, transaction_types::TransactionType},
};

pub const RECHARGE_DESCRIPTION: &str = "Wallet recharge";

pub fn ledger_entry(
    user_id: i64,
    amount: f64,
    type_: TransactionType,
    description: String,
    payment_method: PaymentMethod,
) -> InsertTransactionEntity {
    InsertTransactionEntity {
        user_id,
        amount,
        type_: type_.to_string(),
        description,
        payment_method: payment_method.to_string(),
        created_at: Utc::now(),
    }
}

pub fn purchase_description(bus_name: &str, count: usize) -> String {
    format!("Ticket Purchase - {bus_name} (x{count})")
}

pub fn rfid_trip_description(bus_name: &str) -> String {
    format!("RFID Trip - {bus_name}")
}

pub fn over_travel_description(bus_name: &str) -> String {
    format!("Over-Travel Ticket - {bus_name}")
}

pub fn refund_description(bus_name: &str) -> String {
    format!("Ticket Refund - {bus_name}")
}
