pub mod check_in;
pub mod payment_reconciliation;
pub mod purchase;
pub mod recharge;
pub mod rfid;
pub mod ticket_lifecycle;
