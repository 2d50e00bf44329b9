pub mod balances;
pub mod check_in;
pub mod enums;
pub mod fares;
pub mod ledger;
pub mod over_travel;
pub mod payment_gateway;
pub mod qr_codes;
pub mod recharge;
pub mod rfid;
pub mod settlements;
pub mod ticket_jobs;
pub mod tickets;
pub mod tracking_sessions;
pub mod transaction_ids;
