pub mod balance_compensation;
pub mod check_events;
pub mod ticket_fulfillment;
