pub mod job;
pub mod payment_gateway;
pub mod routes;
pub mod status_cache;
pub mod tickets;
pub mod transactions;
pub mod users;
