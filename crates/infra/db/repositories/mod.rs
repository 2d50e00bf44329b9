pub mod job;
pub mod routes;
pub mod tickets;
pub mod transactions;
pub mod users;
