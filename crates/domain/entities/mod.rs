pub mod jobs;
pub mod stops;
pub mod tickets;
pub mod transactions;
pub mod users;
