pub mod bus;
pub mod payments;
pub mod tickets;
pub mod wallet;
