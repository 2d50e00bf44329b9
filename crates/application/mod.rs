pub mod compensation;
pub mod settlement;
