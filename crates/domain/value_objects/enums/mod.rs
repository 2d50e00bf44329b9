pub mod job_statuses;
pub mod job_types;
pub mod payment_methods;
pub mod payment_statuses;
pub mod transaction_types;
