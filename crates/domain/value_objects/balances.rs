/// Result of a locked read-then-write against a rider's balance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DebitOutcome {
    Debited { balance: f64 },
    Insufficient { balance: f64 },
}
