use std::fmt::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobType {
    TicketPurchase,
    CheckEvent,
    BalanceCompensation,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::TicketPurchase => "ticket_purchase",
            JobType::CheckEvent => "check_event",
            JobType::BalanceCompensation => "balance_compensation",
        }
    }
}

impl Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
