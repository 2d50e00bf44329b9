use crate::domain::entities::tickets::TicketEntity;

/// A batch that was flipped to paid together with its single ledger entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SettledBatch {
    pub tickets: Vec<TicketEntity>,
    pub amount: f64,
    pub transaction_id: i64,
}

impl SettledBatch {
    pub fn ticket_ids(&self) -> Vec<i64> {
        self.tickets.iter().map(|t| t.id).collect()
    }
}

/// Outcome of paying a batch from the rider's wallet.
#[derive(Debug, Clone, PartialEq)]
pub enum WalletSettlement {
    Settled(SettledBatch),
    AlreadySettled,
    Insufficient { balance: f64 },
}
