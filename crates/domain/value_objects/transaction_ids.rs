use thiserror::Error;
use uuid::Uuid;

const TICKET_PREFIX: &str = "TICKET-";
const RECHARGE_PREFIX: &str = "RECHARGE-";

#[derive(Debug, Error, PartialEq)]
#[error("malformed transaction id: {0}")]
pub struct MalformedTransactionId(pub String);

/// What a gateway `tran_id` settles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionRef {
    Ticket { ticket_id: i64 },
    Recharge { user_id: i64 },
}

impl TransactionRef {
    /// Accepts `TICKET-<ticketId>-<suffix>` and `RECHARGE-<userId>-<suffix>`.
    pub fn parse(tran_id: &str) -> Result<Self, MalformedTransactionId> {
        let malformed = || MalformedTransactionId(tran_id.to_string());

        if let Some(rest) = tran_id.strip_prefix(TICKET_PREFIX) {
            let ticket_id = leading_id(rest).ok_or_else(malformed)?;
            return Ok(TransactionRef::Ticket { ticket_id });
        }

        if let Some(rest) = tran_id.strip_prefix(RECHARGE_PREFIX) {
            let user_id = leading_id(rest).ok_or_else(malformed)?;
            return Ok(TransactionRef::Recharge { user_id });
        }

        Err(malformed())
    }
}

fn leading_id(rest: &str) -> Option<i64> {
    let (id, _suffix) = rest.split_once('-')?;
    id.parse::<i64>().ok().filter(|id| *id > 0)
}

pub fn ticket_transaction_id(first_ticket_id: i64) -> String {
    format!("{TICKET_PREFIX}{first_ticket_id}-{}", Uuid::new_v4())
}

pub fn recharge_transaction_id(user_id: i64) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{RECHARGE_PREFIX}{user_id}-{}", &suffix[..8])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ticket_transaction_ids() {
        let tran_id = ticket_transaction_id(42);
        assert_eq!(
            TransactionRef::parse(&tran_id),
            Ok(TransactionRef::Ticket { ticket_id: 42 })
        );
    }

    #[test]
    fn parses_recharge_transaction_ids() {
        let tran_id = recharge_transaction_id(7);
        assert!(tran_id.starts_with("RECHARGE-7-"));
        assert_eq!(tran_id.len(), "RECHARGE-7-".len() + 8);
        assert_eq!(
            TransactionRef::parse(&tran_id),
            Ok(TransactionRef::Recharge { user_id: 7 })
        );
    }

    #[test]
    fn rejects_malformed_ids() {
        for raw in ["", "TICKET-", "TICKET-abc-123", "TICKET-12", "ORDER-1-x", "TICKET--5-x"] {
            assert!(TransactionRef::parse(raw).is_err(), "{raw} should be rejected");
        }
    }
}
