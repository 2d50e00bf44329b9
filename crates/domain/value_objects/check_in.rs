use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entities::tickets::TicketEntity;

/// Denormalized copy of a just-paid ticket kept under `ticket_valid:<qrCode>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInSnapshot {
    pub ticket_id: i64,
    pub route_id: i64,
    pub start_destination: String,
    pub end_destination: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub checked: bool,
}

impl From<&TicketEntity> for CheckInSnapshot {
    fn from(ticket: &TicketEntity) -> Self {
        Self {
            ticket_id: ticket.id,
            route_id: ticket.route_id,
            start_destination: ticket.start_destination.clone(),
            end_destination: ticket.end_destination.clone(),
            user_id: ticket.user_id,
            created_at: ticket.created_at,
            checked: ticket.checked,
        }
    }
}

/// Result of the compare-and-set that flips a snapshot to checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotClaim {
    Claimed,
    AlreadyChecked,
    Missing,
}

/// Result of removing an unchecked snapshot ahead of a cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotRevoke {
    Revoked,
    AlreadyChecked,
    Missing,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckInRequest {
    pub qr_code: String,
    pub current_stop: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidateTicketRequest {
    pub ticket_id: i64,
    pub current_stop: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CheckInOutcome {
    Valid {
        ticket_id: i64,
    },
    OverTravel {
        ticket_id: i64,
        extra_fare: f64,
        current_stop: String,
        ticket_end: String,
    },
    Invalid,
    InvalidRoute {
        ticket_id: i64,
    },
    AlreadyUsed {
        ticket_id: i64,
    },
    Cancelled {
        ticket_id: i64,
    },
    Unpaid {
        ticket_id: i64,
    },
}

impl CheckInOutcome {
    pub fn message(&self) -> &'static str {
        match self {
            CheckInOutcome::Valid { .. } => "Ticket is valid",
            CheckInOutcome::OverTravel { .. } => "Over-travel detected, extra fare is due",
            CheckInOutcome::Invalid => "Invalid or expired ticket",
            CheckInOutcome::InvalidRoute { .. } => "Ticket is not valid for this route",
            CheckInOutcome::AlreadyUsed { .. } => "Ticket already used",
            CheckInOutcome::Cancelled { .. } => "Ticket has been cancelled",
            CheckInOutcome::Unpaid { .. } => "Ticket is not paid",
        }
    }

    /// Whether the scan consumed the ticket.
    pub fn is_boarding(&self) -> bool {
        matches!(
            self,
            CheckInOutcome::Valid { .. } | CheckInOutcome::OverTravel { .. }
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckInResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub outcome: CheckInOutcome,
}

impl From<CheckInOutcome> for CheckInResponse {
    fn from(outcome: CheckInOutcome) -> Self {
        Self {
            message: outcome.message(),
            outcome,
        }
    }
}

/// Row rules in order: cancelled, unpaid, wrong route, already checked.
pub fn reject_ticket(ticket: &TicketEntity, route_id: i64) -> Option<CheckInOutcome> {
    let ticket_id = ticket.id;
    if ticket.cancelled_at.is_some() {
        return Some(CheckInOutcome::Cancelled { ticket_id });
    }
    if !ticket.paid_status {
        return Some(CheckInOutcome::Unpaid { ticket_id });
    }
    if ticket.route_id != route_id {
        return Some(CheckInOutcome::InvalidRoute { ticket_id });
    }
    if ticket.checked {
        return Some(CheckInOutcome::AlreadyUsed { ticket_id });
    }
    None
}

/// Snapshots only exist for paid, uncancelled tickets, so only route and reuse are checked.
pub fn reject_snapshot(snapshot: &CheckInSnapshot, route_id: i64) -> Option<CheckInOutcome> {
    let ticket_id = snapshot.ticket_id;
    if snapshot.route_id != route_id {
        return Some(CheckInOutcome::InvalidRoute { ticket_id });
    }
    if snapshot.checked {
        return Some(CheckInOutcome::AlreadyUsed { ticket_id });
    }
    None
}

pub fn is_over_travel(current_stop_order: i32, destination_stop_order: i32) -> bool {
    current_stop_order > destination_stop_order
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn paid_ticket() -> TicketEntity {
        TicketEntity {
            id: 9,
            user_id: 1,
            route_id: 3,
            bus_name: "Green Line".to_string(),
            start_destination: "A".to_string(),
            end_destination: "C".to_string(),
            fare: 20.0,
            payment_method: "wallet".to_string(),
            payment_status: "paid".to_string(),
            paid_status: true,
            payment_used: true,
            batch_id: Uuid::new_v4(),
            qr_code: "QR-1".to_string(),
            checked: false,
            cancelled_at: None,
            created_at: Utc::now(),
            gateway_tran_id: None,
        }
    }

    #[test]
    fn accepts_paid_unchecked_ticket_on_route() {
        assert_eq!(reject_ticket(&paid_ticket(), 3), None);
    }

    #[test]
    fn cancellation_wins_over_other_rules() {
        let mut ticket = paid_ticket();
        ticket.cancelled_at = Some(Utc::now());
        ticket.paid_status = false;
        ticket.route_id = 99;
        assert_eq!(
            reject_ticket(&ticket, 3),
            Some(CheckInOutcome::Cancelled { ticket_id: 9 })
        );
    }

    #[test]
    fn unpaid_is_checked_before_route() {
        let mut ticket = paid_ticket();
        ticket.paid_status = false;
        ticket.route_id = 99;
        assert_eq!(
            reject_ticket(&ticket, 3),
            Some(CheckInOutcome::Unpaid { ticket_id: 9 })
        );
    }

    #[test]
    fn route_is_checked_before_reuse() {
        let mut ticket = paid_ticket();
        ticket.checked = true;
        assert_eq!(
            reject_ticket(&ticket, 4),
            Some(CheckInOutcome::InvalidRoute { ticket_id: 9 })
        );
        assert_eq!(
            reject_ticket(&ticket, 3),
            Some(CheckInOutcome::AlreadyUsed { ticket_id: 9 })
        );
    }

    #[test]
    fn over_travel_only_past_destination() {
        assert!(is_over_travel(5, 3));
        assert!(!is_over_travel(3, 3));
        assert!(!is_over_travel(1, 3));
    }

    #[test]
    fn response_flattens_outcome() {
        let response = CheckInResponse::from(CheckInOutcome::OverTravel {
            ticket_id: 9,
            extra_fare: 15.0,
            current_stop: "E".to_string(),
            ticket_end: "C".to_string(),
        });
        let value = serde_json::to_value(response).unwrap();
        assert_eq!(value["status"], "over_travel");
        assert_eq!(value["extra_fare"], 15.0);
        assert_eq!(value["ticket_end"], "C");
    }
}
