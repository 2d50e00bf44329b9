use serde::{Deserialize, Serialize};

/// Purchase progress as seen by the poller, stored under `ticket_status:<trackingId>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrackingSession {
    Processing,
    Ready { url: String, ticket_ids: Vec<i64> },
    Paid { url: String, ticket_ids: Vec<i64> },
    Failed { error: String },
}

impl TrackingSession {
    pub fn ticket_ids(&self) -> &[i64] {
        match self {
            TrackingSession::Ready { ticket_ids, .. } | TrackingSession::Paid { ticket_ids, .. } => {
                ticket_ids
            }
            TrackingSession::Processing | TrackingSession::Failed { .. } => &[],
        }
    }

    pub fn message(&self) -> String {
        match self {
            TrackingSession::Processing => "Processing".to_string(),
            TrackingSession::Ready { .. } => "Ready".to_string(),
            TrackingSession::Paid { .. } => "Paid".to_string(),
            TrackingSession::Failed { error } => format!("Failed: {error}"),
        }
    }
}
