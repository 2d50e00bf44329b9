use serde::{Deserialize, Serialize};

/// Taps from the same rider on the same route and bus inside this window are one boarding.
pub const DUPLICATE_TAP_WINDOW_SECS: i64 = 5 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct RfidPaymentRequest {
    pub rfid: String,
    pub start_destination: String,
    pub end_destination: String,
}

/// A tap as seen by the core, with route and bus taken from the scanner's claims.
#[derive(Debug, Clone, PartialEq)]
pub struct RfidTap {
    pub rfid: String,
    pub route_id: i64,
    pub bus_name: String,
    pub start_destination: String,
    pub end_destination: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RfidStatus {
    Success,
    Duplicate,
    Inactive,
    InsufficientBalance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RfidPaymentResponse {
    pub success: bool,
    pub status: RfidStatus,
    pub message: String,
    pub balance: f64,
    pub fare: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<i64>,
}
