use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct OverTravelRequest {
    pub ticket_id: i64,
    pub current_stop: String,
    #[serde(default)]
    pub payment_collected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverTravelTicketDto {
    pub ticket_id: i64,
    pub original_ticket_id: i64,
    pub start_destination: String,
    pub end_destination: String,
    pub fare: f64,
    pub paid: bool,
    pub qr_code: String,
}
