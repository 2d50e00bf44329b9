use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::tickets::TicketEntity,
    value_objects::{
        enums::{payment_methods::PaymentMethod, payment_statuses::PaymentStatus},
        fares::round_up_fare,
    },
};

pub const MAX_TICKETS_PER_REQUEST: i32 = 4;
pub const MAX_ACTIVE_TICKETS_PER_ROUTE: i64 = 4;
pub const DEFAULT_PAGE_LIMIT: i64 = 10;
pub const MAX_PAGE_LIMIT: i64 = 50;

/// Where a settled batch's tickets can be fetched; keyed by the first ticket.
pub fn download_url(public_base_url: &str, first_ticket_id: i64) -> String {
    format!(
        "{}/api/v1/tickets/{first_ticket_id}/download",
        public_base_url.trim_end_matches('/')
    )
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuyTicketRequest {
    pub route_id: i64,
    pub bus_name: String,
    pub start_destination: String,
    pub end_destination: String,
    pub payment_method: PaymentMethod,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BuyTicketResponse {
    pub message: String,
    pub tracking_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TicketDto {
    pub id: i64,
    pub user_id: i64,
    pub route_id: i64,
    pub bus_name: String,
    pub start_destination: String,
    pub end_destination: String,
    pub fare: f64,
    pub payment_method: String,
    pub payment_status: String,
    pub paid_status: bool,
    pub batch_id: Uuid,
    pub qr_code: String,
    pub checked: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<TicketEntity> for TicketDto {
    fn from(ticket: TicketEntity) -> Self {
        Self {
            id: ticket.id,
            user_id: ticket.user_id,
            route_id: ticket.route_id,
            bus_name: ticket.bus_name,
            start_destination: ticket.start_destination,
            end_destination: ticket.end_destination,
            fare: round_up_fare(ticket.fare),
            payment_method: ticket.payment_method,
            payment_status: ticket.payment_status,
            paid_status: ticket.paid_status,
            batch_id: ticket.batch_id,
            qr_code: ticket.qr_code,
            checked: ticket.checked,
            cancelled_at: ticket.cancelled_at,
            created_at: ticket.created_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketListQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl TicketListQuery {
    /// Returns `(page, limit, offset)` with page starting at 1.
    pub fn normalized(&self) -> (i64, i64, i64) {
        let page = self.page.filter(|p| *p > 0).unwrap_or(1);
        let limit = self
            .limit
            .filter(|l| *l > 0)
            .map(|l| l.min(MAX_PAGE_LIMIT))
            .unwrap_or(DEFAULT_PAGE_LIMIT);
        (page, limit, (page - 1).saturating_mul(limit))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TicketListDto {
    pub tickets: Vec<TicketDto>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TrackingStatusQuery {
    pub tracking_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackingStatusDto {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket: Option<TicketDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_ids: Option<Vec<i64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatusDto {
    pub ticket_id: i64,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CancelTicketDto {
    pub ticket_id: i64,
    pub refund_amount: f64,
    pub refunded_to_wallet: bool,
}
